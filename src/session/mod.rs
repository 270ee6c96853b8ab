//! Session module
//!
//! Keeps three views of "who is logged in" consistent: the provider
//! session, the locally held identity and the mirror cookie.
//!
//! A [`SessionContext`] is built per request (or per client) and passed
//! explicitly; nothing here is global.

pub mod mirror;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{keys, QueryCache};
use crate::domain::{Account, AuthStatus, DomainError};
use crate::error::AppResult;
use crate::identity::IdentityProvider;
use crate::store::{Collection, DocumentStore};

pub use mirror::{CookieMirror, MirrorEnvelope, SessionMirror};

/// Default window during which an identity read is reused
pub const DEFAULT_IDENTITY_TTL: Duration = Duration::from_secs(300);

/// Logout result: the caller must perform a full navigation to `location`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardReset {
    pub location: &'static str,
}

/// Resolve the account behind a provider session
pub async fn resolve_status(
    identity: &dyn IdentityProvider,
    store: &dyn DocumentStore,
    session_id: &str,
) -> AppResult<AuthStatus> {
    let Some(session) = identity.get_session(session_id).await? else {
        return Ok(AuthStatus::Anonymous);
    };
    let account = store
        .get(Collection::Users, &session.identity_id)
        .await?
        .map(|document| document.decode::<Account>())
        .transpose()?;
    if account.is_none() {
        tracing::warn!(identity_id = %session.identity_id, "Session has no profile document");
    }
    Ok(AuthStatus::classify(account))
}

/// Session state for one client
pub struct SessionContext {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    cache: Arc<QueryCache>,
    mirror: Arc<dyn SessionMirror>,
    identity_ttl: Duration,
    session_id: Option<String>,
    local: Option<Account>,
}

impl SessionContext {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<QueryCache>,
        mirror: Arc<dyn SessionMirror>,
    ) -> Self {
        Self {
            identity,
            store,
            cache,
            mirror,
            identity_ttl: DEFAULT_IDENTITY_TTL,
            session_id: None,
            local: None,
        }
    }

    pub fn with_identity_ttl(mut self, ttl: Duration) -> Self {
        self.identity_ttl = ttl;
        self
    }

    /// Resume a provider session, e.g. from a cookie
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Seed the local identity, e.g. from the mirror cookie
    pub fn with_local(mut self, account: Option<Account>) -> Self {
        self.local = account;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Locally held identity
    pub fn current(&self) -> Option<&Account> {
        self.local.as_ref()
    }

    /// Replace the local identity and mirror it
    pub fn set_identity(&mut self, account: Option<Account>) {
        self.local = account;
        self.mirror.mirror(self.local.as_ref());
    }

    async fn query_status(&self) -> AppResult<AuthStatus> {
        let Some(session_id) = self.session_id.as_deref() else {
            return Ok(AuthStatus::Anonymous);
        };
        self.cache
            .fetch(keys::identity(session_id), self.identity_ttl, || {
                resolve_status(self.identity.as_ref(), self.store.as_ref(), session_id)
            })
            .await
    }

    /// Read the provider's view and make the local identity match it
    ///
    /// When the provider cannot be read, the seeded local identity is
    /// dropped: only a successful read may vouch for it. The mirror is left
    /// as is so a provider outage does not sign the browser out.
    pub async fn load(&mut self) -> AppResult<AuthStatus> {
        match self.query_status().await {
            Ok(status) => {
                self.reconcile(&status);
                Ok(status)
            }
            Err(e) => {
                self.local = None;
                Err(e)
            }
        }
    }

    /// Overwrite the local identity whenever it differs from `status`.
    ///
    /// Only an active account counts as logged in.
    pub fn reconcile(&mut self, status: &AuthStatus) {
        let remote = status.account();
        if self.local.as_ref() != remote {
            tracing::debug!(
                local = ?self.local.as_ref().map(|a| &a.id),
                remote = ?remote.map(|a| &a.id),
                "Reconciling local identity"
            );
            self.set_identity(remote.cloned());
        }
    }

    /// Drop the provider session, logging failures
    async fn destroy_session(&mut self) {
        let Some(session_id) = self.session_id.take() else {
            return;
        };
        if let Err(e) = self.identity.delete_session(&session_id).await {
            tracing::warn!(error = %e, "Failed to delete provider session");
        }
        self.cache.invalidate(&keys::identity(&session_id));
        self.mirror.remember_session(None);
    }

    /// Sign in with a fresh provider session.
    ///
    /// Any prior session is destroyed first. A pending account gets its new
    /// session destroyed too before the rejection is returned.
    pub async fn login(&mut self, email: &str, password: &str) -> AppResult<Account> {
        self.destroy_session().await;
        if self.local.is_some() {
            self.set_identity(None);
        }

        let session = self.identity.create_session(email, password).await?;
        let status = match resolve_status(self.identity.as_ref(), self.store.as_ref(), &session.id).await {
            Ok(status) => status,
            Err(e) => {
                self.discard(&session.id).await;
                return Err(e);
            }
        };

        match status {
            AuthStatus::Active(account) => {
                self.cache
                    .insert(keys::identity(&session.id), AuthStatus::Active(account.clone()))
                    .await;
                self.mirror.remember_session(Some(&session.id));
                self.session_id = Some(session.id);
                self.set_identity(Some(account.clone()));
                tracing::info!(user_id = %account.id, "Signed in");
                Ok(account)
            }
            AuthStatus::PendingActivation => {
                self.discard(&session.id).await;
                tracing::info!(identity_id = %session.identity_id, "Sign-in rejected: account pending activation");
                Err(DomainError::PendingActivation.into())
            }
            AuthStatus::Anonymous => {
                self.discard(&session.id).await;
                Err(DomainError::NotAuthenticated.into())
            }
        }
    }

    async fn discard(&self, session_id: &str) {
        if let Err(e) = self.identity.delete_session(session_id).await {
            tracing::warn!(error = %e, "Failed to delete rejected session");
        }
    }

    /// Sign out. The local identity is cleared even if the provider call fails.
    pub async fn logout(&mut self) -> HardReset {
        if let Some(account) = self.local.as_ref() {
            tracing::info!(user_id = %account.id, "Signed out");
        }
        self.destroy_session().await;
        self.mirror.remember_session(None);
        self.set_identity(None);
        HardReset { location: "/" }
    }

    /// Forget the cached identity read and load again
    pub async fn refresh(&mut self) -> AppResult<AuthStatus> {
        if let Some(session_id) = self.session_id.as_deref() {
            self.cache.invalidate(&keys::identity(session_id));
        }
        self.load().await
    }
}
