//! In-memory identity provider, for tests and local development

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::password::{hash_password_blocking, new_session_token, token_digest, verify_password_blocking};
use super::{normalize_email, Identity, IdentityError, IdentityProvider, Session};

#[derive(Debug, Clone)]
struct StoredIdentity {
    identity: Identity,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct StoredSession {
    identity_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    identities: HashMap<String, StoredIdentity>,
    // keyed by token digest
    sessions: HashMap<String, StoredSession>,
}

/// Identity provider backed by process memory
#[derive(Debug, Clone)]
pub struct MemoryIdentityProvider {
    state: Arc<RwLock<State>>,
    session_ttl: Duration,
}

impl MemoryIdentityProvider {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            session_ttl,
        }
    }

    /// Number of stored sessions, expired ones included
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new(Duration::days(7))
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, IdentityError> {
        let email = normalize_email(email);
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let mut state = self.state.write().await;
        if state.identities.values().any(|s| s.identity.email == email) {
            return Err(IdentityError::EmailTaken(email));
        }

        let identity = Identity {
            id: uuid::Uuid::new_v4().simple().to_string(),
            email,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.identities.insert(
            identity.id.clone(),
            StoredIdentity {
                identity: identity.clone(),
                password_hash,
            },
        );
        Ok(identity)
    }

    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError> {
        let mut state = self.state.write().await;
        if state.identities.remove(id).is_none() {
            return Err(IdentityError::NotFound(id.to_string()));
        }
        state.sessions.retain(|_, s| s.identity_id != id);
        Ok(())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email);
        let stored = {
            let state = self.state.read().await;
            state
                .identities
                .values()
                .find(|s| s.identity.email == email)
                .cloned()
                .ok_or(IdentityError::InvalidCredentials)?
        };

        if !verify_password_blocking(password.to_string(), stored.password_hash).await? {
            return Err(IdentityError::InvalidCredentials);
        }

        let token = new_session_token();
        let expires_at = Utc::now() + self.session_ttl;
        self.state.write().await.sessions.insert(
            token_digest(&token),
            StoredSession {
                identity_id: stored.identity.id.clone(),
                expires_at,
            },
        );

        Ok(Session {
            id: token,
            identity_id: stored.identity.id,
            email,
            expires_at,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, IdentityError> {
        let state = self.state.read().await;
        let Some(stored) = state.sessions.get(&token_digest(session_id)) else {
            return Ok(None);
        };
        if stored.expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(state.identities.get(&stored.identity_id).map(|i| Session {
            id: session_id.to_string(),
            identity_id: stored.identity_id.clone(),
            email: i.identity.email.clone(),
            expires_at: stored.expires_at,
        }))
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), IdentityError> {
        self.state.write().await.sessions.remove(&token_digest(session_id));
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> Result<u64, IdentityError> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}
