//! Account Handler
//!
//! Registration, admin activation and self-service profile edits.

use std::sync::Arc;

use crate::domain::{Account, DomainError, NewAccount, OperationContext, Page, ProfileChanges, Role};
use crate::error::{AppError, AppResult};
use crate::identity::password::MIN_PASSWORD_LEN;
use crate::identity::IdentityProvider;
use crate::store::{to_data, Collection, DocumentStore, Filter, Query};

use super::{ListAccountsQuery, RegisterCommand};

/// Handler for account operations
#[derive(Clone)]
pub struct AccountHandler {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl AccountHandler {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Register an identity and its profile.
    ///
    /// The first account ever created becomes an active ADMIN. Two
    /// simultaneous first registrations can both observe an empty
    /// collection; nothing here serializes them.
    pub async fn register(
        &self,
        command: RegisterCommand,
        context: &OperationContext,
    ) -> AppResult<Account> {
        let name = command.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name is required").into());
        }
        if !command.email.contains('@') {
            return Err(DomainError::validation("email is invalid").into());
        }
        if command.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must have at least {} characters",
                MIN_PASSWORD_LEN
            ))
            .into());
        }

        let existing = self
            .store
            .list(Collection::Users, &Query::new().count_only())
            .await?;
        let is_first = existing.total == 0;
        if !is_first && command.role == Role::Admin {
            return Err(DomainError::AdminRoleReserved.into());
        }

        let identity = self
            .identity
            .create_identity(&command.email, &command.password, &name)
            .await?;

        let profile = NewAccount::for_registration(name, identity.email.clone(), command.role, is_first);
        let created = match self
            .store
            .create(Collection::Users, Some(identity.id.clone()), to_data(&profile)?)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                // Compensate: no identity without a profile
                if let Err(cleanup) = self.identity.delete_identity(&identity.id).await {
                    tracing::warn!(
                        identity_id = %identity.id,
                        error = %cleanup,
                        "Failed to remove identity after profile write failure"
                    );
                }
                return Err(e.into());
            }
        };

        let account: Account = created.decode()?;
        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            is_active = account.is_active,
            correlation_id = ?context.correlation_id,
            "Account registered"
        );
        Ok(account)
    }

    /// Load an account profile
    pub async fn find(&self, id: &str) -> AppResult<Option<Account>> {
        let document = self.store.get(Collection::Users, id).await?;
        Ok(document.map(|d| d.decode::<Account>()).transpose()?)
    }

    pub async fn get(&self, id: &str) -> AppResult<Account> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("account {}", id)))
    }

    /// Admin listing, newest first
    pub async fn list(
        &self,
        query: ListAccountsQuery,
        context: &OperationContext,
    ) -> AppResult<Page<Account>> {
        context.require_admin()?;

        let mut store_query = Query::new().offset(query.offset);
        if let Some(limit) = query.limit {
            store_query = store_query.limit(limit);
        }
        if let Some(role) = query.role {
            store_query = store_query.filter(Filter::equal("role", role.as_str()));
        }
        if let Some(is_active) = query.is_active {
            store_query = store_query.filter(Filter::equal("isActive", is_active));
        }

        let list = self.store.list(Collection::Users, &store_query).await?;
        Ok(Page::new(list.decode()?, list.total))
    }

    /// Activate or deactivate an account (admin only)
    pub async fn set_active(
        &self,
        id: &str,
        active: bool,
        context: &OperationContext,
    ) -> AppResult<Account> {
        let admin = context.require_admin()?;
        let account = self.get(id).await?;

        if account.is_admin() && !active {
            return Err(DomainError::AdminAlwaysActive.into());
        }
        if account.is_active == active {
            return Ok(account);
        }

        let mut patch = serde_json::Map::new();
        patch.insert("isActive".to_string(), active.into());
        let updated: Account = self.store.update(Collection::Users, id, patch).await?.decode()?;

        tracing::info!(
            account_id = %id,
            admin_id = %admin.id,
            is_active = active,
            "Account activation changed"
        );
        Ok(updated)
    }

    /// Update the caller's own profile
    pub async fn update_profile(
        &self,
        changes: ProfileChanges,
        context: &OperationContext,
    ) -> AppResult<Account> {
        let caller = context.require_account()?;
        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name is required").into());
            }
        }
        if changes.is_empty() {
            return self.get(&caller.id).await;
        }

        let document = self
            .store
            .update(Collection::Users, &caller.id, to_data(&changes)?)
            .await?;
        Ok(document.decode()?)
    }
}
