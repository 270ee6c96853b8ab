//! Operation Context
//!
//! Who is calling, plus request metadata for tracing.

use std::net::IpAddr;

use uuid::Uuid;

use super::{Account, DomainError, Role};

/// Context for an operation.
///
/// `caller` is the provider-verified account of the request, never the
/// mirrored cookie copy.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub caller: Option<Account>,

    /// Correlation ID for request tracing
    pub correlation_id: Option<Uuid>,

    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Create an anonymous context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caller(mut self, caller: Account) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.caller.as_ref().map(|a| a.id.as_str())
    }

    /// The signed-in account, or `NotAuthenticated`
    pub fn require_account(&self) -> Result<&Account, DomainError> {
        self.caller.as_ref().ok_or(DomainError::NotAuthenticated)
    }

    /// The signed-in account if it holds one of `roles`
    pub fn require_role(&self, roles: &[Role]) -> Result<&Account, DomainError> {
        let account = self.require_account()?;
        if !account.has_role(roles) {
            return Err(DomainError::forbidden(format!(
                "role {} is not allowed here",
                account.role
            )));
        }
        Ok(account)
    }

    pub fn require_admin(&self) -> Result<&Account, DomainError> {
        self.require_role(&[Role::Admin])
    }
}
