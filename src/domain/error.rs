//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::{EventStatus, StatusAction};

/// Business rule violations, independent of the web and storage layers
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// The status workflow does not allow this action
    #[error("Cannot {action} an event in status {from}")]
    InvalidTransition { from: EventStatus, action: StatusAction },

    /// No session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Valid credentials, but the account awaits admin activation
    #[error("Account is pending activation")]
    PendingActivation,

    /// Authenticated, but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// ADMIN accounts cannot be deactivated
    #[error("Admin accounts are always active")]
    AdminAlwaysActive,

    /// Only the first account may hold ADMIN through registration
    #[error("The ADMIN role cannot be requested at registration")]
    AdminRoleReserved,
}

impl DomainError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::InvalidTransition { .. })
    }

    /// Check if this conflicts with the current state of a record
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = DomainError::InvalidTransition {
            from: EventStatus::Cancelled,
            action: StatusAction::Publish,
        };

        assert!(err.is_conflict_error());
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "Cannot publish an event in status CANCELLED");
    }

    #[test]
    fn test_client_errors() {
        assert!(DomainError::PendingActivation.is_client_error());
        assert!(DomainError::forbidden("not the organizer").to_string().contains("organizer"));
    }
}
