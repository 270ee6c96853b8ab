//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::identity::IdentityError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Status, machine-readable code and optional details
    pub fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", Some(what.clone())),

            AppError::Domain(domain_err) => match domain_err {
                DomainError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
                }
                DomainError::NotAuthenticated => {
                    (StatusCode::UNAUTHORIZED, "not_authenticated", None)
                }
                DomainError::PendingActivation => {
                    (StatusCode::FORBIDDEN, "account_pending_activation", None)
                }
                DomainError::Forbidden(msg) => {
                    (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone()))
                }
                DomainError::AdminRoleReserved => {
                    (StatusCode::FORBIDDEN, "admin_role_reserved", None)
                }
                DomainError::InvalidTransition { from, action } => (
                    StatusCode::CONFLICT,
                    "invalid_transition",
                    Some(format!("{} from {}", action, from)),
                ),
                DomainError::AdminAlwaysActive => {
                    (StatusCode::CONFLICT, "admin_always_active", None)
                }
            },

            AppError::Store(store_err) => match store_err {
                StoreError::NotFound { collection, id } => (
                    StatusCode::NOT_FOUND,
                    "not_found",
                    Some(format!("{}/{}", collection, id)),
                ),
                StoreError::Conflict { message, .. } => {
                    (StatusCode::CONFLICT, "conflict", Some(message.clone()))
                }
                StoreError::Invalid { message, .. } => {
                    (StatusCode::BAD_REQUEST, "invalid_document", Some(message.clone()))
                }
                StoreError::Database(e) => {
                    tracing::error!("Store database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
                StoreError::Serialization(e) => {
                    tracing::error!("Store serialization error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
            },

            AppError::Identity(identity_err) => match identity_err {
                IdentityError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "invalid_credentials", None)
                }
                IdentityError::EmailTaken(_) => (StatusCode::CONFLICT, "email_taken", None),
                IdentityError::NotFound(id) => {
                    (StatusCode::NOT_FOUND, "identity_not_found", Some(id.clone()))
                }
                IdentityError::Hashing(msg) => {
                    tracing::error!("Password hashing error: {}", msg);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
                IdentityError::Database(e) => {
                    tracing::error!("Identity database error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();

        // Internal messages stay in the logs
        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventStatus, StatusAction};
    use crate::store::Collection;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(DomainError::PendingActivation).parts().1,
            "account_pending_activation"
        );
        assert_eq!(
            AppError::from(DomainError::PendingActivation).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(DomainError::NotAuthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(DomainError::InvalidTransition {
                from: EventStatus::Draft,
                action: StatusAction::Complete,
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(StoreError::not_found(Collection::Events, "e1")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(IdentityError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_server_errors_hide_message() {
        let response = AppError::Internal("secret detail".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
