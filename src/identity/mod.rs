//! Identity Provider module
//!
//! Issues and validates login sessions keyed by email and password. Profile
//! data lives in the document store under the same id as the identity.

pub mod memory;
pub mod password;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryIdentityProvider;
pub use postgres::PgIdentityProvider;

/// Identity provider errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Identity not found: {0}")]
    NotFound(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A registered identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A live provider session.
///
/// `id` is the bearer token; providers persist only its digest.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub identity_id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// Operations an identity provider exposes
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, IdentityError>;

    /// Remove an identity and every session it holds
    async fn delete_identity(&self, id: &str) -> Result<(), IdentityError>;

    /// Verify credentials and open a session
    async fn create_session(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Look up a session; unknown and expired sessions are `None`
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, IdentityError>;

    /// Close a session. Closing an unknown session is not an error.
    async fn delete_session(&self, session_id: &str) -> Result<(), IdentityError>;

    /// Drop expired sessions, returning how many were removed
    async fn purge_expired_sessions(&self) -> Result<u64, IdentityError>;
}

/// Canonical form of an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
