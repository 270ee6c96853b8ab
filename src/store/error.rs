//! Document Store Errors
//!
//! Error types for document store operations.

use super::Collection;

/// Errors that can occur in the document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Document does not exist
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    /// A unique index rejected the write
    #[error("Conflict in {collection}: {message}")]
    Conflict {
        collection: Collection,
        message: String,
    },

    /// Document does not satisfy the collection schema
    #[error("Invalid document for {collection}: {message}")]
    Invalid {
        collection: Collection,
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn conflict(collection: Collection, message: impl Into<String>) -> Self {
        Self::Conflict {
            collection,
            message: message.into(),
        }
    }

    pub fn invalid(collection: Collection, message: impl Into<String>) -> Self {
        Self::Invalid {
            collection,
            message: message.into(),
        }
    }

    /// Check if this error is a unique index conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Check if this error means the document is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
