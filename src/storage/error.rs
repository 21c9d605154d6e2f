//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure. The registry
//! logs these and keeps running on its in-memory state.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `initialize` has not completed successfully.
    #[error("storage backend is not initialized")]
    NotInitialized,

    /// Invalid data in the database or in the backend configuration.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Internal error (e.g., filesystem setup).
    #[error("internal error: {0}")]
    Internal(String),
}
