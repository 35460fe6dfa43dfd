//! Error types for the store module.

use netobject_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored fragment failed to decode.
    #[error("codec error: {0}")]
    Codec(#[from] CoreError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The blocking worker panicked or the connection lock was poisoned.
    #[error("storage worker failed: {0}")]
    Worker(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
