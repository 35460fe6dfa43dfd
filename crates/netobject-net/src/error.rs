//! Error types for the network layer.

use netobject_core::{ContentName, CoreError, PublisherDigest, ValidationError};
use thiserror::Error;

use crate::write_path::SaveMode;

/// Errors that can occur while fetching or publishing content.
#[derive(Debug, Error)]
pub enum NetError {
    /// Nothing answered a query that had to be answered (e.g. a continuation segment).
    #[error("no matching content for {0}")]
    NoMatchingContent(ContentName),

    /// No signing key is held for this publisher.
    #[error("unknown publisher: {0}")]
    UnknownPublisher(PublisherDigest),

    /// The requested write path cannot be built with this configuration.
    #[error("no {0} write path available")]
    WritePathUnavailable(SaveMode),

    /// A different fragment already exists under a name being written.
    #[error("write rejected: {0} already holds different content")]
    WriteConflict(ContentName),

    /// No async runtime to deliver query results on.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// Fragment failed verification.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Durable store operation failed.
    #[error("store error: {0}")]
    Store(#[from] netobject_store::StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
