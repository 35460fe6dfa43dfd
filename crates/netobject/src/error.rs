//! Error types for versioned objects.

use netobject_core::{ContentName, CoreError};
use netobject_net::{NetError, SaveMode};
use thiserror::Error;

/// Errors that can occur while updating or saving a versioned object.
///
/// Timeouts and "nothing newer yet" are not errors; they are reported as
/// `Ok(false)` by the operations that can encounter them.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The object has no base name to update from or save under.
    #[error("object has no name")]
    MissingName,

    /// Tombstones mark the latest version of a base name, not a fixed version.
    #[error("cannot save {0} as gone: name is already versioned")]
    VersionedTombstone(ContentName),

    /// A dirty object with no payload.
    #[error("no data to save")]
    NothingToSave,

    /// No save mode has been chosen for this object.
    #[error("no write path configured")]
    NoWritePath,

    /// The save mode is fixed once a write path exists.
    #[error("save mode already {current}, cannot change to {requested}")]
    SaveModeLocked { current: SaveMode, requested: SaveMode },

    /// The current version is a tombstone.
    #[error("content is gone")]
    ContentGone,

    /// No version has been loaded or set yet.
    #[error("content not ready")]
    ContentNotReady,

    /// A first fragment whose name carries no version.
    #[error("not a versioned name: {0}")]
    Unversioned(ContentName),

    /// The payload at the expected name could not be decoded.
    #[error("decoding error: {0}")]
    Decode(String),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("network error: {0}")]
    Net(#[from] NetError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for versioned object operations.
pub type Result<T> = std::result::Result<T, ObjectError>;
