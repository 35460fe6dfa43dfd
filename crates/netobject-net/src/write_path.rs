//! Write paths: where saved versions go.
//!
//! A write path either puts fragments straight onto the network (raw) or
//! hands them to a durable store that then serves them (repository). The
//! mode is chosen when the write path is opened and never changes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use netobject_core::{ContentName, ContentType, Fragment, Interest, KeyLocator, PublisherDigest};

use crate::error::Result;

/// How saved content reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveMode {
    /// Put fragments directly to the network.
    Raw,
    /// Save fragments into a durable store that serves them.
    Repository,
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMode::Raw => write!(f, "raw"),
            SaveMode::Repository => write!(f, "repository"),
        }
    }
}

/// A versioned payload to segment, sign, and publish.
#[derive(Debug, Clone)]
pub struct StreamWrite {
    /// The versioned name; segments are appended beneath it.
    pub name: ContentName,
    pub payload: Bytes,
    pub content_type: ContentType,
    /// Signing identity; the key manager's default when absent.
    pub publisher: Option<PublisherDigest>,
    /// Locator stamped on every fragment; the signing key when absent.
    pub key_locator: Option<KeyLocator>,
    /// A previously received interest this write should answer.
    pub outstanding: Option<Interest>,
}

impl StreamWrite {
    pub fn new(name: ContentName, payload: impl Into<Bytes>) -> Self {
        Self {
            name,
            payload: payload.into(),
            content_type: ContentType::Data,
            publisher: None,
            key_locator: None,
            outstanding: None,
        }
    }
}

/// Acknowledgement of a completed write.
#[derive(Debug, Clone)]
pub struct WriteAck {
    /// Identity that signed the fragments.
    pub publisher: PublisherDigest,
    pub key_locator: KeyLocator,
    /// Number of fragments written.
    pub fragments: usize,
    /// Whether the bound outstanding interest was answered by this write.
    pub satisfied_outstanding: bool,
}

/// Publishes content on behalf of one object.
#[async_trait]
pub trait WritePath: Send + Sync {
    /// The mode this write path was opened with.
    fn save_mode(&self) -> SaveMode;

    /// Make sure interests under `prefix` reach this writer. Idempotent.
    async fn ensure_registered(&self, prefix: &ContentName) -> Result<()>;

    /// Segment, sign, and publish a payload.
    async fn put_stream(&self, write: StreamWrite) -> Result<WriteAck>;

    /// Publish one already-signed fragment.
    async fn put_fragment(&self, fragment: Fragment, outstanding: Option<Interest>)
        -> Result<WriteAck>;
}

/// Opens write paths on demand.
pub trait WritePathFactory: Send + Sync {
    /// Open a write path in `mode`.
    fn open(&self, mode: SaveMode) -> Result<Arc<dyn WritePath>>;
}
