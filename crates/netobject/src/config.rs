//! Object configuration.
//!
//! One [`ObjectConfig`] describes everything an object is built from: the
//! name it lives under, the identity it signs as, where its first value comes
//! from, and how saves reach the network.

use std::sync::Arc;
use std::time::Duration;

use netobject_core::{ContentName, Fragment, KeyLocator, PublisherDigest};
use netobject_net::{SaveMode, WritePath};

/// Default timeout for blocking updates and follow-up fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Signing identity for saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Publisher to sign as; the key manager's default when absent.
    pub publisher: Option<PublisherDigest>,
    /// Locator to stamp on saved fragments; the signing key when absent.
    pub key_locator: Option<KeyLocator>,
}

impl Identity {
    pub fn publisher(publisher: PublisherDigest) -> Self {
        Self {
            publisher: Some(publisher),
            key_locator: None,
        }
    }
}

/// Where the object's first value comes from.
#[derive(Debug, Clone)]
pub enum InitialContent<T> {
    /// Nothing yet.
    Empty,
    /// A local value, dirty until saved.
    Value(T),
    /// Read the named version, or the latest one, optionally from one publisher.
    Read { publisher: Option<PublisherDigest> },
    /// Ingest from a first fragment already in hand.
    Fragment(Fragment),
}

/// How saves reach the network.
#[derive(Clone)]
pub enum WriteMode {
    /// Chosen later with `set_save_mode` or `setup_save`.
    Deferred,
    Raw,
    Repository,
    /// Use this write path; its mode becomes the object's save mode.
    Explicit(Arc<dyn WritePath>),
}

impl WriteMode {
    pub(crate) fn save_mode(&self) -> Option<SaveMode> {
        match self {
            WriteMode::Deferred => None,
            WriteMode::Raw => Some(SaveMode::Raw),
            WriteMode::Repository => Some(SaveMode::Repository),
            WriteMode::Explicit(path) => Some(path.save_mode()),
        }
    }
}

impl std::fmt::Debug for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Deferred => write!(f, "Deferred"),
            WriteMode::Raw => write!(f, "Raw"),
            WriteMode::Repository => write!(f, "Repository"),
            WriteMode::Explicit(path) => write!(f, "Explicit({})", path.save_mode()),
        }
    }
}

/// Configuration for a [`VersionedObject`](crate::VersionedObject).
#[derive(Debug, Clone)]
pub struct ObjectConfig<T> {
    /// Base name, or a versioned name to read. Derived from the fragment
    /// when reading from one.
    pub name: Option<ContentName>,
    pub identity: Identity,
    pub initial: InitialContent<T>,
    pub write_mode: WriteMode,
    /// Timeout for construction-time reads and follow-up fetches.
    pub default_timeout: Duration,
}

impl<T> Default for ObjectConfig<T> {
    fn default() -> Self {
        Self {
            name: None,
            identity: Identity::default(),
            initial: InitialContent::Empty,
            write_mode: WriteMode::Deferred,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl<T> ObjectConfig<T> {
    /// An object to write under `name`, saved raw unless changed.
    pub fn for_write(name: ContentName, value: Option<T>) -> Self {
        Self {
            name: Some(name),
            initial: value.map_or(InitialContent::Empty, InitialContent::Value),
            write_mode: WriteMode::Raw,
            ..Self::default()
        }
    }

    /// An object read from `name`: that version if versioned, else the latest.
    pub fn read(name: ContentName) -> Self {
        Self {
            name: Some(name),
            initial: InitialContent::Read { publisher: None },
            ..Self::default()
        }
    }

    /// Like [`read`](Self::read), accepting only content from `publisher`.
    pub fn read_from_publisher(name: ContentName, publisher: PublisherDigest) -> Self {
        Self {
            name: Some(name),
            initial: InitialContent::Read {
                publisher: Some(publisher),
            },
            ..Self::default()
        }
    }

    /// An object loaded from a first fragment already in hand.
    pub fn from_first_fragment(fragment: Fragment) -> Self {
        Self {
            initial: InitialContent::Fragment(fragment),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories() {
        let name = ContentName::parse("/doc").unwrap();

        let write = ObjectConfig::for_write(name.clone(), Some(7u32));
        assert!(matches!(write.initial, InitialContent::Value(7)));
        assert_eq!(write.write_mode.save_mode(), Some(SaveMode::Raw));

        let read = ObjectConfig::<u32>::read(name.clone());
        assert!(matches!(read.initial, InitialContent::Read { publisher: None }));
        assert_eq!(read.write_mode.save_mode(), None);
        assert_eq!(read.default_timeout, DEFAULT_TIMEOUT);

        let empty = ObjectConfig::<u32>::for_write(name, None)
            .with_write_mode(WriteMode::Repository)
            .with_timeout(Duration::from_millis(10));
        assert!(matches!(empty.initial, InitialContent::Empty));
        assert_eq!(empty.write_mode.save_mode(), Some(SaveMode::Repository));
        assert_eq!(empty.default_timeout, Duration::from_millis(10));
    }
}
