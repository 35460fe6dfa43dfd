//! The managed state of one versioned object.

use std::cell::OnceCell;

use netobject_core::{profile, ContentName, KeyLocator, PublisherDigest, VersionTag};

use crate::error::{ObjectError, Result};

/// A version being adopted from the network.
#[derive(Debug, Clone)]
pub struct Adoption<T> {
    pub base: ContentName,
    pub version: VersionTag,
    pub publisher: PublisherDigest,
    pub key_locator: KeyLocator,
    /// The decoded value; `None` for a tombstone.
    pub payload: Option<T>,
}

/// A version this object just wrote.
#[derive(Debug, Clone)]
pub struct SavedVersion {
    pub version: VersionTag,
    pub publisher: PublisherDigest,
    pub key_locator: KeyLocator,
    pub gone: bool,
    /// The edit count the saved value was taken at.
    pub edits: u64,
}

/// Version, payload, and flags of one object.
///
/// Every mutation goes through a method that keeps the flags consistent: a
/// tombstone has no payload, loading any version clears dirtiness, and a
/// version change drops the cached versioned name.
#[derive(Debug)]
pub struct ObjectState<T> {
    base_name: Option<ContentName>,
    version: Option<VersionTag>,
    versioned_name: OnceCell<ContentName>,
    publisher: Option<PublisherDigest>,
    key_locator: Option<KeyLocator>,
    payload: Option<T>,
    gone: bool,
    dirty: bool,
    available: bool,
    /// Bumped on every local payload change.
    edits: u64,
}

impl<T> ObjectState<T> {
    pub fn new(base_name: Option<ContentName>) -> Self {
        Self {
            base_name,
            version: None,
            versioned_name: OnceCell::new(),
            publisher: None,
            key_locator: None,
            payload: None,
            gone: false,
            dirty: false,
            available: false,
            edits: 0,
        }
    }

    pub fn base_name(&self) -> Option<&ContentName> {
        self.base_name.as_ref()
    }

    /// The base name, which must be set before any update or save.
    pub fn require_base(&self) -> Result<&ContentName> {
        self.base_name
            .as_ref()
            .filter(|name| !name.is_empty())
            .ok_or(ObjectError::MissingName)
    }

    pub fn version(&self) -> Option<VersionTag> {
        self.version
    }

    /// The versioned name of the current version, cached until the version changes.
    pub fn versioned_name(&self) -> Option<&ContentName> {
        let version = self.version?;
        let base = self.base_name.as_ref()?;
        Some(
            self.versioned_name
                .get_or_init(|| profile::add_version(base, version)),
        )
    }

    /// The most specific name known: the versioned name, else the base name.
    pub fn known_name(&self) -> Result<ContentName> {
        let base = self.require_base()?;
        Ok(self.versioned_name().unwrap_or(base).clone())
    }

    pub fn publisher(&self) -> Option<PublisherDigest> {
        self.publisher
    }

    pub fn key_locator(&self) -> Option<&KeyLocator> {
        self.key_locator.as_ref()
    }

    /// The current value.
    ///
    /// Fails with [`ObjectError::ContentGone`] for a tombstone and
    /// [`ObjectError::ContentNotReady`] before any value exists.
    pub fn payload(&self) -> Result<&T> {
        if self.gone {
            return Err(ObjectError::ContentGone);
        }
        self.payload.as_ref().ok_or(ObjectError::ContentNotReady)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Replace the value locally. Clears the gone flag and marks the object dirty.
    pub fn set_payload(&mut self, payload: T) {
        self.payload = Some(payload);
        self.gone = false;
        self.dirty = true;
        self.available = true;
        self.edits += 1;
    }

    pub fn is_gone(&self) -> bool {
        self.gone
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn edits(&self) -> u64 {
        self.edits
    }

    /// Whether `version` of `base` would move this object forward.
    ///
    /// A different base name always counts as newer.
    pub fn is_newer(&self, base: &ContentName, version: VersionTag) -> bool {
        match (&self.base_name, self.version) {
            (Some(current), Some(known)) if profile::base_name(current) == *base => version > known,
            _ => true,
        }
    }

    /// Adopt a version read from the network. Returns `false` and changes
    /// nothing if the version is not newer than the current one.
    pub fn adopt(&mut self, adoption: Adoption<T>) -> bool {
        if !self.is_newer(&adoption.base, adoption.version) {
            return false;
        }
        self.gone = adoption.payload.is_none();
        self.payload = adoption.payload;
        self.publisher = Some(adoption.publisher);
        self.key_locator = Some(adoption.key_locator);
        self.dirty = false;
        self.available = true;
        self.set_version(adoption.base, adoption.version);
        true
    }

    /// Record a completed save.
    ///
    /// A value edited after the save began stays dirty. If a newer version
    /// was adopted while the save was in flight, that version is kept and
    /// `false` is returned.
    pub fn commit_save(&mut self, saved: SavedVersion) -> bool {
        let base = match &self.base_name {
            Some(base) => profile::base_name(base),
            None => return false,
        };
        if !self.is_newer(&base, saved.version) {
            if !saved.gone && self.edits == saved.edits {
                self.dirty = false;
            }
            return false;
        }

        if saved.gone {
            self.payload = None;
            self.gone = true;
            self.dirty = false;
        } else {
            self.gone = false;
            self.dirty = self.edits != saved.edits;
        }
        self.publisher = Some(saved.publisher);
        self.key_locator = Some(saved.key_locator);
        self.available = true;
        self.set_version(base, saved.version);
        true
    }

    fn set_version(&mut self, base: ContentName, version: VersionTag) {
        self.base_name = Some(base);
        self.version = Some(version);
        self.versioned_name = OnceCell::new();
    }
}
