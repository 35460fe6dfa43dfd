//! Content names: ordered sequences of opaque components.
//!
//! Components compare in canonical order: a shorter component sorts before a
//! longer one, and components of equal length compare bytewise. This is the
//! order interest selectors and exclusion bounds are defined over.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::CoreError;

/// A single name component.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(Bytes);

impl NameComponent {
    /// Create a component from raw bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Create a component from a UTF-8 string.
    pub fn from_str_bytes(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the component is zero-length.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First byte, used as a type marker by the naming profiles.
    pub fn marker(&self) -> Option<u8> {
        self.0.first().copied()
    }

    fn write_escaped(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl Ord for NameComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.as_ref().cmp(other.0.as_ref()))
    }
}

impl PartialOrd for NameComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameComponent(")?;
        self.write_escaped(f)?;
        write!(f, ")")
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_escaped(f)
    }
}

impl AsRef<[u8]> for NameComponent {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        Self::from_str_bytes(s)
    }
}

impl From<Vec<u8>> for NameComponent {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

/// A hierarchical content name.
///
/// Names order component-by-component; a prefix sorts before every name it
/// is a prefix of.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentName(Vec<NameComponent>);

impl ContentName {
    /// The empty (root) name.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a name from components.
    pub fn from_components(components: Vec<NameComponent>) -> Self {
        Self(components)
    }

    /// Parse a URI-style name such as `/parc/doc/%FD%01`.
    ///
    /// An optional `ccnx:` scheme is accepted. Bytes outside the unreserved
    /// set must be percent-escaped; empty components are rejected.
    pub fn parse(uri: &str) -> Result<Self, CoreError> {
        let path = uri.strip_prefix("ccnx:").unwrap_or(uri);
        if !path.starts_with('/') {
            return Err(CoreError::InvalidName(format!(
                "name must start with '/': {uri}"
            )));
        }

        let trimmed = path.trim_start_matches('/').trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut components = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(CoreError::InvalidName(format!("empty component in {uri}")));
            }
            components.push(NameComponent::from(unescape(part)?));
        }
        Ok(Self(components))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a component by position.
    pub fn component(&self, index: usize) -> Option<&NameComponent> {
        self.0.get(index)
    }

    /// The last component, if any.
    pub fn last_component(&self) -> Option<&NameComponent> {
        self.0.last()
    }

    /// All components.
    pub fn components(&self) -> &[NameComponent] {
        &self.0
    }

    /// A new name with `component` appended.
    pub fn append(&self, component: NameComponent) -> Self {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }

    /// Push a component in place.
    pub fn push(&mut self, component: NameComponent) {
        self.0.push(component);
    }

    /// The first `count` components (the whole name if it is shorter).
    pub fn cut(&self, count: usize) -> Self {
        Self(self.0.iter().take(count).cloned().collect())
    }

    /// Whether this name is a prefix of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &ContentName) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for ContentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentName({})", self)
    }
}

impl fmt::Display for ContentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/")?;
            component.write_escaped(f)?;
        }
        Ok(())
    }
}

impl From<Vec<NameComponent>> for ContentName {
    fn from(components: Vec<NameComponent>) -> Self {
        Self(components)
    }
}

fn unescape(part: &str) -> Result<Vec<u8>, CoreError> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex_pair = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| CoreError::InvalidName(format!("truncated escape in {part}")))?;
            let decoded = hex::decode(hex_pair)
                .map_err(|e| CoreError::InvalidName(format!("bad escape in {part}: {e}")))?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}
