//! Version tags and their name-component encoding.
//!
//! A version tag counts 1/4096ths of a second since the Unix epoch. It is
//! carried in a name as a component of the form `0xFD || big-endian(tag)`
//! with leading zero bytes stripped, so canonical component order and
//! numeric order agree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CoreError;
use crate::name::NameComponent;

/// Marker byte that introduces a version component.
pub const VERSION_MARKER: u8 = 0xFD;

/// Version tag ticks per second.
pub const TICKS_PER_SECOND: u64 = 4096;

/// A totally ordered version marker for one base name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionTag(pub u64);

impl VersionTag {
    /// Create a tag from a raw tick count.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Raw tick count.
    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Create a tag from Unix milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(TICKS_PER_SECOND) / 1000)
    }

    /// The tag for the current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::from_millis(millis)
    }

    /// Mint a fresh tag that is strictly later than `current`.
    ///
    /// Uses the wall clock unless the clock has not advanced past `current`.
    pub fn next_after(current: Option<VersionTag>) -> Self {
        let now = Self::now();
        match current {
            Some(current) if now <= current => Self(current.0.saturating_add(1)),
            _ => now,
        }
    }

    /// Encode as a name component.
    pub fn to_component(&self) -> NameComponent {
        let be = self.0.to_be_bytes();
        let skip = be.iter().take_while(|&&b| b == 0).count();
        let mut bytes = Vec::with_capacity(1 + be.len() - skip);
        bytes.push(VERSION_MARKER);
        bytes.extend_from_slice(&be[skip..]);
        NameComponent::from(bytes)
    }

    /// Decode from a name component.
    pub fn from_component(component: &NameComponent) -> Result<Self, CoreError> {
        let bytes = component.as_bytes();
        if bytes.first() != Some(&VERSION_MARKER) {
            return Err(CoreError::NotAVersion(component.to_string()));
        }
        let digits = &bytes[1..];
        if digits.len() > 8 || digits.first() == Some(&0) {
            return Err(CoreError::NotAVersion(component.to_string()));
        }
        let value = digits.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        Ok(Self(value))
    }

    /// Whether a component is a well-formed version component.
    pub fn is_version_component(component: &NameComponent) -> bool {
        Self::from_component(component).is_ok()
    }
}

impl fmt::Debug for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionTag({})", self.0)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_component())
    }
}
