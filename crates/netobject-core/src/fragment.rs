//! Fragments: named, signed, immutable units of content.
//!
//! A published version is a sequence of fragments named `version/segN`. The
//! first fragment carries the signing metadata a reader adopts along with
//! the version.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::signed_bytes;
use crate::crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, PublisherDigest};
use crate::name::ContentName;
use crate::profile;

/// What a fragment's content represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContentType {
    /// Application bytes.
    Data = 0,
    /// Deliberate withdrawal marker: empty and terminal.
    Gone = 1,
    /// A published public key.
    Key = 2,
}

impl ContentType {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Gone),
            2 => Some(Self::Key),
            _ => None,
        }
    }
}

/// Where to find the key that verifies a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyLocator {
    /// The key itself.
    Key(Ed25519PublicKey),
    /// The name the key is published under, optionally pinned to its publisher.
    KeyName {
        name: ContentName,
        publisher: Option<PublisherDigest>,
    },
}

impl KeyLocator {
    /// The embedded key, if this locator carries one.
    pub fn key(&self) -> Option<&Ed25519PublicKey> {
        match self {
            KeyLocator::Key(key) => Some(key),
            KeyLocator::KeyName { .. } => None,
        }
    }
}

/// Signed metadata carried by every fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    /// Digest of the signing key.
    pub publisher: PublisherDigest,

    /// Publisher-claimed signing time (Unix milliseconds). Untrusted.
    pub timestamp: i64,

    pub content_type: ContentType,

    /// Segment number of the last fragment in this version, when known.
    pub final_segment: Option<u64>,

    pub key_locator: KeyLocator,

    /// How long caches may treat this fragment as fresh.
    pub freshness_seconds: Option<u32>,
}

/// A complete fragment: name + signed info + content + signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: ContentName,
    pub signed_info: SignedInfo,
    pub content: Bytes,
    /// Ed25519 signature over the canonical signed bytes.
    pub signature: Ed25519Signature,
}

impl Fragment {
    /// The publisher digest.
    pub fn publisher(&self) -> &PublisherDigest {
        &self.signed_info.publisher
    }

    /// Whether this fragment is a withdrawal marker.
    pub fn is_gone(&self) -> bool {
        self.signed_info.content_type == ContentType::Gone
    }

    /// Segment number from the terminal name component, if it is one.
    pub fn segment_number(&self) -> Option<u64> {
        profile::segment_number(&self.name)
    }

    /// Whether this is the last fragment of its version.
    pub fn is_final_segment(&self) -> bool {
        match (self.segment_number(), self.signed_info.final_segment) {
            (Some(segment), Some(last)) => segment == last,
            _ => false,
        }
    }

    /// The bytes the signature covers.
    pub fn signed_bytes(&self) -> Vec<u8> {
        signed_bytes(&self.name, &self.signed_info, &self.content)
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("name", &self.name)
            .field("type", &self.signed_info.content_type)
            .field("publisher", &self.signed_info.publisher)
            .field("final_segment", &self.signed_info.final_segment)
            .field("content_len", &self.content.len())
            .finish()
    }
}

/// Builder for signed fragments.
pub struct FragmentBuilder {
    name: ContentName,
    timestamp: Option<i64>,
    content_type: ContentType,
    final_segment: Option<u64>,
    key_locator: Option<KeyLocator>,
    freshness_seconds: Option<u32>,
    content: Bytes,
}

impl FragmentBuilder {
    pub fn new(name: ContentName) -> Self {
        Self {
            name,
            timestamp: None,
            content_type: ContentType::Data,
            final_segment: None,
            key_locator: None,
            freshness_seconds: None,
            content: Bytes::new(),
        }
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn final_segment(mut self, final_segment: u64) -> Self {
        self.final_segment = Some(final_segment);
        self
    }

    /// Defaults to the signing key itself.
    pub fn key_locator(mut self, key_locator: KeyLocator) -> Self {
        self.key_locator = Some(key_locator);
        self
    }

    pub fn freshness_seconds(mut self, seconds: Option<u32>) -> Self {
        self.freshness_seconds = seconds;
        self
    }

    pub fn content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    /// Sign and build the fragment.
    pub fn sign(self, keypair: &Keypair) -> Fragment {
        let signed_info = SignedInfo {
            publisher: keypair.publisher(),
            timestamp: self.timestamp.unwrap_or_else(now_millis),
            content_type: self.content_type,
            final_segment: self.final_segment,
            key_locator: self
                .key_locator
                .unwrap_or_else(|| KeyLocator::Key(keypair.public_key())),
            freshness_seconds: self.freshness_seconds,
        };
        let message = signed_bytes(&self.name, &signed_info, &self.content);
        let signature = keypair.sign(&message);

        Fragment {
            name: self.name,
            signed_info,
            content: self.content,
            signature,
        }
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let keypair = Keypair::from_seed(&[9; 32]);
        let name = ContentName::parse("/doc/%FD%01/%00").unwrap();
        let fragment = FragmentBuilder::new(name.clone())
            .content(b"hi".to_vec())
            .final_segment(0)
            .sign(&keypair);

        assert_eq!(fragment.name, name);
        assert_eq!(fragment.publisher(), &keypair.publisher());
        assert_eq!(fragment.signed_info.key_locator.key(), Some(&keypair.public_key()));
        assert_eq!(fragment.segment_number(), Some(0));
        assert!(fragment.is_final_segment());
        assert!(!fragment.is_gone());
    }

    #[test]
    fn test_signature_covers_content() {
        let keypair = Keypair::from_seed(&[9; 32]);
        let mut fragment = FragmentBuilder::new(ContentName::parse("/doc").unwrap())
            .content(b"hi".to_vec())
            .sign(&keypair);
        let message = fragment.signed_bytes();
        assert!(keypair.public_key().verify(&message, &fragment.signature).is_ok());

        fragment.content = Bytes::from_static(b"ho");
        let tampered = fragment.signed_bytes();
        assert!(keypair.public_key().verify(&tampered, &fragment.signature).is_err());
    }

    #[test]
    fn test_content_type_codes() {
        for ty in [ContentType::Data, ContentType::Gone, ContentType::Key] {
            assert_eq!(ContentType::from_u8(ty.to_u8()), Some(ty));
        }
        assert_eq!(ContentType::from_u8(7), None);
    }
}
