//! Key management: which identities can sign, and how to find their keys.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use netobject_core::{Ed25519PublicKey, KeyLocator, Keypair, PublisherDigest};

/// Source of signing identities and verification keys.
pub trait KeyManager: Send + Sync {
    /// The identity used when a caller does not name one.
    fn default_publisher(&self) -> PublisherDigest;

    /// The signing keypair for a publisher, if held locally.
    fn keypair(&self, publisher: &PublisherDigest) -> Option<Keypair>;

    /// The verification key for a publisher, if known.
    fn public_key(&self, publisher: &PublisherDigest) -> Option<Ed25519PublicKey>;

    /// The key locator to stamp on content signed by `publisher`.
    fn key_locator(&self, publisher: &PublisherDigest) -> Option<KeyLocator> {
        self.public_key(publisher).map(KeyLocator::Key)
    }
}

/// In-memory key manager.
pub struct MemoryKeyManager {
    default: PublisherDigest,
    inner: RwLock<KeyRing>,
}

#[derive(Default)]
struct KeyRing {
    keypairs: HashMap<PublisherDigest, Keypair>,
    public_keys: HashMap<PublisherDigest, Ed25519PublicKey>,
}

impl MemoryKeyManager {
    /// Create a key manager whose default identity is `keypair`.
    pub fn new(keypair: Keypair) -> Self {
        let default = keypair.publisher();
        let mut ring = KeyRing::default();
        ring.public_keys.insert(default, keypair.public_key());
        ring.keypairs.insert(default, keypair);
        Self {
            default,
            inner: RwLock::new(ring),
        }
    }

    /// Create a key manager with a freshly generated default identity.
    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }

    /// Add a signing identity. Returns its publisher digest.
    pub fn add_keypair(&self, keypair: Keypair) -> PublisherDigest {
        let publisher = keypair.publisher();
        let mut ring = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        ring.public_keys.insert(publisher, keypair.public_key());
        ring.keypairs.insert(publisher, keypair);
        publisher
    }

    /// Trust a verification key without holding its private half.
    pub fn add_public_key(&self, key: Ed25519PublicKey) -> PublisherDigest {
        let publisher = key.digest();
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .public_keys
            .insert(publisher, key);
        publisher
    }
}

impl KeyManager for MemoryKeyManager {
    fn default_publisher(&self) -> PublisherDigest {
        self.default
    }

    fn keypair(&self, publisher: &PublisherDigest) -> Option<Keypair> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keypairs
            .get(publisher)
            .cloned()
    }

    fn public_key(&self, publisher: &PublisherDigest) -> Option<Ed25519PublicKey> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .public_keys
            .get(publisher)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_identity() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let keys = MemoryKeyManager::new(keypair.clone());
        assert_eq!(keys.default_publisher(), keypair.publisher());
        assert!(keys.keypair(&keypair.publisher()).is_some());
        assert_eq!(
            keys.key_locator(&keypair.publisher()),
            Some(KeyLocator::Key(keypair.public_key()))
        );
    }

    #[test]
    fn test_public_key_only() {
        let keys = MemoryKeyManager::generate();
        let other = Keypair::from_seed(&[2; 32]);
        let publisher = keys.add_public_key(other.public_key());
        assert!(keys.keypair(&publisher).is_none());
        assert_eq!(keys.public_key(&publisher), Some(other.public_key()));
    }
}
