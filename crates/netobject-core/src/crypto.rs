//! Cryptographic primitives for content fragments.
//!
//! Fragments are signed with Ed25519. A publisher is named by the Blake3
//! digest of its public key; interests filter on that digest and key
//! locators may carry it instead of the key itself.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Hex helpers and a short `Debug` form for a fixed-size byte newtype.
macro_rules! hex_bytes {
    ($ty:ident, $len:literal, $label:literal) => {
        impl $ty {
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                <[u8; $len]>::try_from(bytes.as_slice())
                    .map(Self)
                    .map_err(|_| hex::FromHexError::InvalidStringLength)
            }

            fn short_hex(&self) -> String {
                hex::encode(&self.0[..8])
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.short_hex())
            }
        }
    };
}

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

hex_bytes!(Blake3Hash, 32, "Blake3");

impl Blake3Hash {
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

hex_bytes!(Ed25519PublicKey, 32, "Ed25519Pub");

impl Ed25519PublicKey {
    /// The digest that identifies this key as a publisher.
    pub fn digest(&self) -> PublisherDigest {
        PublisherDigest(Blake3Hash::hash(&self.0).0)
    }

    /// Check `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

hex_bytes!(Ed25519Signature, 64, "Ed25519Sig");

/// Blake3 digest of a publisher's public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublisherDigest(pub [u8; 32]);

hex_bytes!(PublisherDigest, 32, "Publisher");

impl fmt::Display for PublisherDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_hex())
    }
}

/// A signing identity.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn publisher(&self) -> PublisherDigest {
        self.public_key().digest()
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.publisher()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_covers_message() {
        let keypair = Keypair::from_seed(&[7; 32]);
        let signature = keypair.sign(b"segment bytes");

        assert!(keypair.public_key().verify(b"segment bytes", &signature).is_ok());
        assert!(matches!(
            keypair.public_key().verify(b"segment bytez", &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_key_rejects() {
        let signer = Keypair::from_seed(&[1; 32]);
        let other = Keypair::from_seed(&[2; 32]);
        let signature = signer.sign(b"m");
        assert!(other.public_key().verify(b"m", &signature).is_err());
    }

    #[test]
    fn test_publisher_digest_stable_per_key() {
        let a = Keypair::from_seed(&[0x42; 32]);
        let b = Keypair::from_seed(&[0x42; 32]);
        assert_eq!(a.publisher(), b.publisher());
        assert_eq!(a.publisher(), a.public_key().digest());
        assert_ne!(a.publisher(), Keypair::from_seed(&[0x43; 32]).publisher());
    }

    #[test]
    fn test_hex_parsing() {
        let publisher = Keypair::generate().publisher();
        assert_eq!(PublisherDigest::from_hex(&publisher.to_hex()).unwrap(), publisher);
        assert!(PublisherDigest::from_hex("abcd").is_err());
        assert!(Ed25519PublicKey::from_hex("zz").is_err());
        assert_eq!(publisher.to_string().len(), 16);
    }
}
