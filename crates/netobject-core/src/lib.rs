//! # Netobject Core
//!
//! Pure primitives for versioned content: names, version tags, interests,
//! and signed fragments.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over names and cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`ContentName`] - Hierarchical name made of [`NameComponent`]s
//! - [`VersionTag`] - Time-derived, totally ordered version marker
//! - [`Interest`] - A query with an [`Exclude`] filter
//! - [`Fragment`] - One signed, immutable unit of content
//!
//! ## Naming profile
//!
//! How versions and segments are laid out in names, and how version queries
//! are built, lives in [`profile`].

pub mod bloom;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod fragment;
pub mod interest;
pub mod name;
pub mod profile;
pub mod validation;
pub mod version;

pub use bloom::BloomFilter;
pub use canonical::{decode_fragment, encode_fragment, signed_bytes};
pub use crypto::{Blake3Hash, Ed25519PublicKey, Ed25519Signature, Keypair, PublisherDigest};
pub use error::{CoreError, ValidationError};
pub use fragment::{ContentType, Fragment, FragmentBuilder, KeyLocator, SignedInfo};
pub use interest::{ChildSelector, Exclude, Interest, OPTIMUM_FILTER_SIZE};
pub use name::{ContentName, NameComponent};
pub use validation::{validate_fragment, validate_fragment_structure, validate_fragment_with_key};
pub use version::VersionTag;
