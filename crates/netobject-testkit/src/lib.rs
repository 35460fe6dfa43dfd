//! # Netobject Testkit
//!
//! Testing utilities for network objects.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a [`TestNetwork`] with deterministic participants and
//!   helpers to publish versions directly
//! - **Generators**: Proptest strategies for names, versions, and delivery orders
//!
//! ## Test Fixtures
//!
//! ```rust
//! use netobject_testkit::fixtures::{name, TestNetwork};
//! use netobject_core::VersionTag;
//!
//! let net = TestNetwork::new();
//! let fragments = net.publish_version(1, &name("/doc"), VersionTag::from_ticks(1), b"hello");
//! assert_eq!(fragments.len(), 1);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use netobject_testkit::generators::increasing_versions;
//!
//! proptest! {
//!     #[test]
//!     fn versions_sorted(versions in increasing_versions(8)) {
//!         prop_assert!(versions.windows(2).all(|w| w[0] < w[1]));
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{name, TestNetwork};
