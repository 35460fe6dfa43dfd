//! # Netobject
//!
//! Mutable, versioned objects over a content network where published
//! content is named, signed, and never changes.
//!
//! ## Overview
//!
//! A [`VersionedObject`] presents the sequence of versions published under
//! one base name as a single value that can be:
//!
//! - **updated synchronously**: fetch the next version, waiting up to a timeout
//! - **updated in the background**: once, or continuously, with waiters woken
//!   on each new version
//! - **saved**: published as a new, later version, or as a tombstone
//!
//! ## Key Concepts
//!
//! - **Versions only move forward**: an object never adopts a version
//!   earlier than the one it holds.
//! - **Gone is not missing**: reading a tombstoned object fails with
//!   [`ObjectError::ContentGone`], distinct from
//!   [`ObjectError::ContentNotReady`].
//! - **Timeouts are not errors**: "nothing newer yet" is `Ok(false)`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use netobject::{ObjectConfig, VersionedObject};
//! use netobject::core::ContentName;
//! use netobject::net::{MemoryKeyManager, MemoryNetwork, NetConfig};
//!
//! async fn example() -> netobject::Result<()> {
//!     let network = MemoryNetwork::new(NetConfig::default());
//!     let handle = network.handle(Arc::new(MemoryKeyManager::generate()), None);
//!     let name = ContentName::parse("/parc/notes").unwrap();
//!
//!     let writer = VersionedObject::open(
//!         handle.clone(),
//!         ObjectConfig::for_write(name.clone(), Some("hello".to_string())),
//!     )
//!     .await?;
//!     writer.save().await?;
//!
//!     let reader: VersionedObject<String> =
//!         VersionedObject::open(handle, ObjectConfig::read(name)).await?;
//!     reader.update_in_background(None, true)?;
//!     reader.wait_for_newer(reader.version(), Duration::from_secs(1)).await;
//!     Ok(())
//! }
//! ```

pub mod background;
pub mod config;
pub mod error;
pub mod object;
pub mod state;

pub use background::{handle_batch, BackgroundQueryState, BatchOutcome, ConfirmedVersion};
pub use config::{Identity, InitialContent, ObjectConfig, WriteMode, DEFAULT_TIMEOUT};
pub use error::{ObjectError, Result};
pub use object::{Payload, VersionedObject};
pub use state::ObjectState;

/// Re-export of the primitives crate.
pub use netobject_core as core;
/// Re-export of the network services crate.
pub use netobject_net as net;
