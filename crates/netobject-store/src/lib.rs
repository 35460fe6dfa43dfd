//! # Netobject Store
//!
//! Durable content storage. Provides a trait-based interface for fragment
//! persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The [`ContentStore`] trait is the save/query surface a repository-backed
//! write path uses. The primary implementation is [`SqliteStore`], with
//! [`MemoryContentStore`] for testing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use netobject_store::{ContentStore, SqliteStore};
//! use netobject_core::{ContentName, Interest};
//!
//! async fn example() {
//!     let store = SqliteStore::open("content.db").unwrap();
//!     let prefix = ContentName::parse("/parc/doc").unwrap();
//!     store.add_namespace(&prefix).await.unwrap();
//!     let _latest = store.find_match(&Interest::new(prefix)).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent saves**: saving the same fragment twice returns `AlreadyExists`
//! - **Immutability**: a different fragment under a stored name returns `Conflict`
//! - **No enumeration protocol**: namespaces are recorded, never announced

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryContentStore;
pub use sqlite::SqliteStore;
pub use traits::{ContentStore, SaveOutcome};
