//! # Netobject Net
//!
//! The network services a versioned object talks to: query dispatch, write
//! paths, key management, and segment reassembly.
//!
//! ## Overview
//!
//! - [`QueryDispatcher`]: blocking gets and long-lived expressed interests
//! - [`WritePath`]: publishes saved versions, raw or through a repository
//! - [`KeyManager`]: signing identities and verification keys
//! - [`SegmentReader`]: resolves a name to a version and reads it back
//! - [`MemoryNetwork`]: an in-process network implementing all of the above
//!
//! Everything an object needs is bundled in a [`NetworkHandle`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod keys;
pub mod memory;
pub mod reader;
pub mod segmenter;
pub mod write_path;
pub mod writers;

pub use config::{NetConfig, DEFAULT_SEGMENT_SIZE};
pub use dispatcher::{ContentListener, InterestId, QueryDispatcher};
pub use error::{NetError, Result};
pub use handle::NetworkHandle;
pub use keys::{KeyManager, MemoryKeyManager};
pub use memory::MemoryNetwork;
pub use reader::SegmentReader;
pub use segmenter::{Segmenter, SignedStream};
pub use write_path::{SaveMode, StreamWrite, WriteAck, WritePath, WritePathFactory};
pub use writers::{MemoryWritePathFactory, RawWritePath, RepositoryWritePath};
