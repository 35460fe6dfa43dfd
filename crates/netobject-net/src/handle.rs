//! The bundle of network services an object is built against.

use std::sync::Arc;

use crate::config::NetConfig;
use crate::dispatcher::QueryDispatcher;
use crate::error::Result;
use crate::keys::KeyManager;
use crate::reader::SegmentReader;
use crate::write_path::{SaveMode, WritePath, WritePathFactory};

/// Dispatcher, keys, and write path factory for one participant.
#[derive(Clone)]
pub struct NetworkHandle {
    pub dispatcher: Arc<dyn QueryDispatcher>,
    pub keys: Arc<dyn KeyManager>,
    pub writers: Arc<dyn WritePathFactory>,
    pub config: NetConfig,
}

impl NetworkHandle {
    pub fn new(
        dispatcher: Arc<dyn QueryDispatcher>,
        keys: Arc<dyn KeyManager>,
        writers: Arc<dyn WritePathFactory>,
        config: NetConfig,
    ) -> Self {
        Self {
            dispatcher,
            keys,
            writers,
            config,
        }
    }

    /// A reader that fetches through this handle's dispatcher.
    pub fn reader(&self) -> SegmentReader {
        SegmentReader::new(self.dispatcher.clone(), self.keys.clone(), self.config.clone())
    }

    /// Open a write path in `mode`.
    pub fn open_writer(&self, mode: SaveMode) -> Result<Arc<dyn WritePath>> {
        self.writers.open(mode)
    }
}
