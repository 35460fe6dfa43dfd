//! Test fixtures and helpers.
//!
//! A [`TestNetwork`] is one in-process network with any number of
//! participants, each with its own deterministic identity.

use std::sync::Arc;

use netobject_core::{profile, ContentName, Fragment, Keypair, VersionTag};
use netobject_net::{
    KeyManager, MemoryKeyManager, MemoryNetwork, NetConfig, NetworkHandle, Segmenter, StreamWrite,
};
use netobject_store::{ContentStore, MemoryContentStore};

/// A shared network plus helpers for publishing content directly.
pub struct TestNetwork {
    pub network: Arc<MemoryNetwork>,
    pub config: NetConfig,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self::with_config(NetConfig::default())
    }

    pub fn with_config(config: NetConfig) -> Self {
        Self {
            network: MemoryNetwork::new(config.clone()),
            config,
        }
    }

    /// Deterministic keys for participant `index`.
    pub fn keys(index: u8) -> Arc<MemoryKeyManager> {
        let mut seed = [0u8; 32];
        seed[0] = index;
        seed[31] = 0x5a;
        Arc::new(MemoryKeyManager::new(Keypair::from_seed(&seed)))
    }

    /// A participant that writes raw.
    pub fn participant(&self, index: u8) -> NetworkHandle {
        self.network.handle(Self::keys(index), None)
    }

    /// A participant whose repository saves go to `store`.
    pub fn participant_with_store(&self, index: u8, store: Arc<dyn ContentStore>) -> NetworkHandle {
        self.network.handle(Self::keys(index), Some(store))
    }

    /// A participant backed by a fresh in-memory repository.
    pub fn participant_with_repository(&self, index: u8) -> (NetworkHandle, Arc<MemoryContentStore>) {
        let store = Arc::new(MemoryContentStore::new());
        let handle = self.participant_with_store(index, store.clone());
        (handle, store)
    }

    /// Segment and sign `payload` as `version` of `base`, signed by participant `index`.
    pub fn version_fragments(
        &self,
        index: u8,
        base: &ContentName,
        version: VersionTag,
        payload: &[u8],
    ) -> Vec<Fragment> {
        let keys: Arc<dyn KeyManager> = Self::keys(index);
        let write = StreamWrite::new(profile::add_version(base, version), payload.to_vec());
        Segmenter::new(keys, self.config.clone())
            .segment(&write)
            .map(|stream| stream.fragments)
            .unwrap_or_default()
    }

    /// Put a version straight onto the network. Returns the fragments published.
    pub fn publish_version(
        &self,
        index: u8,
        base: &ContentName,
        version: VersionTag,
        payload: &[u8],
    ) -> Vec<Fragment> {
        let fragments = self.version_fragments(index, base, version, payload);
        self.network.publish(fragments.clone());
        fragments
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a name, panicking on malformed test input.
pub fn name(uri: &str) -> ContentName {
    match ContentName::parse(uri) {
        Ok(name) => name,
        Err(e) => panic!("bad test name {uri}: {e}"),
    }
}
