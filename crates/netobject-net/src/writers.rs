//! Write paths backed by the in-process network.

use std::sync::Arc;

use async_trait::async_trait;
use netobject_core::{ContentName, Fragment, Interest};
use netobject_store::{ContentStore, SaveOutcome};

use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::keys::KeyManager;
use crate::memory::MemoryNetwork;
use crate::segmenter::{Segmenter, SignedStream};
use crate::write_path::{SaveMode, StreamWrite, WriteAck, WritePath, WritePathFactory};

fn answers(outstanding: &Option<Interest>, fragments: &[Fragment]) -> bool {
    outstanding
        .as_ref()
        .is_some_and(|interest| fragments.iter().any(|f| interest.matches(f)))
}

fn ack(stream: &SignedStream, outstanding: &Option<Interest>) -> WriteAck {
    WriteAck {
        publisher: stream.publisher,
        key_locator: stream.key_locator.clone(),
        fragments: stream.fragments.len(),
        satisfied_outstanding: answers(outstanding, &stream.fragments),
    }
}

/// Puts fragments directly on the network.
pub struct RawWritePath {
    network: Arc<MemoryNetwork>,
    segmenter: Segmenter,
}

impl RawWritePath {
    pub fn new(network: Arc<MemoryNetwork>, keys: Arc<dyn KeyManager>, config: NetConfig) -> Self {
        Self {
            network,
            segmenter: Segmenter::new(keys, config),
        }
    }
}

#[async_trait]
impl WritePath for RawWritePath {
    fn save_mode(&self) -> SaveMode {
        SaveMode::Raw
    }

    async fn ensure_registered(&self, prefix: &ContentName) -> Result<()> {
        self.network.register_prefix(prefix);
        Ok(())
    }

    async fn put_stream(&self, write: StreamWrite) -> Result<WriteAck> {
        let stream = self.segmenter.segment(&write)?;
        let ack = ack(&stream, &write.outstanding);
        self.network.put(stream.fragments)?;
        tracing::debug!(name = %write.name, fragments = ack.fragments, "raw write");
        Ok(ack)
    }

    async fn put_fragment(
        &self,
        fragment: Fragment,
        outstanding: Option<Interest>,
    ) -> Result<WriteAck> {
        let ack = WriteAck {
            publisher: fragment.signed_info.publisher,
            key_locator: fragment.signed_info.key_locator.clone(),
            fragments: 1,
            satisfied_outstanding: answers(&outstanding, std::slice::from_ref(&fragment)),
        };
        self.network.put(vec![fragment])?;
        Ok(ack)
    }
}

/// Saves fragments into a durable store, which the network then serves.
pub struct RepositoryWritePath {
    network: Arc<MemoryNetwork>,
    store: Arc<dyn ContentStore>,
    segmenter: Segmenter,
}

impl RepositoryWritePath {
    pub fn new(
        network: Arc<MemoryNetwork>,
        store: Arc<dyn ContentStore>,
        keys: Arc<dyn KeyManager>,
        config: NetConfig,
    ) -> Self {
        network.attach_store(store.clone());
        Self {
            network,
            store,
            segmenter: Segmenter::new(keys, config),
        }
    }

    async fn save(&self, fragments: &[Fragment]) -> Result<()> {
        for fragment in fragments {
            match self.store.save_fragment(fragment).await? {
                SaveOutcome::Inserted | SaveOutcome::AlreadyExists => {}
                SaveOutcome::Conflict { .. } => {
                    return Err(NetError::WriteConflict(fragment.name.clone()));
                }
            }
        }
        self.network.announce();
        Ok(())
    }
}

#[async_trait]
impl WritePath for RepositoryWritePath {
    fn save_mode(&self) -> SaveMode {
        SaveMode::Repository
    }

    async fn ensure_registered(&self, prefix: &ContentName) -> Result<()> {
        self.store.add_namespace(prefix).await?;
        self.network.register_prefix(prefix);
        Ok(())
    }

    async fn put_stream(&self, write: StreamWrite) -> Result<WriteAck> {
        let stream = self.segmenter.segment(&write)?;
        self.save(&stream.fragments).await?;
        tracing::debug!(name = %write.name, fragments = stream.fragments.len(), "repository write");
        Ok(ack(&stream, &write.outstanding))
    }

    async fn put_fragment(
        &self,
        fragment: Fragment,
        outstanding: Option<Interest>,
    ) -> Result<WriteAck> {
        self.save(std::slice::from_ref(&fragment)).await?;
        Ok(WriteAck {
            publisher: fragment.signed_info.publisher,
            key_locator: fragment.signed_info.key_locator.clone(),
            fragments: 1,
            satisfied_outstanding: answers(&outstanding, std::slice::from_ref(&fragment)),
        })
    }
}

/// Opens raw or repository write paths onto a [`MemoryNetwork`].
pub struct MemoryWritePathFactory {
    network: Arc<MemoryNetwork>,
    repository: Option<Arc<dyn ContentStore>>,
    keys: Arc<dyn KeyManager>,
    config: NetConfig,
}

impl MemoryWritePathFactory {
    pub fn new(
        network: Arc<MemoryNetwork>,
        repository: Option<Arc<dyn ContentStore>>,
        keys: Arc<dyn KeyManager>,
        config: NetConfig,
    ) -> Self {
        Self {
            network,
            repository,
            keys,
            config,
        }
    }
}

impl WritePathFactory for MemoryWritePathFactory {
    fn open(&self, mode: SaveMode) -> Result<Arc<dyn WritePath>> {
        match mode {
            SaveMode::Raw => Ok(Arc::new(RawWritePath::new(
                self.network.clone(),
                self.keys.clone(),
                self.config.clone(),
            ))),
            SaveMode::Repository => {
                let store = self
                    .repository
                    .clone()
                    .ok_or(NetError::WritePathUnavailable(SaveMode::Repository))?;
                Ok(Arc::new(RepositoryWritePath::new(
                    self.network.clone(),
                    store,
                    self.keys.clone(),
                    self.config.clone(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::QueryDispatcher;
    use crate::keys::MemoryKeyManager;
    use netobject_core::{profile, VersionTag};
    use netobject_store::MemoryContentStore;
    use std::time::Duration;

    fn versioned(ticks: u64) -> ContentName {
        profile::add_version(&ContentName::parse("/doc").unwrap(), VersionTag::from_ticks(ticks))
    }

    #[tokio::test]
    async fn test_raw_write_is_served() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys: Arc<dyn KeyManager> = Arc::new(MemoryKeyManager::generate());
        let writer = RawWritePath::new(network.clone(), keys, NetConfig::default());

        writer
            .ensure_registered(&ContentName::parse("/doc").unwrap())
            .await
            .unwrap();
        let ack = writer
            .put_stream(StreamWrite::new(versioned(1), b"abc".to_vec()))
            .await
            .unwrap();
        assert_eq!(ack.fragments, 1);
        assert!(!ack.satisfied_outstanding);
        assert_eq!(network.registered_prefixes().len(), 1);

        let interest = profile::first_segment_interest(&versioned(1), None);
        let found = network.get(&interest, Duration::from_millis(50)).await.unwrap();
        assert_eq!(&found.unwrap().content[..], b"abc");
    }

    #[tokio::test]
    async fn test_outstanding_interest_answered() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys: Arc<dyn KeyManager> = Arc::new(MemoryKeyManager::generate());
        let writer = RawWritePath::new(network, keys, NetConfig::default());

        let base = ContentName::parse("/doc").unwrap();
        let mut write = StreamWrite::new(versioned(2), b"abc".to_vec());
        write.outstanding = Some(profile::first_fragment_query_for_next_version(&versioned(1), None));
        assert!(base.is_prefix_of(&write.name));
        let ack = writer.put_stream(write).await.unwrap();
        assert!(ack.satisfied_outstanding);
    }

    #[tokio::test]
    async fn test_repository_write_persists_and_serves() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys: Arc<dyn KeyManager> = Arc::new(MemoryKeyManager::generate());
        let store = Arc::new(MemoryContentStore::new());
        let factory = MemoryWritePathFactory::new(
            network.clone(),
            Some(store.clone() as Arc<dyn ContentStore>),
            keys,
            NetConfig::default(),
        );

        let writer = factory.open(SaveMode::Repository).unwrap();
        assert_eq!(writer.save_mode(), SaveMode::Repository);
        writer
            .ensure_registered(&ContentName::parse("/doc").unwrap())
            .await
            .unwrap();
        writer
            .put_stream(StreamWrite::new(versioned(1), b"abc".to_vec()))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.namespaces().await.unwrap().len(), 1);
        let interest = profile::first_segment_interest(&versioned(1), None);
        assert!(network
            .get(&interest, Duration::from_millis(50))
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_repository_requires_store() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys: Arc<dyn KeyManager> = Arc::new(MemoryKeyManager::generate());
        let factory = MemoryWritePathFactory::new(network, None, keys, NetConfig::default());
        assert!(matches!(
            factory.open(SaveMode::Repository),
            Err(NetError::WritePathUnavailable(SaveMode::Repository))
        ));
        assert_eq!(factory.open(SaveMode::Raw).unwrap().save_mode(), SaveMode::Raw);
    }
}
