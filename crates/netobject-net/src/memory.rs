//! An in-process content network.
//!
//! Holds raw puts, consults attached durable stores, answers blocking gets,
//! and keeps expressed interests pending until they are cancelled or their
//! listener retires them. Every change to available content bumps a
//! generation counter that waiting gets and pending interests watch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use netobject_core::{ContentName, Fragment, Interest};
use netobject_store::ContentStore;
use tokio::sync::watch;

use crate::config::NetConfig;
use crate::dispatcher::{ContentListener, InterestId, QueryDispatcher};
use crate::error::{NetError, Result};
use crate::handle::NetworkHandle;
use crate::keys::KeyManager;
use crate::writers::MemoryWritePathFactory;

/// Shared state for the in-process network.
pub struct MemoryNetwork {
    this: Weak<MemoryNetwork>,
    config: NetConfig,
    inner: Mutex<NetworkInner>,
    generation: watch::Sender<u64>,
}

#[derive(Default)]
struct NetworkInner {
    /// Fragments put directly, by name. First put wins.
    content: BTreeMap<ContentName, Fragment>,

    /// Durable stores whose content is also served.
    stores: Vec<Arc<dyn ContentStore>>,

    /// Prefixes some writer has registered for.
    prefixes: BTreeSet<ContentName>,

    pending: HashMap<InterestId, PendingInterest>,
    next_id: u64,
}

struct PendingInterest {
    interest: Interest,
    listener: Arc<dyn ContentListener>,
}

impl MemoryNetwork {
    /// Create a new network.
    pub fn new(config: NetConfig) -> Arc<Self> {
        let (generation, _) = watch::channel(0);
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config,
            inner: Mutex::new(NetworkInner::default()),
            generation,
        })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// A handle for one participant, signing with `keys`.
    ///
    /// When `repository` is given it is attached to the network and used for
    /// repository-mode writes.
    pub fn handle(
        self: &Arc<Self>,
        keys: Arc<dyn KeyManager>,
        repository: Option<Arc<dyn ContentStore>>,
    ) -> NetworkHandle {
        if let Some(store) = &repository {
            self.attach_store(store.clone());
        }
        let writers = MemoryWritePathFactory::new(
            self.clone(),
            repository,
            keys.clone(),
            self.config.clone(),
        );
        NetworkHandle::new(self.clone(), keys, Arc::new(writers), self.config.clone())
    }

    /// Serve a durable store's content. Attaching the same store twice is a no-op.
    pub fn attach_store(&self, store: Arc<dyn ContentStore>) {
        let mut inner = self.lock();
        if !inner.stores.iter().any(|s| Arc::ptr_eq(s, &store)) {
            inner.stores.push(store);
        }
        drop(inner);
        self.bump();
    }

    /// Put fragments directly on the network.
    ///
    /// A name that already holds a fragment keeps it. Returns how many
    /// fragments were new.
    pub fn publish(&self, fragments: impl IntoIterator<Item = Fragment>) -> usize {
        let mut inner = self.lock();
        let mut added = 0;
        for fragment in fragments {
            if !inner.content.contains_key(&fragment.name) {
                inner.content.insert(fragment.name.clone(), fragment);
                added += 1;
            }
        }
        drop(inner);
        if added > 0 {
            self.bump();
        }
        added
    }

    /// Put fragments for a writer.
    ///
    /// Re-putting an identical fragment is harmless. If any name already
    /// holds a different fragment nothing is put and the write fails with
    /// [`NetError::WriteConflict`].
    pub fn put(&self, fragments: Vec<Fragment>) -> Result<usize> {
        let mut inner = self.lock();
        if let Some(clash) = fragments
            .iter()
            .find(|f| inner.content.get(&f.name).is_some_and(|existing| existing != *f))
        {
            return Err(NetError::WriteConflict(clash.name.clone()));
        }
        let mut added = 0;
        for fragment in fragments {
            if !inner.content.contains_key(&fragment.name) {
                inner.content.insert(fragment.name.clone(), fragment);
                added += 1;
            }
        }
        drop(inner);
        if added > 0 {
            self.bump();
        }
        Ok(added)
    }

    /// Signal that an attached store has new content.
    pub fn announce(&self) {
        self.bump();
    }

    /// Record that a writer serves `prefix`.
    pub fn register_prefix(&self, prefix: &ContentName) {
        self.lock().prefixes.insert(prefix.clone());
    }

    /// Prefixes registered so far.
    pub fn registered_prefixes(&self) -> Vec<ContentName> {
        self.lock().prefixes.iter().cloned().collect()
    }

    /// Number of interests still pending.
    pub fn pending_interests(&self) -> usize {
        self.lock().pending.len()
    }

    /// The interest currently pending under `id`.
    pub fn pending_interest(&self, id: InterestId) -> Option<Interest> {
        self.lock().pending.get(&id).map(|p| p.interest.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    /// The best fragment for `interest` across direct puts and attached stores.
    async fn find(&self, interest: &Interest) -> Result<Option<Fragment>> {
        let (mut candidates, stores) = {
            let inner = self.lock();
            let direct: Vec<Fragment> = inner
                .content
                .range(interest.name.clone()..)
                .take_while(|(name, _)| interest.name.is_prefix_of(name))
                .map(|(_, f)| f.clone())
                .collect();
            let local = interest.select(&direct).cloned();
            (local.into_iter().collect::<Vec<_>>(), inner.stores.clone())
        };

        for store in stores {
            if let Some(fragment) = store.find_match(interest).await? {
                candidates.push(fragment);
            }
        }

        Ok(interest.select(&candidates).cloned())
    }

    /// Deliver results for one pending interest until it is retired.
    async fn deliver(self: Arc<Self>, id: InterestId) {
        let mut changes = self.generation.subscribe();
        let mut stalled = false;
        loop {
            if stalled {
                // An unchanged interest would match the same content again.
                if changes.changed().await.is_err() {
                    return;
                }
                stalled = false;
            }
            changes.borrow_and_update();

            let (interest, listener) = match self.lock().pending.get(&id) {
                Some(p) => (p.interest.clone(), p.listener.clone()),
                None => return,
            };

            let found = match self.find(&interest).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "interest lookup failed");
                    None
                }
            };
            let Some(fragment) = found else {
                stalled = true;
                continue;
            };

            tracing::debug!(%id, name = %fragment.name, "delivering content");
            let next = listener.handle_content(id, vec![fragment], &interest).await;

            let mut inner = self.lock();
            let Some(pending) = inner.pending.get_mut(&id) else {
                return;
            };
            match next {
                Some(next) => {
                    stalled = next == interest;
                    pending.interest = next;
                }
                None => {
                    inner.pending.remove(&id);
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl QueryDispatcher for MemoryNetwork {
    async fn get(&self, interest: &Interest, timeout: Duration) -> Result<Option<Fragment>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut changes = self.generation.subscribe();
            if let Some(fragment) = self.find(interest).await? {
                return Ok(Some(fragment));
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                _ => return Ok(None),
            }
        }
    }

    fn express_interest(
        &self,
        interest: Interest,
        listener: Arc<dyn ContentListener>,
    ) -> Result<InterestId> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NetError::NoRuntime(e.to_string()))?;
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| NetError::NoRuntime("network is shutting down".into()))?;

        let id = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = InterestId(inner.next_id);
            inner.pending.insert(id, PendingInterest { interest, listener });
            id
        };

        runtime.spawn(this.deliver(id));
        Ok(id)
    }

    fn cancel_interest(&self, id: InterestId) -> bool {
        let removed = self.lock().pending.remove(&id).is_some();
        if removed {
            // Wake the delivery task so it notices and exits.
            self.bump();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SegmentReader;
    use crate::segmenter::Segmenter;
    use crate::keys::MemoryKeyManager;
    use crate::write_path::StreamWrite;
    use netobject_core::{profile, FragmentBuilder, Keypair, VersionTag};
    use tokio::sync::mpsc;

    struct Recorder {
        tx: mpsc::UnboundedSender<(InterestId, ContentName)>,
        retire: bool,
    }

    #[async_trait]
    impl ContentListener for Recorder {
        async fn handle_content(
            &self,
            id: InterestId,
            results: Vec<Fragment>,
            interest: &Interest,
        ) -> Option<Interest> {
            let mut next = interest.clone();
            for fragment in results {
                if let Some(c) = fragment.name.component(interest.name.len()) {
                    next.exclude.add(c.clone());
                }
                let _ = self.tx.send((id, fragment.name));
            }
            if self.retire {
                None
            } else {
                Some(next)
            }
        }
    }

    fn version(base: &ContentName, ticks: u64, keys: &Arc<MemoryKeyManager>) -> Vec<Fragment> {
        let versioned = profile::add_version(base, VersionTag::from_ticks(ticks));
        Segmenter::new(keys.clone(), NetConfig::default().with_segment_size(4))
            .segment(&StreamWrite::new(versioned, format!("version {ticks}").into_bytes()))
            .unwrap()
            .fragments
    }

    #[tokio::test]
    async fn test_get_times_out_without_content() {
        let network = MemoryNetwork::new(NetConfig::default());
        let interest = Interest::new(ContentName::parse("/nothing").unwrap());
        let found = network.get(&interest, Duration::from_millis(50)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_get_wakes_on_publish() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::generate());
        let base = ContentName::parse("/doc").unwrap();
        let fragments = version(&base, 1, &keys);

        let publisher = network.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish(fragments);
        });

        let interest = profile::first_fragment_query_for_next_version(&base, None);
        let found = network.get(&interest, Duration::from_secs(2)).await.unwrap();
        assert!(profile::is_versioned_first_segment(&found.unwrap().name));
    }

    #[tokio::test]
    async fn test_pending_interest_redelivers_with_exclusions() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::generate());
        let base = ContentName::parse("/doc").unwrap();
        network.publish(version(&base, 1, &keys));
        network.publish(version(&base, 2, &keys));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let interest = profile::first_fragment_query_for_next_version(&base, None);
        let id = network
            .express_interest(interest, Arc::new(Recorder { tx, retire: false }))
            .unwrap();

        let (first_id, first) = rx.recv().await.unwrap();
        let (_, second) = rx.recv().await.unwrap();
        assert_eq!(first_id, id);
        assert_eq!(profile::version_of(&first), Some(VersionTag::from_ticks(1)));
        assert_eq!(profile::version_of(&second), Some(VersionTag::from_ticks(2)));

        assert!(network.cancel_interest(id));
        assert!(!network.cancel_interest(id));
        assert_eq!(network.pending_interests(), 0);
    }

    #[tokio::test]
    async fn test_retired_interest_is_removed() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::generate());
        let base = ContentName::parse("/doc").unwrap();
        network.publish(version(&base, 1, &keys));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let interest = profile::first_fragment_query_for_next_version(&base, None);
        network
            .express_interest(interest, Arc::new(Recorder { tx, retire: true }))
            .unwrap();
        rx.recv().await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(network.pending_interests(), 0);
    }

    #[tokio::test]
    async fn test_reader_reassembles_latest_version() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::new(Keypair::from_seed(&[5; 32])));
        let base = ContentName::parse("/doc").unwrap();
        network.publish(version(&base, 1, &keys));
        network.publish(version(&base, 2, &keys));

        let reader = SegmentReader::new(network.clone(), keys.clone(), NetConfig::default());
        let first = reader
            .open_versioned(&base, None, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(profile::version_of(&first.name), Some(VersionTag::from_ticks(2)));
        let payload = reader.read_all(&first).await.unwrap();
        assert_eq!(&payload[..], b"version 2");
    }

    #[tokio::test]
    async fn test_reader_skips_non_version_children() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::new(Keypair::from_seed(&[6; 32])));
        let base = ContentName::parse("/doc").unwrap();
        network.publish(version(&base, 3, &keys));
        let long = FragmentBuilder::new(ContentName::parse("/doc/zzzzzzzzzzzzzzzz/x").unwrap())
            .content(b"not a version".to_vec())
            .sign(&Keypair::from_seed(&[6; 32]));
        network.publish([long]);

        let reader = SegmentReader::new(network.clone(), keys.clone(), NetConfig::default());
        let first = reader
            .open_versioned(&base, None, Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(profile::version_of(&first.name), Some(VersionTag::from_ticks(3)));
    }

    #[tokio::test]
    async fn test_find_version_times_out_on_non_versions_only() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::generate());
        let base = ContentName::parse("/doc").unwrap();
        for child in ["/doc/meta/x", "/doc/notes/y"] {
            let fragment = FragmentBuilder::new(ContentName::parse(child).unwrap())
                .content(b"-".to_vec())
                .sign(&Keypair::from_seed(&[8; 32]));
            network.publish([fragment]);
        }

        let reader = SegmentReader::new(network.clone(), keys, NetConfig::default());
        let interest = profile::first_fragment_query_for_next_version(&base, None);
        let found = reader
            .find_version(interest, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_put_rejects_different_content_under_existing_name() {
        let network = MemoryNetwork::new(NetConfig::default());
        let base = ContentName::parse("/doc").unwrap();
        let theirs = version(&base, 7, &Arc::new(MemoryKeyManager::new(Keypair::from_seed(&[1; 32]))));
        let mine = version(&base, 7, &Arc::new(MemoryKeyManager::new(Keypair::from_seed(&[2; 32]))));

        assert_eq!(network.put(theirs.clone()).unwrap(), theirs.len());
        assert_eq!(network.put(theirs.clone()).unwrap(), 0);
        assert!(matches!(network.put(mine.clone()), Err(NetError::WriteConflict(_))));

        let stored = network.lock().content.get(&mine[0].name).cloned().unwrap();
        assert_eq!(stored, theirs[0]);
    }

    #[tokio::test]
    async fn test_reader_missing_segment() {
        let network = MemoryNetwork::new(NetConfig::default());
        let keys = Arc::new(MemoryKeyManager::generate());
        let base = ContentName::parse("/doc").unwrap();
        let fragments = version(&base, 1, &keys);
        network.publish(fragments.into_iter().take(1));

        let config = NetConfig::default().with_segment_timeout(Duration::from_millis(30));
        let reader = SegmentReader::new(network.clone(), keys.clone(), config);
        let first = reader
            .open_versioned(&base, None, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(matches!(
            reader.read_all(&first).await,
            Err(NetError::NoMatchingContent(_))
        ));
    }
}
