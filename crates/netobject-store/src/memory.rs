//! In-memory implementation of the ContentStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use netobject_core::{encode_fragment, Blake3Hash, ContentName, Fragment};

use crate::error::Result;
use crate::traits::{ContentStore, SaveOutcome};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryContentStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Fragments indexed by name. Extensions of a name sort contiguously after it.
    fragments: BTreeMap<ContentName, StoredFragment>,

    /// Served namespaces.
    namespaces: BTreeSet<ContentName>,
}

struct StoredFragment {
    fragment: Fragment,
    digest: Blake3Hash,
}

impl MemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of stored fragments.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fragments
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn save_fragment(&self, fragment: &Fragment) -> Result<SaveOutcome> {
        let digest = Blake3Hash::hash(&encode_fragment(fragment));
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = inner.fragments.get(&fragment.name) {
            return Ok(if existing.digest == digest {
                SaveOutcome::AlreadyExists
            } else {
                SaveOutcome::Conflict {
                    existing: existing.digest,
                }
            });
        }

        inner.fragments.insert(
            fragment.name.clone(),
            StoredFragment {
                fragment: fragment.clone(),
                digest,
            },
        );
        Ok(SaveOutcome::Inserted)
    }

    async fn get_fragment(&self, name: &ContentName) -> Result<Option<Fragment>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.fragments.get(name).map(|s| s.fragment.clone()))
    }

    async fn has_fragment(&self, name: &ContentName) -> Result<bool> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.fragments.contains_key(name))
    }

    async fn fragments_under(&self, prefix: &ContentName) -> Result<Vec<Fragment>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .fragments
            .range(prefix.clone()..)
            .take_while(|(name, _)| prefix.is_prefix_of(name))
            .map(|(_, s)| s.fragment.clone())
            .collect())
    }

    async fn add_namespace(&self, prefix: &ContentName) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.namespaces.insert(prefix.clone());
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<ContentName>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.namespaces.iter().cloned().collect())
    }
}
