//! ContentStore trait: the abstract interface for durable fragment storage.
//!
//! A durable store keeps signed fragments by name and answers interests
//! against them. It also remembers which namespaces it has been asked to
//! serve. Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use netobject_core::{Blake3Hash, ContentName, Fragment, Interest};

use crate::error::Result;

/// Result of saving a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Fragment was stored.
    Inserted,
    /// The identical fragment was already stored (idempotent - not an error).
    AlreadyExists,
    /// A different fragment is already stored under the same name.
    Conflict {
        /// Digest of the encoding already stored.
        existing: Blake3Hash,
    },
}

/// The ContentStore trait: async interface for fragment persistence.
///
/// # Design Notes
///
/// - **Immutability**: a name maps to at most one fragment. Saving the same
///   fragment twice returns `AlreadyExists`; a different fragment under an
///   existing name returns `Conflict` and leaves the stored one in place.
/// - **Matching**: `find_match` applies the interest's prefix, suffix,
///   publisher and exclusion rules, then its child selector.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Fragment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Save a fragment.
    async fn save_fragment(&self, fragment: &Fragment) -> Result<SaveOutcome>;

    /// Get a fragment by its exact name.
    async fn get_fragment(&self, name: &ContentName) -> Result<Option<Fragment>>;

    /// Check if a fragment exists under a name.
    async fn has_fragment(&self, name: &ContentName) -> Result<bool>;

    /// All fragments whose names start with `prefix`, in name order.
    async fn fragments_under(&self, prefix: &ContentName) -> Result<Vec<Fragment>>;

    /// The fragment `interest` would retrieve, if any.
    async fn find_match(&self, interest: &Interest) -> Result<Option<Fragment>> {
        let candidates = self.fragments_under(&interest.name).await?;
        Ok(interest.select(&candidates).cloned())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Namespace Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Start serving a namespace. Idempotent.
    async fn add_namespace(&self, prefix: &ContentName) -> Result<()>;

    /// All namespaces served, in name order.
    async fn namespaces(&self) -> Result<Vec<ContentName>>;

    /// Whether `name` falls under a served namespace.
    async fn serves(&self, name: &ContentName) -> Result<bool> {
        Ok(self
            .namespaces()
            .await?
            .iter()
            .any(|prefix| prefix.is_prefix_of(name)))
    }
}
