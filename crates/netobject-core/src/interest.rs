//! Interests: queries for content under a name prefix.
//!
//! An interest matches any fragment whose name extends the interest name,
//! subject to suffix-length bounds, a publisher filter, and an exclusion
//! filter applied to the component immediately after the prefix. When
//! several fragments match, the child selector picks one.

use std::collections::BTreeSet;

use crate::bloom::BloomFilter;
use crate::crypto::PublisherDigest;
use crate::fragment::Fragment;
use crate::name::{ContentName, NameComponent};

/// Explicit exclusions kept before spilling into a Bloom filter.
pub const OPTIMUM_FILTER_SIZE: usize = 100;

/// Which matching child the responder should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildSelector {
    /// The smallest next component in canonical order.
    #[default]
    Leftmost,
    /// The largest next component in canonical order.
    Rightmost,
}

/// Exclusion filter over the component following an interest's prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclude {
    through: Option<NameComponent>,
    components: BTreeSet<NameComponent>,
    bloom: Option<BloomFilter>,
}

impl Exclude {
    /// An empty filter that excludes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude every component up to and including `bound`.
    pub fn through(bound: NameComponent) -> Self {
        Self {
            through: Some(bound),
            ..Self::default()
        }
    }

    /// The inclusive lower range bound, if any.
    pub fn through_bound(&self) -> Option<&NameComponent> {
        self.through.as_ref()
    }

    /// Whether `component` is excluded.
    pub fn excludes(&self, component: &NameComponent) -> bool {
        if self.through.as_ref().is_some_and(|bound| component <= bound) {
            return true;
        }
        if self.components.contains(component) {
            return true;
        }
        self.bloom.as_ref().is_some_and(|b| b.contains(component))
    }

    /// Exclude one more component.
    ///
    /// Returns false if the component was already excluded, in which case the
    /// filter is unchanged.
    pub fn add(&mut self, component: NameComponent) -> bool {
        if self.excludes(&component) {
            return false;
        }
        self.components.insert(component);
        if self.components.len() > OPTIMUM_FILTER_SIZE {
            let bloom = self.bloom.get_or_insert_with(BloomFilter::new);
            for c in std::mem::take(&mut self.components) {
                bloom.insert(&c);
            }
        }
        true
    }

    /// Explicitly listed components not yet folded into the Bloom filter.
    pub fn explicit(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Number of components added individually (explicit plus spilled).
    pub fn len(&self) -> usize {
        self.components.len() + self.bloom.as_ref().map_or(0, BloomFilter::len)
    }

    /// Whether nothing at all is excluded.
    pub fn is_empty(&self) -> bool {
        self.through.is_none() && self.len() == 0
    }

    /// Whether some components have been folded into the Bloom filter.
    pub fn has_bloom(&self) -> bool {
        self.bloom.is_some()
    }
}

/// A query for content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: ContentName,
    pub exclude: Exclude,
    pub publisher: Option<PublisherDigest>,
    pub child_selector: ChildSelector,
    pub min_suffix_components: Option<usize>,
    pub max_suffix_components: Option<usize>,
}

impl Interest {
    /// An interest for anything under `name`.
    pub fn new(name: ContentName) -> Self {
        Self {
            name,
            exclude: Exclude::new(),
            publisher: None,
            child_selector: ChildSelector::Leftmost,
            min_suffix_components: None,
            max_suffix_components: None,
        }
    }

    /// An interest matching exactly one name.
    pub fn exact(name: ContentName) -> Self {
        Self::new(name).with_suffix_components(Some(0), Some(0))
    }

    pub fn with_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_publisher(mut self, publisher: Option<PublisherDigest>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_child_selector(mut self, selector: ChildSelector) -> Self {
        self.child_selector = selector;
        self
    }

    pub fn with_suffix_components(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_suffix_components = min;
        self.max_suffix_components = max;
        self
    }

    /// Whether a fragment name (published by `publisher`) satisfies this interest.
    pub fn matches_name(&self, name: &ContentName, publisher: &PublisherDigest) -> bool {
        if !self.name.is_prefix_of(name) {
            return false;
        }
        if self.publisher.as_ref().is_some_and(|p| p != publisher) {
            return false;
        }
        let suffix = name.len() - self.name.len();
        if self.min_suffix_components.is_some_and(|min| suffix < min) {
            return false;
        }
        if self.max_suffix_components.is_some_and(|max| suffix > max) {
            return false;
        }
        match name.component(self.name.len()) {
            Some(next) => !self.exclude.excludes(next),
            None => true,
        }
    }

    /// Whether a fragment satisfies this interest.
    pub fn matches(&self, fragment: &Fragment) -> bool {
        self.matches_name(&fragment.name, &fragment.signed_info.publisher)
    }

    /// Pick the fragment this interest would retrieve from `candidates`.
    pub fn select<'a, I>(&self, candidates: I) -> Option<&'a Fragment>
    where
        I: IntoIterator<Item = &'a Fragment>,
    {
        let matching = candidates.into_iter().filter(|f| self.matches(f));
        match self.child_selector {
            ChildSelector::Leftmost => matching.min_by(|a, b| a.name.cmp(&b.name)),
            ChildSelector::Rightmost => {
                let depth = self.name.len();
                matching.min_by(|a, b| {
                    b.name
                        .component(depth)
                        .cmp(&a.name.component(depth))
                        .then_with(|| a.name.cmp(&b.name))
                })
            }
        }
    }
}
