//! Fixed-size Bloom filter used to compress large exclusion lists.

use std::fmt;

use crate::name::NameComponent;

/// Filter size in bits.
pub const BLOOM_BITS: usize = 1024;

/// Number of bit positions set per inserted component.
pub const BLOOM_HASHES: usize = 3;

/// A Bloom filter over name components.
///
/// Membership tests can return false positives, never false negatives.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: [u8; BLOOM_BITS / 8],
    count: usize,
}

impl BloomFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self {
            bits: [0u8; BLOOM_BITS / 8],
            count: 0,
        }
    }

    /// Insert a component.
    pub fn insert(&mut self, component: &NameComponent) {
        for bit in positions(component) {
            self.bits[bit / 8] |= 1 << (bit % 8);
        }
        self.count += 1;
    }

    /// Whether the component may have been inserted.
    pub fn contains(&self, component: &NameComponent) -> bool {
        positions(component)
            .iter()
            .all(|&bit| self.bits[bit / 8] & (1 << (bit % 8)) != 0)
    }

    /// Number of insertions so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BloomFilter({} entries)", self.count)
    }
}

fn positions(component: &NameComponent) -> [usize; BLOOM_HASHES] {
    let digest = blake3::hash(component.as_bytes());
    let bytes = digest.as_bytes();
    let mut out = [0usize; BLOOM_HASHES];
    for (i, slot) in out.iter_mut().enumerate() {
        let word = u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);
        *slot = word as usize % BLOOM_BITS;
    }
    out
}
