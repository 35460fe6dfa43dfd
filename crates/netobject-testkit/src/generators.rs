//! Proptest generators for property-based testing.

use proptest::prelude::*;

use netobject_core::{ContentName, Keypair, NameComponent, PublisherDigest, VersionTag};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random publisher digest.
pub fn publisher() -> impl Strategy<Value = PublisherDigest> {
    keypair().prop_map(|kp| kp.publisher())
}

/// Generate a plain (non-marker) name component.
pub fn component() -> impl Strategy<Value = NameComponent> {
    "[a-z][a-z0-9-]{0,11}".prop_map(|s| NameComponent::from(s.as_str()))
}

/// Generate an arbitrary-bytes name component.
pub fn binary_component() -> impl Strategy<Value = NameComponent> {
    prop::collection::vec(any::<u8>(), 1..16).prop_map(NameComponent::from)
}

/// Generate an unversioned base name of one to four components.
pub fn base_name() -> impl Strategy<Value = ContentName> {
    prop::collection::vec(component(), 1..=4).prop_map(ContentName::from_components)
}

/// Generate a version tag.
pub fn version() -> impl Strategy<Value = VersionTag> {
    any::<u64>().prop_map(VersionTag::from_ticks)
}

/// Generate a strictly increasing sequence of versions.
pub fn increasing_versions(max_len: usize) -> impl Strategy<Value = Vec<VersionTag>> {
    prop::collection::btree_set(1u64..u64::MAX / 2, 1..=max_len.max(1))
        .prop_map(|ticks| ticks.into_iter().map(VersionTag::from_ticks).collect())
}

/// Generate a delivery order: versions, possibly repeated and shuffled.
pub fn delivery_order(max_len: usize) -> impl Strategy<Value = Vec<VersionTag>> {
    increasing_versions(max_len)
        .prop_flat_map(|versions| {
            let n = versions.len();
            (Just(versions), prop::collection::vec(0..n, n..=n * 2))
        })
        .prop_map(|(versions, picks)| picks.into_iter().map(|i| versions[i]).collect())
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netobject_core::profile;

    proptest! {
        #[test]
        fn prop_base_names_are_unversioned(base in base_name()) {
            prop_assert!(!profile::has_terminal_version(&base));
        }

        #[test]
        fn prop_increasing_versions_increase(versions in increasing_versions(10)) {
            prop_assert!(versions.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn prop_delivery_order_draws_from_versions(order in delivery_order(6)) {
            prop_assert!(!order.is_empty());
        }
    }
}
