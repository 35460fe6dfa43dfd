//! End-to-end behavior of versioned objects over an in-process network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netobject::core::{profile, ContentName, Fragment, Interest, VersionTag};
use netobject::net::{
    KeyManager, NetError, QueryDispatcher, SaveMode, StreamWrite, WriteAck, WritePath,
};
use netobject::{Identity, ObjectConfig, ObjectError, VersionedObject, WriteMode};
use netobject_testkit::{name, TestNetwork};

const WAIT: Duration = Duration::from_secs(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn writer(
    net: &TestNetwork,
    base: &ContentName,
    value: Option<&str>,
) -> anyhow::Result<VersionedObject<String>> {
    let config = ObjectConfig::for_write(base.clone(), value.map(String::from));
    Ok(VersionedObject::open(net.participant(1), config).await?)
}

async fn reader(net: &TestNetwork, base: &ContentName) -> anyhow::Result<VersionedObject<String>> {
    Ok(VersionedObject::open(net.participant(2), ObjectConfig::read(base.clone())).await?)
}

fn cbor(value: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    ciborium::into_writer(&value, &mut buf).unwrap();
    buf
}

/// Put a fragment that is not part of any version under `uri`.
fn publish_child(net: &TestNetwork, uri: &str) {
    let keys = TestNetwork::keys(4);
    let fragment = netobject::core::FragmentBuilder::new(name(uri))
        .content(b"not a version".to_vec())
        .sign(&keys.keypair(&keys.default_publisher()).unwrap());
    net.network.publish([fragment]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Synchronous update
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_without_content_leaves_object_unchanged() -> anyhow::Result<()> {
    init_tracing();
    let net = TestNetwork::new();
    let object = writer(&net, &name("/n"), None).await?;

    assert!(!object.update(Duration::from_millis(1000)).await?);
    assert!(!object.is_available());
    assert_eq!(object.version(), None);
    assert_eq!(object.versioned_name(), None);
    assert!(matches!(object.payload(), Err(ObjectError::ContentNotReady)));
    Ok(())
}

#[tokio::test]
async fn update_fetches_next_version() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let object = writer(&net, &base, None).await?;

    net.publish_version(3, &base, VersionTag::from_ticks(10), &cbor("ten"));
    net.publish_version(3, &base, VersionTag::from_ticks(20), &cbor("twenty"));

    assert!(object.update(WAIT).await?);
    assert_eq!(object.version(), Some(VersionTag::from_ticks(10)));
    assert_eq!(object.payload()?, "ten");

    assert!(object.update(WAIT).await?);
    assert_eq!(object.version(), Some(VersionTag::from_ticks(20)));
    assert!(!object.update(Duration::from_millis(50)).await?);
    assert_eq!(object.publisher(), Some(TestNetwork::keys(3).default_publisher()));
    Ok(())
}

#[tokio::test]
async fn update_ignores_children_that_are_not_versions() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let object = writer(&net, &base, None).await?;
    publish_child(&net, "/n/meta/x");

    assert!(!object.update(Duration::from_millis(200)).await?);
    assert!(!object.is_available());

    let version = VersionTag::now();
    net.publish_version(3, &base, version, &cbor("real"));
    assert!(object.update(WAIT).await?);
    assert_eq!(object.version(), Some(version));
    assert_eq!(object.payload()?, "real");
    Ok(())
}

#[tokio::test]
async fn missing_name_is_a_contract_violation() {
    let net = TestNetwork::new();
    let object: VersionedObject<String> =
        VersionedObject::open(net.participant(1), ObjectConfig::default())
            .await
            .unwrap();

    assert!(matches!(
        object.update(Duration::from_millis(10)).await,
        Err(ObjectError::MissingName)
    ));
    object.set_payload("x".into());
    assert!(matches!(object.save().await, Err(ObjectError::MissingName)));
    assert!(matches!(
        object.update_in_background(None, false),
        Err(ObjectError::MissingName)
    ));
}

#[tokio::test]
async fn update_from_fragment_in_hand() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let object = writer(&net, &base, Some("held")).await?;
    object.save().await?;

    let versioned = object.versioned_name().unwrap();
    let first = net
        .network
        .get(&profile::first_segment_interest(&versioned, None), WAIT)
        .await?
        .unwrap();

    let loaded: VersionedObject<String> =
        VersionedObject::open(net.participant(2), ObjectConfig::from_first_fragment(first)).await?;
    assert_eq!(loaded.payload()?, "held");
    assert_eq!(loaded.base_name(), Some(base));
    assert_eq!(loaded.version(), object.version());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Save
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_fresh_object() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let object = writer(&net, &name("/n"), Some("hello")).await?;
    assert!(object.is_dirty());

    assert!(object.save().await?);
    assert!(!object.is_dirty());
    assert!(object.is_available());
    let version = object.version().unwrap();
    assert_eq!(
        object.versioned_name(),
        Some(profile::add_version(&name("/n"), version))
    );
    assert_eq!(object.save_mode(), Some(SaveMode::Raw));
    Ok(())
}

#[tokio::test]
async fn save_when_clean_is_a_no_op() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let object = writer(&net, &name("/n"), Some("hello")).await?;
    object.save().await?;

    let before = (
        object.version(),
        object.versioned_name(),
        object.publisher(),
        object.key_locator(),
        object.is_dirty(),
        object.is_gone(),
    );
    assert!(!object.save().await?);
    let after = (
        object.version(),
        object.versioned_name(),
        object.publisher(),
        object.key_locator(),
        object.is_dirty(),
        object.is_gone(),
    );
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn save_then_read_round_trips() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/parc/notes");
    let object = writer(&net, &base, Some("data")).await?;
    object.save().await?;

    let fresh = reader(&net, &base).await?;
    assert_eq!(fresh.payload()?, "data");
    assert_eq!(fresh.version(), object.version());
    assert_eq!(fresh.publisher(), object.publisher());
    assert!(!fresh.is_dirty());
    Ok(())
}

#[tokio::test]
async fn successive_saves_increase_version() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let object = writer(&net, &name("/n"), Some("one")).await?;
    object.save().await?;
    let first = object.version();

    assert!(object.set_payload_and_save("two".into()).await?);
    assert!(object.version() > first);
    assert_eq!(object.payload()?, "two");
    Ok(())
}

#[tokio::test]
async fn save_explicit_version_answering_interest() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let object = writer(&net, &base, Some("pinned")).await?;

    let outstanding = profile::first_fragment_query_for_next_version(&base, None);
    let version = VersionTag::from_ticks(77);
    assert!(object.save_version(Some(version), Some(outstanding)).await?);
    assert_eq!(object.version(), Some(version));

    let fresh = reader(&net, &base).await?;
    assert_eq!(fresh.version(), Some(version));
    Ok(())
}

#[tokio::test]
async fn save_over_existing_version_conflicts() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let version = VersionTag::from_ticks(77);
    net.publish_version(2, &base, version, &cbor("theirs"));

    let object = writer(&net, &base, Some("mine")).await?;
    assert!(matches!(
        object.save_version(Some(version), None).await,
        Err(ObjectError::Net(NetError::WriteConflict(_)))
    ));
    assert!(object.is_dirty());
    assert_eq!(object.version(), None);

    let fresh = reader(&net, &base).await?;
    assert_eq!(fresh.payload()?, "theirs");
    assert_eq!(fresh.version(), Some(version));
    Ok(())
}

#[tokio::test]
async fn save_after_gone_is_a_no_op() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let object = writer(&net, &name("/n"), Some("x")).await?;
    object.save().await?;
    object.save_as_gone(None).await?;

    // A gone object is not dirty: a plain save does nothing.
    assert!(!object.save().await?);
    Ok(())
}

#[tokio::test]
async fn save_as_gone_is_observed_by_readers() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let object = writer(&net, &base, Some("soon gone")).await?;
    object.save().await?;
    let data_version = object.version();

    assert!(object.save_as_gone(None).await?);
    assert!(object.is_gone());
    assert!(!object.is_dirty());
    assert!(object.version() > data_version);
    assert!(matches!(object.payload(), Err(ObjectError::ContentGone)));
    assert!(object.to_string().ends_with("GONE"));

    let fresh = reader(&net, &base).await?;
    assert!(fresh.is_available());
    assert!(fresh.is_gone());
    assert!(matches!(fresh.payload(), Err(ObjectError::ContentGone)));
    assert_eq!(fresh.version(), object.version());
    Ok(())
}

#[tokio::test]
async fn set_payload_revives_gone_object() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let object = writer(&net, &name("/n"), Some("a")).await?;
    object.save().await?;
    object.save_as_gone(None).await?;

    object.set_payload("b".into());
    assert!(!object.is_gone());
    assert!(object.save().await?);
    assert_eq!(object.payload()?, "b");
    Ok(())
}

#[tokio::test]
async fn save_as_gone_rejects_versioned_name() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let versioned = profile::add_version(&name("/n"), VersionTag::from_ticks(5));
    let object = writer(&net, &versioned, Some("x")).await?;

    assert!(matches!(
        object.save_as_gone(None).await,
        Err(ObjectError::VersionedTombstone(_))
    ));
    assert!(!object.is_gone());
    Ok(())
}

struct FailingWritePath;

#[async_trait]
impl WritePath for FailingWritePath {
    fn save_mode(&self) -> SaveMode {
        SaveMode::Raw
    }

    async fn ensure_registered(&self, _prefix: &ContentName) -> netobject::net::Result<()> {
        Ok(())
    }

    async fn put_stream(&self, write: StreamWrite) -> netobject::net::Result<WriteAck> {
        Err(NetError::WriteConflict(write.name))
    }

    async fn put_fragment(
        &self,
        fragment: Fragment,
        _outstanding: Option<Interest>,
    ) -> netobject::net::Result<WriteAck> {
        Err(NetError::WriteConflict(fragment.name))
    }
}

#[tokio::test]
async fn write_failure_leaves_object_dirty() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let config = ObjectConfig::for_write(name("/n"), Some("kept".to_string()))
        .with_write_mode(WriteMode::Explicit(Arc::new(FailingWritePath)));
    let object = VersionedObject::open(net.participant(1), config).await?;

    assert!(matches!(object.save().await, Err(ObjectError::Net(_))));
    assert!(object.is_dirty());
    assert_eq!(object.version(), None);
    assert!(matches!(object.save_as_gone(None).await, Err(ObjectError::Net(_))));
    assert!(!object.is_gone());
    assert_eq!(object.payload()?, "kept");
    Ok(())
}

#[tokio::test]
async fn save_mode_is_fixed_once_writing() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let config = ObjectConfig::for_write(name("/n"), Some("x".to_string()))
        .with_write_mode(WriteMode::Deferred);
    let object = VersionedObject::open(net.participant(1), config).await?;

    assert_eq!(object.save_mode(), None);
    assert!(matches!(object.save().await, Err(ObjectError::NoWritePath)));
    assert!(object.is_dirty());

    object.set_save_mode(SaveMode::Repository)?;
    object.set_save_mode(SaveMode::Raw)?;
    object.setup_save(SaveMode::Raw).await?;
    assert!(net.network.registered_prefixes().contains(&name("/n")));

    assert!(matches!(
        object.set_save_mode(SaveMode::Repository),
        Err(ObjectError::SaveModeLocked { .. })
    ));
    assert!(object.save().await?);
    Ok(())
}

#[tokio::test]
async fn signing_identity_is_adopted() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let keys = TestNetwork::keys(1);
    let other = keys.add_keypair(netobject::core::Keypair::from_seed(&[8; 32]));
    let handle = net.network.handle(keys, None);

    let config = ObjectConfig::for_write(name("/n"), Some("signed".to_string()))
        .with_identity(Identity::publisher(other));
    let object = VersionedObject::open(handle, config).await?;
    assert!(object.save().await?);
    assert_eq!(object.publisher(), Some(other));
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Background update
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn continuous_background_update_follows_versions() -> anyhow::Result<()> {
    init_tracing();
    let net = TestNetwork::new();
    let base = name("/n");
    let source = writer(&net, &base, None).await?;
    let follower = writer(&net, &base, None).await?;

    follower.update_in_background(None, true)?;
    assert!(follower.is_updating_in_background());

    let mut seen = None;
    for value in ["one", "two", "three"] {
        source.set_payload_and_save(value.to_string()).await?;
        assert!(follower.wait_for_newer(seen, WAIT).await, "missed {value}");
        seen = follower.version();
        assert!(follower.is_updating_in_background());
        assert_eq!(follower.excluded_count(), 0);
    }

    assert_eq!(follower.version(), source.version());
    assert_eq!(follower.payload()?, "three");
    follower.cancel_interest();
    Ok(())
}

#[tokio::test]
async fn continuous_update_skips_unreadable_version() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let follower = writer(&net, &base, None).await?;
    follower.update_in_background(None, true)?;

    net.publish_version(3, &base, VersionTag::from_ticks(10), &[0xff]);
    net.publish_version(3, &base, VersionTag::from_ticks(20), &cbor("readable"));

    let readable = Some(VersionTag::from_ticks(19));
    assert!(follower.wait_for_newer(readable, WAIT).await);
    assert_eq!(follower.payload()?, "readable");
    assert!(follower.is_updating_in_background());
    follower.cancel_interest();
    Ok(())
}

#[tokio::test]
async fn one_shot_background_update_disarms() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let source = writer(&net, &base, Some("first")).await?;
    let follower = writer(&net, &base, None).await?;

    follower.update_in_background(None, false)?;
    source.save().await?;
    follower.wait_for_data().await;
    assert_eq!(follower.payload()?, "first");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!follower.is_updating_in_background());
    assert_eq!(net.network.pending_interests(), 0);

    source.set_payload_and_save("second".into()).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(follower.payload()?, "first");
    Ok(())
}

#[tokio::test]
async fn background_update_skips_unrelated_content() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let follower = writer(&net, &base, None).await?;

    let unrelated = base.append("meta".into()).append("x".into());
    let keys = TestNetwork::keys(4);
    let fragment = netobject::core::FragmentBuilder::new(unrelated)
        .content(b"not a version".to_vec())
        .sign(&keys.keypair(&keys.default_publisher()).unwrap());
    net.network.publish([fragment]);

    follower.update_in_background(None, false)?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(follower.is_updating_in_background());
    assert_eq!(follower.excluded_count(), 1);
    assert!(!follower.is_available());

    net.publish_version(4, &base, VersionTag::from_ticks(9), &cbor("real"));
    assert!(follower.wait_for_data_timeout(WAIT).await);
    assert_eq!(follower.payload()?, "real");
    assert_eq!(follower.excluded_count(), 0);
    Ok(())
}

#[tokio::test]
async fn background_update_fetches_first_segment_of_partial_version() -> anyhow::Result<()> {
    let net = TestNetwork::with_config(netobject::net::NetConfig::default().with_segment_size(3));
    let base = name("/n");
    let follower = writer(&net, &base, None).await?;
    follower.update_in_background(None, false)?;

    let fragments = net.version_fragments(5, &base, VersionTag::from_ticks(42), &cbor("segmented value"));
    assert!(fragments.len() > 2);
    net.network.publish(fragments[1..].to_vec());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!follower.is_available());
    net.network.publish(fragments[..1].to_vec());

    assert!(follower.wait_for_data_timeout(WAIT).await);
    assert_eq!(follower.payload()?, "segmented value");
    assert_eq!(follower.version(), Some(VersionTag::from_ticks(42)));
    Ok(())
}

#[tokio::test]
async fn background_versions_never_regress() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    let follower = writer(&net, &base, None).await?;
    follower.update_in_background(None, true)?;

    let mut seen = Vec::new();
    for ticks in [50u64, 30, 70, 60, 90] {
        net.publish_version(6, &base, VersionTag::from_ticks(ticks), &cbor(&ticks.to_string()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        seen.push(follower.version());
    }

    assert!(follower.wait_for_newer(Some(VersionTag::from_ticks(89)), WAIT).await);
    seen.push(follower.version());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(follower.version(), Some(VersionTag::from_ticks(90)));
    Ok(())
}

#[tokio::test]
async fn cancel_is_idempotent() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let follower = writer(&net, &name("/n"), None).await?;

    follower.cancel_interest();
    follower.update_in_background(None, true)?;
    assert_eq!(net.network.pending_interests(), 1);

    follower.cancel_interest();
    assert!(!follower.is_updating_in_background());
    assert_eq!(net.network.pending_interests(), 0);
    follower.cancel_interest();
    assert!(!follower.is_updating_in_background());
    assert_eq!(follower.excluded_count(), 0);
    Ok(())
}

#[tokio::test]
async fn rearming_replaces_previous_query() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let follower = writer(&net, &name("/n"), None).await?;

    follower.update_in_background(None, false)?;
    follower.update_in_background(None, true)?;
    assert_eq!(net.network.pending_interests(), 1);
    Ok(())
}

#[tokio::test]
async fn dropping_object_withdraws_query() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let follower = writer(&net, &name("/n"), None).await?;
    follower.update_in_background(None, true)?;
    assert_eq!(net.network.pending_interests(), 1);

    drop(follower);
    assert_eq!(net.network.pending_interests(), 0);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Read construction and waiting
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn read_before_publish_waits_for_data() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/later");
    let config = ObjectConfig::<String>::read(base.clone()).with_timeout(Duration::from_millis(50));
    let fresh = VersionedObject::open(net.participant(2), config).await?;

    assert!(!fresh.is_available());
    assert!(fresh.is_updating_in_background());
    assert!(!fresh.wait_for_data_timeout(Duration::from_millis(50)).await);

    let source = writer(&net, &base, Some("arrived")).await?;
    source.save().await?;
    assert!(fresh.wait_for_data_timeout(WAIT).await);
    assert_eq!(fresh.payload()?, "arrived");
    Ok(())
}

#[tokio::test]
async fn read_from_publisher_ignores_others() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    writer(&net, &base, Some("from one")).await?.save().await?;

    let wanted = TestNetwork::keys(9).default_publisher();
    let config = ObjectConfig::<String>::read_from_publisher(base.clone(), wanted)
        .with_timeout(Duration::from_millis(50));
    let fresh = VersionedObject::open(net.participant(2), config).await?;
    assert!(!fresh.is_available());
    Ok(())
}

#[tokio::test]
async fn read_skips_children_that_are_not_versions() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    net.publish_version(1, &base, VersionTag::from_ticks(5), &cbor("real"));
    publish_child(&net, "/n/zzzzzzzzzzzzzzzz/x");

    let fresh = reader(&net, &base).await?;
    assert_eq!(fresh.payload()?, "real");
    assert_eq!(fresh.version(), Some(VersionTag::from_ticks(5)));
    Ok(())
}

#[tokio::test]
async fn read_specific_version() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let base = name("/n");
    net.publish_version(1, &base, VersionTag::from_ticks(1), &cbor("old"));
    net.publish_version(1, &base, VersionTag::from_ticks(2), &cbor("new"));

    let versioned = profile::add_version(&base, VersionTag::from_ticks(1));
    let old: VersionedObject<String> =
        VersionedObject::open(net.participant(2), ObjectConfig::read(versioned)).await?;
    assert_eq!(old.payload()?, "old");

    let latest = reader(&net, &base).await?;
    assert_eq!(latest.payload()?, "new");
    Ok(())
}

#[tokio::test]
async fn display_forms() -> anyhow::Result<()> {
    let net = TestNetwork::new();
    let empty = writer(&net, &name("/n"), None).await?;
    assert_eq!(empty.to_string(), "/n (unsaved, no data)");

    let object = writer(&net, &name("/n"), Some("x")).await?;
    assert_eq!(object.to_string(), "/n (unsaved)");
    object.save().await?;
    assert_eq!(object.to_string(), object.versioned_name().unwrap().to_string());
    Ok(())
}
