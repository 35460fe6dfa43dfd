//! Versioned objects: a mutable value over immutable, versioned content.
//!
//! A [`VersionedObject`] holds one value of type `T` under a base name.
//! Reads move it forward to later versions published by anyone; saves
//! publish a new version of it. All state lives behind one lock that is
//! never held across a network call: fetches and writes happen unlocked and
//! the lock is re-taken only to commit.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use netobject_core::{
    profile, ContentName, ContentType, Fragment, FragmentBuilder, Interest, KeyLocator,
    PublisherDigest, VersionTag,
};
use netobject_net::{
    ContentListener, InterestId, NetError, NetworkHandle, SaveMode, StreamWrite, WritePath,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Notify;

use crate::background::{handle_batch, BackgroundQueryState, BatchOutcome, ConfirmedVersion};
use crate::config::{Identity, InitialContent, ObjectConfig, WriteMode};
use crate::error::{ObjectError, Result};
use crate::state::{Adoption, ObjectState, SavedVersion};

/// Values a [`VersionedObject`] can hold.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A value of type `T` kept in step with the versions published under its name.
pub struct VersionedObject<T: Payload> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    this: Weak<Shared<T>>,
    handle: NetworkHandle,
    identity: Identity,
    default_timeout: Duration,
    inner: Mutex<Inner<T>>,
    changed: Notify,
    /// Serializes saves.
    save_gate: tokio::sync::Mutex<()>,
}

struct Inner<T> {
    state: ObjectState<T>,
    background: BackgroundQueryState,
    save_mode: Option<SaveMode>,
    writer: Option<Arc<dyn WritePath>>,
}

/// Receives background query results on behalf of one arm.
struct UpdateListener<T> {
    object: Weak<Shared<T>>,
    generation: u64,
}

impl<T: Payload> VersionedObject<T> {
    /// Build an object from `config`.
    ///
    /// Reading configurations fetch their initial version before returning.
    /// If nothing is there yet, a one-shot background update is left armed.
    pub async fn open(handle: NetworkHandle, config: ObjectConfig<T>) -> Result<Self> {
        let ObjectConfig {
            name,
            identity,
            initial,
            write_mode,
            default_timeout,
        } = config;

        let save_mode = write_mode.save_mode();
        let writer = match write_mode {
            WriteMode::Explicit(path) => Some(path),
            _ => None,
        };

        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            handle,
            identity,
            default_timeout,
            inner: Mutex::new(Inner {
                state: ObjectState::new(name.clone()),
                background: BackgroundQueryState::new(),
                save_mode,
                writer,
            }),
            changed: Notify::new(),
            save_gate: tokio::sync::Mutex::new(()),
        });
        let object = Self { shared };

        match initial {
            InitialContent::Empty => {}
            InitialContent::Value(value) => object.set_payload(value),
            InitialContent::Read { publisher } => {
                let name = name.ok_or(ObjectError::MissingName)?;
                object.update_name(&name, publisher).await?;
            }
            InitialContent::Fragment(fragment) => {
                object.update_fragment(fragment).await?;
            }
        }
        Ok(object)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the earliest version after the current one, waiting up to `timeout`.
    ///
    /// Returns `false`, leaving the object unchanged, if nothing newer arrives.
    pub async fn update(&self, timeout: Duration) -> Result<bool> {
        self.shared.update(timeout).await
    }

    /// Load `name`: that version if versioned, else the latest available.
    pub async fn update_name(
        &self,
        name: &ContentName,
        publisher: Option<PublisherDigest>,
    ) -> Result<bool> {
        self.shared.update_name(name, publisher).await
    }

    /// Load the version `fragment` belongs to.
    pub async fn update_fragment(&self, fragment: Fragment) -> Result<bool> {
        self.shared.update_fragment(fragment).await
    }

    /// Watch for versions after `known` (the current version when `None`).
    ///
    /// Returns immediately. A one-shot update disarms after the first new
    /// version; a continuous one keeps following. Waiters are woken on
    /// every adopted version.
    pub fn update_in_background(&self, known: Option<ContentName>, continuous: bool) -> Result<()> {
        let known = match known {
            Some(known) => known,
            None => self.shared.lock().state.known_name()?,
        };
        self.shared.arm(known, continuous)
    }

    /// Withdraw any background update. Safe to call at any time, repeatedly.
    pub fn cancel_interest(&self) {
        self.shared.cancel_interest();
    }

    /// Whether a background update is armed.
    pub fn is_updating_in_background(&self) -> bool {
        self.shared.lock().background.is_armed()
    }

    /// Number of candidates rejected by the armed background update since
    /// its last confirmed version.
    pub fn excluded_count(&self) -> usize {
        self.shared.lock().background.exclusions.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saves
    // ─────────────────────────────────────────────────────────────────────────

    /// Save the current value as a new version if it is dirty.
    ///
    /// Returns `false` without side effects if there is nothing new to save.
    pub async fn save(&self) -> Result<bool> {
        self.shared.save(None, false, None).await
    }

    /// Save as `version`, optionally answering an interest already received.
    pub async fn save_version(
        &self,
        version: Option<VersionTag>,
        outstanding: Option<Interest>,
    ) -> Result<bool> {
        self.shared.save(version, false, outstanding).await
    }

    /// Replace the value and save it.
    pub async fn set_payload_and_save(&self, payload: T) -> Result<bool> {
        self.set_payload(payload);
        self.save().await
    }

    /// Publish a tombstone as the latest version.
    ///
    /// The base name must not carry a version.
    pub async fn save_as_gone(&self, outstanding: Option<Interest>) -> Result<bool> {
        {
            let inner = self.shared.lock();
            let base = inner.state.require_base()?;
            if profile::has_terminal_version(base) {
                return Err(ObjectError::VersionedTombstone(base.clone()));
            }
        }
        self.shared.save(None, true, outstanding).await
    }

    /// Choose the save mode and open the write path now rather than on first save.
    pub async fn setup_save(&self, mode: SaveMode) -> Result<()> {
        self.set_save_mode(mode)?;
        let writer = self.shared.write_path()?;
        let base = self.shared.lock().state.require_base()?.clone();
        writer.ensure_registered(&profile::base_name(&base)).await?;
        Ok(())
    }

    /// The save mode, if one has been chosen.
    pub fn save_mode(&self) -> Option<SaveMode> {
        self.shared.lock().save_mode
    }

    /// Choose the save mode. Fails once a write path with another mode exists.
    pub fn set_save_mode(&self, mode: SaveMode) -> Result<()> {
        let mut inner = self.shared.lock();
        if let Some(writer) = &inner.writer {
            let current = writer.save_mode();
            if current != mode {
                return Err(ObjectError::SaveModeLocked {
                    current,
                    requested: mode,
                });
            }
        }
        inner.save_mode = Some(mode);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Waiting
    // ─────────────────────────────────────────────────────────────────────────

    /// Wait until some version, or a local value, is available.
    pub async fn wait_for_data(&self) {
        self.shared
            .wait_until(|inner| inner.state.is_available())
            .await;
    }

    /// Like [`wait_for_data`](Self::wait_for_data), giving up after `timeout`.
    /// Returns whether data is available.
    pub async fn wait_for_data_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_data())
            .await
            .is_ok()
    }

    /// Wait until the object holds a version later than `version`.
    /// Returns whether it does.
    pub async fn wait_for_newer(&self, version: Option<VersionTag>, timeout: Duration) -> bool {
        let newer = self
            .shared
            .wait_until(|inner| inner.state.version() > version);
        tokio::time::timeout(timeout, newer).await.is_ok()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// The current value.
    pub fn payload(&self) -> Result<T> {
        self.shared.lock().state.payload().cloned()
    }

    /// Replace the value locally; it becomes dirty and is no longer gone.
    pub fn set_payload(&self, payload: T) {
        self.shared.lock().state.set_payload(payload);
        self.shared.changed.notify_waiters();
    }

    pub fn base_name(&self) -> Option<ContentName> {
        self.shared.lock().state.base_name().cloned()
    }

    pub fn version(&self) -> Option<VersionTag> {
        self.shared.lock().state.version()
    }

    /// The current versioned name, or `None` before any version exists.
    pub fn versioned_name(&self) -> Option<ContentName> {
        self.shared.lock().state.versioned_name().cloned()
    }

    pub fn publisher(&self) -> Option<PublisherDigest> {
        self.shared.lock().state.publisher()
    }

    pub fn key_locator(&self) -> Option<KeyLocator> {
        self.shared.lock().state.key_locator().cloned()
    }

    pub fn is_gone(&self) -> bool {
        self.shared.lock().state.is_gone()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.lock().state.is_dirty()
    }

    pub fn is_available(&self) -> bool {
        self.shared.lock().state.is_available()
    }
}

impl<T: Payload> fmt::Display for VersionedObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        let state = &inner.state;
        let base = state
            .base_name()
            .map_or_else(|| "<unnamed>".to_string(), |b| b.to_string());
        match state.versioned_name() {
            Some(name) if state.is_gone() => write!(f, "{name}: GONE"),
            Some(name) if state.is_dirty() => write!(f, "{name} (modified)"),
            Some(name) => write!(f, "{name}"),
            None if state.has_payload() => write!(f, "{base} (unsaved)"),
            None => write!(f, "{base} (unsaved, no data)"),
        }
    }
}

impl<T: Payload> Drop for VersionedObject<T> {
    fn drop(&mut self) {
        self.shared.cancel_interest();
    }
}

impl<T: Payload> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_until(&self, ready: impl Fn(&Inner<T>) -> bool) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if ready(&*self.lock()) {
                return;
            }
            notified.await;
        }
    }

    async fn update(&self, timeout: Duration) -> Result<bool> {
        let known = self.lock().state.known_name()?;
        let interest = profile::first_fragment_query_for_next_version(&known, None);
        let found = self
            .handle
            .reader()
            .find_version(interest.clone(), timeout)
            .await?;
        match found {
            Some(fragment) => {
                let target = confirmed_target(fragment, &interest);
                self.ingest_confirmed(target).await
            }
            None => {
                tracing::debug!(name = %known, "no newer version");
                Ok(false)
            }
        }
    }

    async fn update_name(
        &self,
        name: &ContentName,
        publisher: Option<PublisherDigest>,
    ) -> Result<bool> {
        tracing::info!(%name, "updating object");
        let reader = self.handle.reader();
        match reader.open_versioned(name, publisher, self.default_timeout).await {
            Ok(first) => self.ingest(first).await,
            Err(NetError::NoMatchingContent(_)) => {
                self.retry_in_background(name);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_fragment(&self, fragment: Fragment) -> Result<bool> {
        if profile::is_versioned_first_segment(&fragment.name) {
            return self.ingest(fragment).await;
        }
        let versioned = profile::versioned_prefix(&fragment.name)
            .ok_or_else(|| ObjectError::Unversioned(fragment.name.clone()))?;
        self.ingest_confirmed(ConfirmedVersion::Version {
            versioned,
            publisher: fragment.signed_info.publisher,
        })
        .await
    }

    /// Fetch the first segment of a confirmed version if needed, then ingest it.
    async fn ingest_confirmed(&self, target: ConfirmedVersion) -> Result<bool> {
        let first = match target {
            ConfirmedVersion::FirstSegment(fragment) => fragment,
            ConfirmedVersion::Version {
                versioned,
                publisher,
            } => {
                tracing::info!(name = %versioned, "querying first segment of version");
                let interest = profile::first_segment_interest(&versioned, Some(publisher));
                match self
                    .handle
                    .dispatcher
                    .get(&interest, self.default_timeout)
                    .await?
                {
                    Some(first) => first,
                    None => {
                        self.retry_in_background(&versioned);
                        return Ok(false);
                    }
                }
            }
        };
        self.ingest(first).await
    }

    /// Adopt the version `first` begins: a tombstone, or a decoded payload.
    async fn ingest(&self, first: Fragment) -> Result<bool> {
        let (base, version) = profile::split_version(&first.name)
            .ok_or_else(|| ObjectError::Unversioned(first.name.clone()))?;

        let bytes = match self.handle.reader().read_all(&first).await {
            Ok(bytes) => bytes,
            Err(NetError::NoMatchingContent(name)) => {
                tracing::info!(%name, "version incomplete, updating once in background");
                self.retry_in_background(&base);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let payload = if first.is_gone() {
            tracing::debug!(name = %first.name, "reading tombstone");
            None
        } else {
            Some(decode::<T>(&bytes)?)
        };

        let adopted = self.lock().state.adopt(Adoption {
            base,
            version,
            publisher: first.signed_info.publisher,
            key_locator: first.signed_info.key_locator.clone(),
            payload,
        });
        if adopted {
            tracing::info!(name = %first.name, gone = first.is_gone(), "adopted version");
            self.changed.notify_waiters();
        }
        Ok(adopted)
    }

    /// Arm a one-shot background update after a read that found too little,
    /// keeping a continuous arm continuous.
    fn retry_in_background(&self, fallback: &ContentName) {
        let (known, continuous) = {
            let inner = self.lock();
            let known = inner
                .state
                .known_name()
                .unwrap_or_else(|_| profile::base_name(fallback));
            (known, inner.background.continuous)
        };
        if let Err(e) = self.arm(known, continuous) {
            tracing::warn!(error = %e, "could not arm background update");
        }
    }

    fn arm(&self, known: ContentName, continuous: bool) -> Result<()> {
        tracing::info!(%known, continuous, "updating in background");
        let (generation, interest, withdrawn) = self.lock().background.arm(known, continuous);
        if let Some(id) = withdrawn {
            self.handle.dispatcher.cancel_interest(id);
        }

        let listener = Arc::new(UpdateListener {
            object: self.this.clone(),
            generation,
        });
        let id = match self.handle.dispatcher.express_interest(interest, listener) {
            Ok(id) => id,
            Err(e) => {
                self.lock().background.cancel();
                return Err(e.into());
            }
        };

        let registered = self.lock().background.registered(generation, id);
        if !registered {
            self.handle.dispatcher.cancel_interest(id);
        }
        Ok(())
    }

    fn cancel_interest(&self) {
        let withdrawn = self.lock().background.cancel();
        if let Some(id) = withdrawn {
            tracing::info!(%id, "cancelling background update");
            self.handle.dispatcher.cancel_interest(id);
        }
    }

    async fn handle_background(&self, generation: u64, results: Vec<Fragment>) -> Option<Interest> {
        let outcome = handle_batch(&mut self.lock().background, generation, &results);
        let target = match outcome {
            BatchOutcome::Stale => return None,
            BatchOutcome::Reissue(interest) => return Some(interest),
            BatchOutcome::Confirmed(target) => target,
        };

        let token = target.version().map(|v| v.to_component());
        match self.ingest_confirmed(target).await {
            Ok(_) => {}
            Err(e) if is_unreadable(&e) => {
                tracing::warn!(error = %e, "skipping unreadable version");
                let mut inner = self.lock();
                return match token {
                    Some(token) => inner.background.reject(generation, token),
                    None => inner.background.retry(generation),
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "background update failed, waiting for more content");
                return self.lock().background.retry(generation);
            }
        }

        let mut inner = self.lock();
        let known = inner.state.known_name().ok()?;
        inner.background.confirmed(generation, known)
    }

    /// Open the write path for the chosen save mode, once.
    fn write_path(&self) -> Result<Arc<dyn WritePath>> {
        let mode = {
            let inner = self.lock();
            if let Some(writer) = &inner.writer {
                return Ok(writer.clone());
            }
            inner.save_mode.ok_or(ObjectError::NoWritePath)?
        };
        let opened = self.handle.open_writer(mode)?;
        let mut inner = self.lock();
        Ok(inner.writer.get_or_insert(opened).clone())
    }

    async fn save(
        &self,
        version: Option<VersionTag>,
        gone: bool,
        outstanding: Option<Interest>,
    ) -> Result<bool> {
        let _gate = self.save_gate.lock().await;

        let (base, value, edits, current) = {
            let inner = self.lock();
            let state = &inner.state;
            let base = state.require_base()?.clone();
            if !gone && !state.is_dirty() {
                tracing::debug!(name = %base, "object not dirty, not saving");
                return Ok(false);
            }
            let value = if gone {
                None
            } else {
                Some(state.payload().cloned().map_err(|_| ObjectError::NothingToSave)?)
            };
            (base, value, state.edits(), state.version())
        };

        let writer = self.write_path()?;
        let base = profile::base_name(&base);
        writer.ensure_registered(&base).await?;

        let version = version.unwrap_or_else(|| VersionTag::next_after(current));
        let versioned = profile::add_version(&base, version);

        let ack = match value {
            Some(value) => {
                let write = StreamWrite {
                    name: versioned.clone(),
                    payload: encode(&value)?,
                    content_type: ContentType::Data,
                    publisher: self.identity.publisher,
                    key_locator: self.identity.key_locator.clone(),
                    outstanding,
                };
                writer.put_stream(write).await?
            }
            None => {
                let tombstone = self.tombstone(&versioned)?;
                writer.put_fragment(tombstone, outstanding).await?
            }
        };

        let committed = self.lock().state.commit_save(SavedVersion {
            version,
            publisher: ack.publisher,
            key_locator: ack.key_locator,
            gone,
            edits,
        });
        tracing::info!(name = %versioned, gone, committed, mode = %writer.save_mode(), "saved");
        self.changed.notify_waiters();
        Ok(true)
    }

    /// A signed, empty, terminal gone fragment for `versioned`.
    fn tombstone(&self, versioned: &ContentName) -> Result<Fragment> {
        let keys = &self.handle.keys;
        let publisher = self
            .identity
            .publisher
            .unwrap_or_else(|| keys.default_publisher());
        let keypair = keys
            .keypair(&publisher)
            .ok_or(NetError::UnknownPublisher(publisher))?;
        let key_locator = self
            .identity
            .key_locator
            .clone()
            .unwrap_or_else(|| KeyLocator::Key(keypair.public_key()));

        Ok(FragmentBuilder::new(profile::first_segment_name(versioned))
            .content_type(ContentType::Gone)
            .final_segment(profile::FIRST_SEGMENT)
            .key_locator(key_locator)
            .freshness_seconds(self.handle.config.fragment_freshness)
            .content(Bytes::new())
            .sign(&keypair))
    }
}

#[async_trait]
impl<T: Payload> ContentListener for UpdateListener<T> {
    async fn handle_content(
        &self,
        _id: InterestId,
        results: Vec<Fragment>,
        _interest: &Interest,
    ) -> Option<Interest> {
        let object = self.object.upgrade()?;
        object.handle_background(self.generation, results).await
    }
}

/// Classify a fragment fetched by a version query.
fn confirmed_target(fragment: Fragment, interest: &Interest) -> ConfirmedVersion {
    if profile::is_versioned_first_segment(&fragment.name) {
        return ConfirmedVersion::FirstSegment(fragment);
    }
    match profile::versioned_name_for(&fragment.name, interest) {
        Some(versioned) => ConfirmedVersion::Version {
            versioned,
            publisher: fragment.signed_info.publisher,
        },
        None => ConfirmedVersion::FirstSegment(fragment),
    }
}

/// Content that will never ingest, as opposed to content not fully arrived.
fn is_unreadable(error: &ObjectError) -> bool {
    matches!(
        error,
        ObjectError::Decode(_) | ObjectError::Unversioned(_) | ObjectError::Net(NetError::Validation(_))
    )
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| ObjectError::Encode(e.to_string()))?;
    Ok(Bytes::from(buf))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| ObjectError::Decode(e.to_string()))
}
