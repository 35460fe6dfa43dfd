//! Reading whole versions back from their fragments.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use netobject_core::{
    profile, validate_fragment_with_key, ContentName, Fragment, Interest, KeyLocator,
    PublisherDigest, ValidationError,
};

use crate::config::NetConfig;
use crate::dispatcher::QueryDispatcher;
use crate::error::{NetError, Result};
use crate::keys::KeyManager;

/// Fetches continuation segments and reassembles a version's payload.
#[derive(Clone)]
pub struct SegmentReader {
    dispatcher: Arc<dyn QueryDispatcher>,
    keys: Arc<dyn KeyManager>,
    config: NetConfig,
}

impl SegmentReader {
    pub fn new(
        dispatcher: Arc<dyn QueryDispatcher>,
        keys: Arc<dyn KeyManager>,
        config: NetConfig,
    ) -> Self {
        Self {
            dispatcher,
            keys,
            config,
        }
    }

    /// Resolve a name to the first fragment of a version.
    ///
    /// A versioned name resolves to that version's first segment. An
    /// unversioned name resolves to the latest version available.
    pub async fn open_versioned(
        &self,
        name: &ContentName,
        publisher: Option<PublisherDigest>,
        timeout: Duration,
    ) -> Result<Fragment> {
        match profile::versioned_prefix(name) {
            Some(versioned) => {
                let interest = profile::first_segment_interest(&versioned, publisher);
                self.fetch_required(&interest, timeout).await
            }
            None => {
                let interest = profile::latest_version_interest(name, publisher);
                self.find_version(interest.clone(), timeout)
                    .await?
                    .ok_or_else(|| NetError::NoMatchingContent(interest.name.clone()))
            }
        }
    }

    /// Issue a version query, excluding answers that are not versions.
    ///
    /// Each answer whose component after the query prefix is not a version
    /// is excluded and the query re-issued, until a version answers or
    /// `timeout` elapses. Returns `None` on timeout.
    pub async fn find_version(
        &self,
        mut interest: Interest,
        timeout: Duration,
    ) -> Result<Option<Fragment>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let Some(fragment) = self.dispatcher.get(&interest, remaining).await? else {
                return Ok(None);
            };
            if profile::versioned_name_for(&fragment.name, &interest).is_some() {
                return Ok(Some(fragment));
            }
            let Some(token) = fragment.name.component(interest.name.len()).cloned() else {
                return Ok(None);
            };
            tracing::debug!(name = %fragment.name, "excluding non-version answer");
            if !interest.exclude.add(token) {
                return Ok(None);
            }
        }
    }

    /// Read the full payload of the version `first` begins.
    ///
    /// A gone fragment reads as an empty payload.
    pub async fn read_all(&self, first: &Fragment) -> Result<Bytes> {
        self.verify(first)?;
        if first.segment_number() != Some(profile::FIRST_SEGMENT) {
            return Err(ValidationError::StructuralError(format!(
                "{} is not a first segment",
                first.name
            ))
            .into());
        }
        if first.is_gone() {
            return Ok(Bytes::new());
        }

        let final_segment = first.signed_info.final_segment.unwrap_or(profile::FIRST_SEGMENT);
        if final_segment == profile::FIRST_SEGMENT {
            return Ok(first.content.clone());
        }

        let versioned = profile::versioned_prefix(&first.name).ok_or_else(|| {
            ValidationError::StructuralError(format!("{} carries no version", first.name))
        })?;

        let mut payload = BytesMut::from(&first.content[..]);
        for segment in 1..=final_segment {
            let interest = Interest::exact(profile::segment_name(&versioned, segment))
                .with_publisher(Some(first.signed_info.publisher));
            let fragment = self
                .fetch_required(&interest, self.config.segment_timeout)
                .await?;
            self.verify(&fragment)?;
            payload.extend_from_slice(&fragment.content);
        }

        tracing::debug!(name = %versioned, segments = final_segment + 1, "read version");
        Ok(payload.freeze())
    }

    async fn fetch_required(&self, interest: &Interest, timeout: Duration) -> Result<Fragment> {
        self.dispatcher
            .get(interest, timeout)
            .await?
            .ok_or_else(|| NetError::NoMatchingContent(interest.name.clone()))
    }

    fn verify(&self, fragment: &Fragment) -> Result<()> {
        if !self.config.verify_fragments {
            return Ok(());
        }
        let key = match &fragment.signed_info.key_locator {
            KeyLocator::Key(key) => *key,
            KeyLocator::KeyName { .. } => self
                .keys
                .public_key(&fragment.signed_info.publisher)
                .ok_or(NetError::UnknownPublisher(fragment.signed_info.publisher))?,
        };
        validate_fragment_with_key(fragment, &key)?;
        Ok(())
    }
}
