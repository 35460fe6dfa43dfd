//! Splitting payloads into signed fragments.

use std::sync::Arc;

use netobject_core::{profile, Fragment, FragmentBuilder, KeyLocator, PublisherDigest};

use crate::config::NetConfig;
use crate::error::{NetError, Result};
use crate::keys::KeyManager;
use crate::write_path::StreamWrite;

/// A payload cut into fragments and signed.
#[derive(Debug, Clone)]
pub struct SignedStream {
    pub fragments: Vec<Fragment>,
    pub publisher: PublisherDigest,
    pub key_locator: KeyLocator,
}

/// Cuts payloads into `segment_size` fragments under `versioned/segN`.
///
/// Every fragment carries the final segment number. An empty payload is a
/// single empty terminal fragment.
#[derive(Clone)]
pub struct Segmenter {
    keys: Arc<dyn KeyManager>,
    config: NetConfig,
}

impl Segmenter {
    pub fn new(keys: Arc<dyn KeyManager>, config: NetConfig) -> Self {
        Self { keys, config }
    }

    /// Segment and sign a write.
    pub fn segment(&self, write: &StreamWrite) -> Result<SignedStream> {
        let publisher = write
            .publisher
            .unwrap_or_else(|| self.keys.default_publisher());
        let keypair = self
            .keys
            .keypair(&publisher)
            .ok_or(NetError::UnknownPublisher(publisher))?;
        let key_locator = write
            .key_locator
            .clone()
            .unwrap_or_else(|| KeyLocator::Key(keypair.public_key()));

        let size = self.config.segment_size.max(1);
        let chunks: Vec<&[u8]> = if write.payload.is_empty() {
            vec![&write.payload[..0]]
        } else {
            write.payload.chunks(size).collect()
        };
        let final_segment = (chunks.len() - 1) as u64;

        let fragments = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                FragmentBuilder::new(profile::segment_name(&write.name, i as u64))
                    .content_type(write.content_type)
                    .final_segment(final_segment)
                    .key_locator(key_locator.clone())
                    .freshness_seconds(self.config.fragment_freshness)
                    .content(write.payload.slice_ref(chunk))
                    .sign(&keypair)
            })
            .collect();

        Ok(SignedStream {
            fragments,
            publisher,
            key_locator,
        })
    }
}
