//! Network layer configuration.

use std::time::Duration;

/// Default maximum bytes of content per fragment.
pub const DEFAULT_SEGMENT_SIZE: usize = 4096;

/// Configuration shared by the dispatcher, write paths, and segment reader.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Maximum content bytes per fragment.
    pub segment_size: usize,
    /// Freshness stamped on published fragments.
    pub fragment_freshness: Option<u32>,
    /// Whether fetched fragments are verified before use.
    pub verify_fragments: bool,
    /// How long the reader waits for each continuation segment.
    pub segment_timeout: Duration,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            fragment_freshness: None,
            verify_fragments: true,
            segment_timeout: Duration::from_secs(4),
        }
    }
}

impl NetConfig {
    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size.max(1);
        self
    }

    pub fn with_fragment_freshness(mut self, seconds: Option<u32>) -> Self {
        self.fragment_freshness = seconds;
        self
    }

    pub fn with_verify_fragments(mut self, verify: bool) -> Self {
        self.verify_fragments = verify;
        self
    }

    pub fn with_segment_timeout(mut self, timeout: Duration) -> Self {
        self.segment_timeout = timeout;
        self
    }
}
