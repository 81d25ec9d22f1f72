//! Configuration for the cache engine.
//!
//! # Example
//!
//! ```
//! use tiercache::CacheConfig;
//!
//! // Defaults: insertion order, 1000 primary entries, unbounded overflow
//! let config = CacheConfig::default();
//! assert_eq!(config.cache_size, Some(1000));
//!
//! // LRU with a bounded, time-limited overflow tier
//! let config = CacheConfig::default()
//!     .with_lru(true)
//!     .with_cache_size(Some(256))
//!     .with_soft_size(Some(4096))
//!     .with_reclaim_after_ms(Some(30_000));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Construction parameters for a [`CacheEngine`](crate::CacheEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Access order (LRU) when true, insertion order when false
    #[serde(default)]
    pub lru_enabled: bool,

    /// Primary tier capacity for unpinned entries (None = unbounded,
    /// which leaves the overflow tier unused)
    #[serde(default = "default_cache_size")]
    pub cache_size: Option<usize>,

    /// Overflow tier target size (None = no count bound, 0 = disabled)
    #[serde(default)]
    pub soft_size: Option<usize>,

    /// Overflow entries older than this are treated as reclaimed
    #[serde(default)]
    pub reclaim_after_ms: Option<u64>,

    /// Expected number of concurrent callers; advisory only
    #[serde(default)]
    pub concurrency_hint: Option<usize>,
}

fn default_cache_size() -> Option<usize> { Some(1000) }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lru_enabled: false,
            cache_size: default_cache_size(),
            soft_size: None,
            reclaim_after_ms: None,
            concurrency_hint: None,
        }
    }
}

impl CacheConfig {
    /// Select access order (true) or insertion order (false)
    pub fn with_lru(mut self, lru_enabled: bool) -> Self {
        self.lru_enabled = lru_enabled;
        self
    }

    /// Primary tier capacity (None = unbounded)
    pub fn with_cache_size(mut self, cache_size: Option<usize>) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Overflow tier bound (None = no bound, Some(0) = disabled)
    pub fn with_soft_size(mut self, soft_size: Option<usize>) -> Self {
        self.soft_size = soft_size;
        self
    }

    /// Overflow retention in milliseconds
    pub fn with_reclaim_after_ms(mut self, reclaim_after_ms: Option<u64>) -> Self {
        self.reclaim_after_ms = reclaim_after_ms;
        self
    }

    /// Advisory concurrency hint
    pub fn with_concurrency_hint(mut self, concurrency_hint: Option<usize>) -> Self {
        self.concurrency_hint = concurrency_hint;
        self
    }

    /// Overflow retention as a `Duration`
    pub fn reclaim_after(&self) -> Option<Duration> {
        self.reclaim_after_ms.map(Duration::from_millis)
    }

    /// Reject combinations the engine does not support
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_hint == Some(0) {
            return Err(Error::Unsupported(
                "concurrency_hint must be at least 1".to_string(),
            ));
        }
        if self.reclaim_after_ms == Some(0) {
            return Err(Error::Unsupported(
                "reclaim_after_ms of 0 reclaims on admission; use soft_size = 0 to disable the overflow tier".to_string(),
            ));
        }
        Ok(())
    }
}
