//! Response cache keyed by content fingerprint.
//!
//! Entries are created once, after a successful provider call, and never
//! updated or expired: bumping [`PROMPT_VERSION`](crate::fingerprint::PROMPT_VERSION)
//! is how stale drafts are retired.
//!
//! Storage sits behind [`CacheBackend`] so the in-memory cache and the
//! SQLite store are interchangeable. [`ResponseCache`] wraps a backend and
//! makes it safe to use on the request path: read failures become misses,
//! write failures are logged and dropped.

mod memory;

pub use memory::MemoryCache;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::Result;
use crate::fingerprint::CacheKey;
use crate::telemetry;
use crate::types::GenerationOutput;

/// Storage for cached generations.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn get(&self, key: &CacheKey) -> Result<Option<GenerationOutput>>;

    /// Store an entry. Writing a key that already exists is not an error:
    /// concurrent generations for one fingerprint race benignly and the
    /// first writer wins.
    async fn put(&self, key: &CacheKey, output: &GenerationOutput) -> Result<()>;
}

/// Failure-absorbing front for a [`CacheBackend`].
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// In-memory cache with default capacity.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Look up a cached generation. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &CacheKey) -> Option<GenerationOutput> {
        match self.backend.get(key).await {
            Ok(Some(output)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(%key, backend = self.backend.name(), "cache hit");
                Some(output)
            }
            Ok(None) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
            Err(e) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                warn!(%key, backend = self.backend.name(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Best-effort write.
    pub async fn put(&self, key: &CacheKey, output: &GenerationOutput) {
        if let Err(e) = self.backend.put(key, output).await {
            warn!(%key, backend = self.backend.name(), error = %e, "cache write failed");
        }
    }
}
