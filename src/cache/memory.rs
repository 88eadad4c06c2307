//! In-memory cache backend.

use async_trait::async_trait;
use moka::future::Cache;

use super::CacheBackend;
use crate::Result;
use crate::fingerprint::CacheKey;
use crate::types::GenerationOutput;

/// Default maximum number of cached generations.
const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Process-local cache backed by moka.
///
/// There is no TTL. The capacity bound only exists so a long-running
/// process cannot grow without limit; evicted entries are regenerated on
/// the next miss.
pub struct MemoryCache {
    cache: Cache<CacheKey, GenerationOutput>,
}

impl MemoryCache {
    /// Create a cache with the default capacity (10,000 entries).
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max).build(),
        }
    }

    /// Number of entries currently cached (eventually consistent).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<GenerationOutput>> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: &CacheKey, output: &GenerationOutput) -> Result<()> {
        // First writer wins, matching the insert-only semantics of the SQLite store.
        self.cache
            .entry(key.clone())
            .or_insert_with(async { output.clone() })
            .await;
        Ok(())
    }
}
