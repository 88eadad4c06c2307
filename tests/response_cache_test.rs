//! Tests for [`ResponseCache`], the failure-absorbing cache front.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use repurpose::cache::{CacheBackend, MemoryCache, ResponseCache};
use repurpose::{
    CacheKey, GenerationOutput, GenerationRequest, InstagramPost, RepurposeError, Result,
};

fn caption(text: &str) -> GenerationOutput {
    GenerationOutput {
        instagram: vec![InstagramPost {
            caption: text.into(),
        }],
        ..Default::default()
    }
}

fn key_for(text: &str) -> CacheKey {
    let request = GenerationRequest::new(text).normalize().unwrap();
    CacheKey::for_request(&request, "gpt-4o-mini")
}

/// Backend that can be switched into a failing state.
#[derive(Default)]
struct FlakyBackend {
    inner: MemoryCache,
    down: AtomicBool,
}

impl FlakyBackend {
    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepurposeError::Storage("database is locked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<GenerationOutput>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &CacheKey, output: &GenerationOutput) -> Result<()> {
        self.check()?;
        self.inner.put(key, output).await
    }
}

#[tokio::test]
async fn in_memory_round_trip() {
    let cache = ResponseCache::in_memory();
    let key = key_for("article");

    assert!(cache.get(&key).await.is_none());
    cache.put(&key, &caption("hello")).await;
    assert_eq!(cache.get(&key).await, Some(caption("hello")));
}

#[tokio::test]
async fn clones_share_entries() {
    let cache = ResponseCache::in_memory();
    let other = cache.clone();
    let key = key_for("article");

    cache.put(&key, &caption("shared")).await;
    assert_eq!(other.get(&key).await, Some(caption("shared")));
}

#[tokio::test]
async fn whitespace_variants_share_an_entry() {
    let cache = ResponseCache::in_memory();
    cache.put(&key_for("one  two\nthree"), &caption("c")).await;
    assert_eq!(cache.get(&key_for(" one two three ")).await, Some(caption("c")));
}

#[tokio::test]
async fn read_failure_is_a_miss() {
    let backend = Arc::new(FlakyBackend::default());
    let cache = ResponseCache::new(backend.clone());
    let key = key_for("article");
    cache.put(&key, &caption("stored")).await;

    backend.down.store(true, Ordering::SeqCst);
    assert!(cache.get(&key).await.is_none());

    backend.down.store(false, Ordering::SeqCst);
    assert_eq!(cache.get(&key).await, Some(caption("stored")));
}

#[tokio::test]
async fn write_failure_is_swallowed() {
    let backend = Arc::new(FlakyBackend::default());
    backend.down.store(true, Ordering::SeqCst);
    let cache = ResponseCache::new(backend.clone());
    let key = key_for("article");

    cache.put(&key, &caption("lost")).await;

    backend.down.store(false, Ordering::SeqCst);
    assert!(cache.get(&key).await.is_none());
}
