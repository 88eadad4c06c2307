//! Per-caller fixed-window admission control.
//!
//! Each caller key owns a bucket `{count, reset_at}` that is created lazily
//! on first use and reset once its window has elapsed. The read-check-
//! increment sequence runs under one mutex, so concurrent callers with the
//! same key can never both take the last slot.
//!
//! State lives in process memory: limits apply per instance, not across a
//! fleet. Buckets for callers that went quiet are dropped by
//! [`FixedWindowLimiter::prune_expired`], which the server runs on a timer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// How many requests a caller may make per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RatePolicy {
    /// 10 requests per 60 seconds.
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter keyed by caller identity.
#[derive(Debug, Default)]
pub struct FixedWindowLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request from `key`.
    pub fn allow(&self, key: &str, max_requests: u32, window: Duration) -> bool {
        self.allow_at(key, max_requests, window, Instant::now())
    }

    /// [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, key: &str, max_requests: u32, window: Duration, now: Instant) -> bool {
        let mut buckets = self.lock();
        match buckets.get_mut(key) {
            Some(bucket) if now < bucket.reset_at => {
                if bucket.count < max_requests {
                    bucket.count += 1;
                    true
                } else {
                    false
                }
            }
            _ => {
                buckets.insert(
                    key.to_owned(),
                    Bucket {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                max_requests > 0
            }
        }
    }

    /// Convenience wrapper taking a [`RatePolicy`].
    pub fn check(&self, key: &str, policy: RatePolicy) -> bool {
        self.allow(key, policy.max_requests, policy.window)
    }

    /// Drop buckets whose window has elapsed. Returns how many were removed.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let mut buckets = self.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now < bucket.reset_at);
        let removed = before - buckets.len();
        if removed > 0 {
            debug!(removed, remaining = buckets.len(), "pruned expired rate limit buckets");
        }
        removed
    }

    /// Number of tracked callers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a bucket half-written,
    // so a poisoned map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
