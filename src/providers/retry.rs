//! Timeout and retry helpers, and the retrying provider decorator.
//!
//! [`with_timeout`] bounds a single attempt; [`with_retry`] re-runs an
//! operation while its error classifies as transient.
//! [`RetryingProvider`] combines the latter with any [`ChatProvider`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use super::traits::ChatProvider;
use crate::telemetry;
use crate::types::{ChatOptions, ChatResponse, Message};
use crate::{RepurposeError, Result};

/// Run `fut` with a deadline.
///
/// On expiry the in-flight future is dropped, which cancels the underlying
/// request, and [`RepurposeError::Timeout`] is returned. The timer belongs
/// to the returned future, so it is released on every exit path.
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(RepurposeError::Timeout(duration)),
    }
}

/// Backoff policy for provider calls.
///
/// ```rust
/// # use repurpose::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(2)
///     .base_delay(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 = no retry. Default: 1.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 400ms.
    pub base_delay: Duration,
    /// Cap on any single delay. Default: 10s.
    pub max_delay: Duration,
    /// Scale each delay by a random factor in [0.8, 1.2]. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retry.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Backoff before retry number `attempt + 1` (0-indexed), without jitter:
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Backoff including jitter, still capped at `max_delay`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(0.8..=1.2);
        delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `f` until it succeeds, fails permanently, or the budget runs out.
///
/// Transient errors (see [`RepurposeError::is_transient`]) are retried up
/// to `config.max_retries` times with exponential backoff. Anything else is
/// returned immediately. When the budget runs out the last error is
/// returned.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    provider_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "provider" => provider_name.to_owned(),
                    "operation" => operation.to_owned(),
                )
                .increment(1);
                let delay = config.jittered_delay(attempt);
                warn!(
                    provider = provider_name,
                    operation,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "provider call failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A [`ChatProvider`] that re-issues transient failures of the wrapped one.
pub struct RetryingProvider {
    inner: Arc<dyn ChatProvider>,
    config: RetryConfig,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn ChatProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ChatProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        with_retry(&self.config, self.inner.name(), "chat", || {
            self.inner.chat(messages, options)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::new()
            .base_delay(Duration::from_millis(400))
            .max_delay(Duration::from_secs(1))
            .jitter(false);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_in_band() {
        let config = RetryConfig::new();
        for _ in 0..100 {
            let d = config.jittered_delay(0);
            assert!(d >= Duration::from_millis(320), "{d:?}");
            assert!(d <= Duration::from_millis(480), "{d:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires() {
        let result: Result<()> = with_timeout(Duration::from_secs(45), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RepurposeError::Timeout(d)) if d == Duration::from_secs(45)));
    }

    #[tokio::test]
    async fn timeout_passes_through_result() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
