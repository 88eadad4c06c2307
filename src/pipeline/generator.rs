//! The generation orchestrator.
//!
//! [`Generator::generate`] runs one request through the pipeline:
//!
//! ```text
//! admit -> credential -> normalize -> cache lookup
//!   hit:  usage(cache) ---------------------------------------+
//!   miss: provider (timeout + retry) -> parse -> shape        |
//!         -> cache put -> usage(priced) ----------------------+-> inject link
//! ```
//!
//! Rejections before the cache lookup have no side effects. Once a request
//! reaches the cache, exactly one usage record is written for it. Cache and
//! usage failures are absorbed; only provider failures surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::inject::inject_link;
use super::parse::parse_reply;
use super::prompt::build_messages;
use crate::cache::ResponseCache;
use crate::fingerprint::CacheKey;
use crate::providers::ChatProvider;
use crate::providers::openai::API_KEY_ENV;
use crate::ratelimit::{FixedWindowLimiter, RatePolicy};
use crate::telemetry;
use crate::types::{ChatOptions, GenerationOutput, GenerationRequest};
use crate::usage::{MemoryUsageLog, Pricing, UsageRecord, UsageRecorder, UsageSink, estimate_tokens};
use crate::{RepurposeError, Result};

/// Route name stamped on usage records.
pub const DEFAULT_ROUTE: &str = "/api/generate";

/// Default model id.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Result of a successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Drafts as cached, placeholders intact.
    pub output: GenerationOutput,
    /// Drafts with the caller's link substituted; what the caller receives.
    pub body: Value,
    pub cache_key: CacheKey,
    pub served_from_cache: bool,
    pub degraded_parse: bool,
}

/// Orchestrates admission, caching, the provider call and accounting.
pub struct Generator {
    provider: Option<Arc<dyn ChatProvider>>,
    cache: ResponseCache,
    usage: UsageRecorder,
    limiter: Arc<FixedWindowLimiter>,
    rate_policy: RatePolicy,
    model: String,
    temperature: f32,
    pricing: Pricing,
    route: String,
}

impl Generator {
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    /// Run one generation on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// - [`RepurposeError::Throttled`] when the caller is over its rate
    /// - [`RepurposeError::MissingCredential`] when no provider is configured
    /// - [`RepurposeError::InvalidInput`] when the body is empty after normalization
    /// - an upstream error (see [`RepurposeError::is_upstream`]) when the
    ///   provider call fails after retries
    pub async fn generate(&self, caller: &str, request: &GenerationRequest) -> Result<Generation> {
        if !self.limiter.check(caller, self.rate_policy) {
            metrics::counter!(telemetry::THROTTLED_TOTAL).increment(1);
            debug!(caller, "request throttled");
            return Err(RepurposeError::Throttled {
                caller: caller.to_owned(),
            });
        }

        let Some(provider) = &self.provider else {
            return Err(RepurposeError::MissingCredential(API_KEY_ENV));
        };

        let request = request.normalize()?;
        let key = CacheKey::for_request(&request, &self.model);
        let input_chars = request.text.chars().count();

        if let Some(output) = self.cache.get(&key).await {
            self.usage
                .record(UsageRecord::cache_hit(&self.route, &key, &self.model, input_chars))
                .await;
            metrics::counter!(telemetry::GENERATIONS_TOTAL, "source" => "cache", "status" => "ok")
                .increment(1);
            return self.finish(output, key, request.link.as_deref(), true, false);
        }

        let messages = build_messages(&request);
        let options = ChatOptions::default()
            .model(self.model.clone())
            .temperature(self.temperature)
            .json();

        let started = Instant::now();
        let result = provider.chat(&messages, &options).await;
        let latency = started.elapsed();
        metrics::histogram!(telemetry::PROVIDER_DURATION_SECONDS, "provider" => provider.name().to_owned())
            .record(latency.as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(cache_key = %key, latency_ms = latency.as_millis() as u64, error = %e, "model request failed");
                self.usage
                    .record(UsageRecord::failure(
                        &self.route,
                        &key,
                        &self.model,
                        input_chars,
                        e.to_string(),
                        latency,
                    ))
                    .await;
                metrics::counter!(telemetry::GENERATIONS_TOTAL, "source" => "provider", "status" => "error")
                    .increment(1);
                return Err(e);
            }
        };

        let parsed = parse_reply(&response.content);
        if parsed.degraded {
            metrics::counter!(telemetry::DEGRADED_PARSES_TOTAL).increment(1);
            warn!(cache_key = %key, content_len = response.content.len(), "model reply was not clean JSON");
        }
        let output = GenerationOutput::shape(&parsed.value, &request.platforms);

        self.cache.put(&key, &output).await;

        let (prompt_tokens, completion_tokens) = token_counts(response.usage.as_ref(), input_chars);
        let record = UsageRecord::success(
            &self.route,
            &key,
            &self.model,
            input_chars,
            prompt_tokens,
            completion_tokens,
            &self.pricing,
            latency,
            response.request_id.clone(),
        )
        .degraded(parsed.degraded);
        let cost_usd = record.cost_usd;
        self.usage.record(record).await;

        metrics::counter!(telemetry::GENERATIONS_TOTAL, "source" => "provider", "status" => "ok")
            .increment(1);
        info!(
            cache_key = %key,
            latency_ms = latency.as_millis() as u64,
            prompt_tokens,
            completion_tokens,
            cost_usd,
            drafts = output.len(),
            "generation complete"
        );

        self.finish(output, key, request.link.as_deref(), false, parsed.degraded)
    }

    fn finish(
        &self,
        output: GenerationOutput,
        cache_key: CacheKey,
        link: Option<&str>,
        served_from_cache: bool,
        degraded_parse: bool,
    ) -> Result<Generation> {
        let body = inject_link(serde_json::to_value(&output)?, link);
        Ok(Generation {
            output,
            body,
            cache_key,
            served_from_cache,
            degraded_parse,
        })
    }
}

/// Actual token counts when the provider reported them, else an estimate
/// from the normalized body length with zero completion tokens.
fn token_counts(usage: Option<&crate::types::Usage>, input_chars: usize) -> (u32, u32) {
    let prompt = usage
        .map(|u| u.prompt_tokens)
        .filter(|&t| t > 0)
        .unwrap_or_else(|| estimate_tokens(input_chars));
    let completion = usage.map(|u| u.completion_tokens).unwrap_or(0);
    (prompt, completion)
}

/// Builder for [`Generator`].
///
/// Everything has a default except the provider: without one, every
/// generation fails with [`RepurposeError::MissingCredential`].
pub struct GeneratorBuilder {
    provider: Option<Arc<dyn ChatProvider>>,
    cache: Option<ResponseCache>,
    usage_sink: Option<Arc<dyn UsageSink>>,
    limiter: Option<Arc<FixedWindowLimiter>>,
    rate_policy: RatePolicy,
    model: String,
    temperature: f32,
    pricing: Pricing,
    route: String,
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self {
            provider: None,
            cache: None,
            usage_sink: None,
            limiter: None,
            rate_policy: RatePolicy::default(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            pricing: Pricing::default(),
            route: DEFAULT_ROUTE.to_string(),
        }
    }
}

impl GeneratorBuilder {
    pub fn provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Response cache. Default: in-memory.
    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Usage sink. Default: an in-memory log.
    pub fn usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage_sink = Some(sink);
        self
    }

    /// Share a limiter (e.g. with a pruning task). Default: a private one.
    pub fn limiter(mut self, limiter: Arc<FixedWindowLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn rate_policy(mut self, policy: RatePolicy) -> Self {
        self.rate_policy = policy;
        self
    }

    pub fn rate_limit(self, max_requests: u32, window: Duration) -> Self {
        self.rate_policy(RatePolicy {
            max_requests,
            window,
        })
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    pub fn build(self) -> Generator {
        let sink = self
            .usage_sink
            .unwrap_or_else(|| Arc::new(MemoryUsageLog::new()));
        Generator {
            provider: self.provider,
            cache: self.cache.unwrap_or_else(ResponseCache::in_memory),
            usage: UsageRecorder::new(sink),
            limiter: self.limiter.unwrap_or_default(),
            rate_policy: self.rate_policy,
            model: self.model,
            temperature: self.temperature,
            pricing: self.pricing,
            route: self.route,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Usage;

    #[test]
    fn token_counts_prefer_reported_usage() {
        let usage = Usage::new(900, 300);
        assert_eq!(token_counts(Some(&usage), 8000), (900, 300));
    }

    #[test]
    fn token_counts_estimate_when_missing_or_zero() {
        assert_eq!(token_counts(None, 4000), (1000, 0));
        let zero = Usage::default();
        assert_eq!(token_counts(Some(&zero), 4000), (1000, 0));
    }
}
