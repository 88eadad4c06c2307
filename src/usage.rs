//! Usage and cost accounting.
//!
//! Every admitted generation produces exactly one [`UsageRecord`]: a
//! zero-cost one for cache hits and provider failures, a priced one for
//! successful provider calls. Records are append-only and go to a
//! [`UsageSink`]. Sink failures are logged and swallowed so accounting can
//! never fail a request.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;
use crate::fingerprint::CacheKey;
use crate::telemetry;

/// Estimate tokens from a character count (about four chars per token,
/// rounded to nearest).
pub fn estimate_tokens(chars: usize) -> u32 {
    let tokens = (chars as u64 + 2) / 4;
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Cost in USD for the given token counts and per-1000-token prices,
/// rounded to 6 decimal places.
pub fn compute_cost(
    prompt_tokens: u32,
    completion_tokens: u32,
    input_per_1k: f64,
    output_per_1k: f64,
) -> f64 {
    let raw = (prompt_tokens as f64 / 1000.0) * input_per_1k
        + (completion_tokens as f64 / 1000.0) * output_per_1k;
    (raw * 1e6).round() / 1e6
}

/// Per-1000-token prices. Both default to zero, which records usage without cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub input_per_1k: f64,
    #[serde(default)]
    pub output_per_1k: f64,
}

impl Pricing {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        compute_cost(
            prompt_tokens,
            completion_tokens,
            self.input_per_1k,
            self.output_per_1k,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Ok,
    Error,
}

/// Free-form details attached to a usage record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<UsageStatus>,
    #[serde(default)]
    pub served_from_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u32>,
    /// Set when the model reply had to be salvaged or was unusable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded_parse: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One accounting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub route: String,
    pub cache_key: String,
    pub model: String,
    pub input_chars: usize,
    pub cost_usd: f64,
    pub meta: UsageMeta,
}

impl UsageRecord {
    fn base(route: &str, key: &CacheKey, model: &str, input_chars: usize) -> Self {
        Self {
            route: route.to_owned(),
            cache_key: key.to_string(),
            model: model.to_owned(),
            input_chars,
            cost_usd: 0.0,
            meta: UsageMeta::default(),
        }
    }

    /// A generation answered from the cache. Costs nothing.
    pub fn cache_hit(route: &str, key: &CacheKey, model: &str, input_chars: usize) -> Self {
        let mut record = Self::base(route, key, model, input_chars);
        record.meta.served_from_cache = true;
        record
    }

    /// A provider call that failed after retries. Costs nothing.
    pub fn failure(
        route: &str,
        key: &CacheKey,
        model: &str,
        input_chars: usize,
        message: impl Into<String>,
        latency: Duration,
    ) -> Self {
        let mut record = Self::base(route, key, model, input_chars);
        record.meta.status = Some(UsageStatus::Error);
        record.meta.message = Some(message.into());
        record.meta.latency_ms = Some(latency.as_millis() as u64);
        record
    }

    /// A successful provider call, priced from its token counts.
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        route: &str,
        key: &CacheKey,
        model: &str,
        input_chars: usize,
        prompt_tokens: u32,
        completion_tokens: u32,
        pricing: &Pricing,
        latency: Duration,
        request_id: Option<String>,
    ) -> Self {
        let mut record = Self::base(route, key, model, input_chars);
        record.cost_usd = pricing.cost(prompt_tokens, completion_tokens);
        record.meta.status = Some(UsageStatus::Ok);
        record.meta.latency_ms = Some(latency.as_millis() as u64);
        record.meta.request_id = request_id;
        record.meta.prompt_tokens = Some(prompt_tokens);
        record.meta.completion_tokens = Some(completion_tokens);
        record
    }

    pub fn degraded(mut self, degraded: bool) -> Self {
        self.meta.degraded_parse = degraded;
        self
    }
}

/// Append-only destination for usage records.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn append(&self, record: &UsageRecord) -> Result<()>;
}

/// In-process usage log. Useful without a database and in tests.
#[derive(Debug, Default)]
pub struct MemoryUsageLog {
    records: Mutex<Vec<UsageRecord>>,
}

impl MemoryUsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of recorded spend.
    pub fn total_cost(&self) -> f64 {
        self.records().iter().map(|r| r.cost_usd).sum()
    }
}

#[async_trait]
impl UsageSink for MemoryUsageLog {
    async fn append(&self, record: &UsageRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// Front for a [`UsageSink`] that never fails.
#[derive(Clone)]
pub struct UsageRecorder {
    sink: Arc<dyn UsageSink>,
}

impl UsageRecorder {
    pub fn new(sink: Arc<dyn UsageSink>) -> Self {
        Self { sink }
    }

    /// Append a record, logging (not returning) sink errors.
    pub async fn record(&self, record: UsageRecord) {
        if let Some(prompt) = record.meta.prompt_tokens {
            metrics::counter!(telemetry::TOKENS_TOTAL, "direction" => "prompt")
                .increment(u64::from(prompt));
        }
        if let Some(completion) = record.meta.completion_tokens {
            metrics::counter!(telemetry::TOKENS_TOTAL, "direction" => "completion")
                .increment(u64::from(completion));
        }
        if record.cost_usd > 0.0 {
            metrics::counter!(telemetry::COST_MICRO_USD_TOTAL)
                .increment((record.cost_usd * 1e6).round() as u64);
        }

        if let Err(e) = self.sink.append(&record).await {
            warn!(
                cache_key = %record.cache_key,
                route = %record.route,
                error = %e,
                "failed to record usage"
            );
        }
    }
}
