//! Telemetry metric name constants.
//!
//! Centralised metric names for the generation pipeline. The daemon (or an
//! embedding application) installs its own `metrics` recorder; without one,
//! every metric call is a no-op.
//!
//! All metrics are prefixed with `repurpose_`. Counters end in `_total`,
//! histograms carry their unit (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "openai")
//! - `status`: outcome, "ok" or "error"
//! - `direction`: token direction, "prompt" or "completion"
//! - `source`: where a generation came from, "cache" or "provider"

/// Generation requests that passed admission.
///
/// Labels: `source` ("cache" | "provider"), `status` ("ok" | "error").
pub const GENERATIONS_TOTAL: &str = "repurpose_generations_total";

/// Requests rejected by the rate limiter.
pub const THROTTLED_TOTAL: &str = "repurpose_throttled_total";

/// Provider call duration in seconds, retries included.
///
/// Labels: `provider`.
pub const PROVIDER_DURATION_SECONDS: &str = "repurpose_provider_duration_seconds";

/// Retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "repurpose_retries_total";

/// Tokens consumed, actual or estimated.
///
/// Labels: `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "repurpose_tokens_total";

/// Accumulated spend in micro-dollars (cost_usd * 1e6).
pub const COST_MICRO_USD_TOTAL: &str = "repurpose_cost_micro_usd_total";

/// Response cache hits.
pub const CACHE_HITS_TOTAL: &str = "repurpose_cache_hits_total";

/// Response cache misses (including backend read failures).
pub const CACHE_MISSES_TOTAL: &str = "repurpose_cache_misses_total";

/// Model replies that needed salvage or fell back to an empty object.
pub const DEGRADED_PARSES_TOTAL: &str = "repurpose_degraded_parses_total";
