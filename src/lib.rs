//! Repurpose - turn newsletter articles into social media drafts
//!
//! The crate takes an article (title + body), asks a chat-completion model
//! for platform-specific drafts (X threads, a LinkedIn post, an Instagram
//! caption), and wraps that call in the plumbing a public endpoint needs:
//! per-caller rate limiting, a content-fingerprint cache, timeout and retry
//! around the provider, tolerant parsing of the reply, usage/cost
//! accounting and link substitution.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use repurpose::{GenerationRequest, Generator, OpenAiClient, RetryConfig, RetryingProvider};
//!
//! #[tokio::main]
//! async fn main() -> repurpose::Result<()> {
//!     let client = OpenAiClient::new("sk-your-key");
//!     let provider = RetryingProvider::new(Arc::new(client), RetryConfig::default());
//!     let generator = Generator::builder().provider(Arc::new(provider)).build();
//!
//!     let request = GenerationRequest::new("Long article text...")
//!         .title("Why small teams ship faster")
//!         .platforms(["x", "linkedin"])
//!         .link("https://example.substack.com/p/small-teams");
//!
//!     let generation = generator.generate("203.0.113.7", &request).await?;
//!     println!("{}", generation.body);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `sqlite` (default): [`storage::SqliteStore`], a persistent cache and usage log
//! - `extract`: [`extract::Extractor`], readable text from an article URL
//! - `server` (default, implies `extract`): the axum HTTP service and the
//!   `repurposed` daemon

pub mod cache;
pub mod error;
#[cfg(feature = "extract")]
pub mod extract;
pub mod fingerprint;
pub mod pipeline;
pub mod providers;
pub mod ratelimit;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "sqlite")]
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod usage;
mod version;

// Re-export main types at crate root
pub use cache::{CacheBackend, MemoryCache, ResponseCache};
pub use error::{FailureKind, RepurposeError, Result};
pub use fingerprint::{CacheKey, PROMPT_VERSION};
pub use pipeline::{Generation, Generator, GeneratorBuilder, inject_link, parse_reply};
pub use providers::{ChatProvider, OpenAiClient, RetryConfig, RetryingProvider};
pub use ratelimit::{FixedWindowLimiter, RatePolicy};
pub use types::{
    ChatOptions, ChatResponse, GenerationOutput, GenerationRequest, InstagramPost, LinkedInPost,
    Message, NormalizedRequest, Platform, Role, Usage, XStyle, XThread,
};
pub use usage::{MemoryUsageLog, Pricing, UsageRecord, UsageRecorder, UsageSink, compute_cost, estimate_tokens};
pub use version::{PKG_VERSION, version_string};
