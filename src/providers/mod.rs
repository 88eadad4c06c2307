//! Model provider implementations.
//!
//! - [`OpenAiClient`]: chat completions over HTTP
//! - [`RetryingProvider`]: retry decorator for any [`ChatProvider`]

pub mod openai;
pub mod retry;
pub mod traits;

pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingProvider, with_retry, with_timeout};
pub use traits::ChatProvider;
