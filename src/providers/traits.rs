//! Provider trait for chat-completion backends.
//!
//! The pipeline only needs one capability from a model provider: turn a
//! list of messages into a reply. Keeping it behind a trait lets decorators
//! such as [`RetryingProvider`](super::RetryingProvider) wrap any backend,
//! and lets tests substitute scripted providers for the network.
//!
//! # Error contract
//!
//! Implementations report failures through [`RepurposeError`](crate::RepurposeError)
//! variants that classify cleanly (see
//! [`RepurposeError::failure_kind`](crate::RepurposeError::failure_kind)):
//! `Timeout` for deadlines, `Api` for non-2xx statuses, `Http` for transport
//! problems. Retry decisions are taken from that classification alone.

use async_trait::async_trait;

use crate::Result;
use crate::types::{ChatOptions, ChatResponse, Message};

/// Provider for chat completions.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Send a conversation and return the model's reply.
    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse>;
}
