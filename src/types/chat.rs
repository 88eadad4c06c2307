//! Provider-facing exchange: prompt messages in, completion text and token
//! counts out.

use serde::{Deserialize, Serialize};

/// Author of a prompt message.
///
/// The pipeline sends one system instruction followed by the article, so
/// there is no assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-call settings handed to a [`ChatProvider`](crate::ChatProvider).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Constrain the reply to a single JSON object.
    pub json_mode: bool,
}

impl ChatOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// One completion as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    /// Raw reply text. Providers substitute `"{}"` when the reply has none.
    pub content: String,
    /// Token counts, when the provider reported them.
    pub usage: Option<Usage>,
    /// Model that actually served the call, which may be a dated snapshot
    /// of the requested one.
    pub model: Option<String>,
    /// Provider-assigned request id (`x-request-id`), kept for usage records.
    pub request_id: Option<String>,
}

/// Token counts for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}
