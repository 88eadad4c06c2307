//! OpenAI chat-completions client.
//!
//! Speaks the `/v1/chat/completions` wire format. Each call is bounded by
//! the client's timeout; retries are layered on top by
//! [`RetryingProvider`](super::RetryingProvider).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::with_timeout;
use super::traits::ChatProvider;
use crate::types::{ChatOptions, ChatResponse, Message, Usage};
use crate::{RepurposeError, Result};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Deadline for establishing the TCP/TLS connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest upstream error body carried into an error message.
const MAX_ERROR_BODY: usize = 500;

/// Client for the OpenAI chat-completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create a client for the public API with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for proxies, or wiremock in tests).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn send(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &options.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options.json_mode.then_some(JSON_OBJECT),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = handle_response_errors(response).await?;

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    transport_error(e)
                } else {
                    RepurposeError::Http(format!("invalid completion body: {e}"))
                }
            })?;

        // A reply without content is treated as an empty JSON object.
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_else(|| "{}".to_string());

        debug!(
            model = completion.model.as_deref().unwrap_or(&options.model),
            request_id = request_id.as_deref().unwrap_or("-"),
            content_len = content.len(),
            "completion received"
        );

        Ok(ChatResponse {
            content,
            usage: completion.usage,
            model: completion.model,
            request_id,
        })
    }
}

/// Classify a transport failure. Timeouts stay retriable.
fn transport_error(e: reqwest::Error) -> RepurposeError {
    if e.is_timeout() {
        RepurposeError::Timeout(CONNECT_TIMEOUT)
    } else {
        RepurposeError::Http(e.to_string())
    }
}

/// Map a non-success status to an error carrying the upstream body.
async fn handle_response_errors(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body.chars().take(MAX_ERROR_BODY).collect()
    };
    Err(RepurposeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<WireFormat>,
}

/// `response_format` object, e.g. `{"type": "json_object"}`.
#[derive(Clone, Copy, Serialize)]
struct WireFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

const JSON_OBJECT: WireFormat = WireFormat {
    kind: "json_object",
};

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, messages: &[Message], options: &ChatOptions) -> Result<ChatResponse> {
        with_timeout(self.timeout, self.send(messages, options)).await
    }
}
