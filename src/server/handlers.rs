//! HTTP handlers and error mapping.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::RepurposeError;
use crate::extract::{Article, Extractor, INVALID_URL};
use crate::pipeline::Generator;
use crate::types::GenerationRequest;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
    pub extractor: Extractor,
}

impl AppState {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self {
            generator,
            extractor: Extractor::new(),
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }
}

/// Identify the caller for rate limiting: the first `x-forwarded-for`
/// entry, else the peer address, else `"unknown"`.
pub fn caller_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `POST /api/generate`
///
/// The body is parsed leniently: anything that isn't a JSON object is
/// treated as a request without text and rejected with 400.
pub async fn generate(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, RepurposeError> {
    let caller = caller_key(&headers, peer.map(|ConnectInfo(addr)| addr));
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let request = GenerationRequest::from_value(&value);

    let generation = state.generator.generate(&caller, &request).await?;
    Ok(Json(generation.body))
}

#[derive(Debug, Deserialize)]
pub struct ExtractParams {
    pub url: Option<String>,
}

/// `GET /api/extract?url=...`
pub async fn extract(
    State(state): State<AppState>,
    Query(params): Query<ExtractParams>,
) -> Result<Json<Article>, RepurposeError> {
    let url = params
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| RepurposeError::InvalidInput(INVALID_URL.to_string()))?;

    let article = state.extractor.extract(url).await?;
    debug!(url, length = ?article.length, "article extracted");
    Ok(Json(article))
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: String,
    pub model: String,
    pub provider_configured: bool,
    pub rate_limit_buckets: usize,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let generator = &state.generator;
    Json(Health {
        status: "ok",
        version: crate::version_string(),
        model: generator.model().to_string(),
        provider_configured: generator.has_provider(),
        rate_limit_buckets: generator.limiter().len(),
    })
}

/// Fallback for unsupported methods on `/api/generate`.
pub async fn method_not_allowed() -> Response {
    (StatusCode::METHOD_NOT_ALLOWED, Json(json!({"error": "Use POST"}))).into_response()
}

impl IntoResponse for RepurposeError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            RepurposeError::Throttled { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({"error": "Too many requests"}),
            ),
            RepurposeError::InvalidInput(message) => {
                (StatusCode::BAD_REQUEST, json!({"error": message}))
            }
            RepurposeError::Fetch {
                status: Some(status),
                ..
            } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                json!({"error": format!("Failed to fetch URL ({status})")}),
            ),
            RepurposeError::Fetch {
                status: None,
                message,
            } => {
                error!(error = %message, "page fetch failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Server error extracting content", "details": message}),
                )
            }
            RepurposeError::Unreadable => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({"error": "Could not extract readable content."}),
            ),
            RepurposeError::MissingCredential(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": self.to_string()}),
            ),
            e if e.is_upstream() => (
                StatusCode::BAD_GATEWAY,
                json!({"error": "Model request failed", "details": e.to_string()}),
            ),
            e => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal error"}),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(caller_key(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        let peer: SocketAddr = "192.0.2.1:443".parse().unwrap();
        assert_eq!(caller_key(&headers, Some(peer)), "192.0.2.1");
        assert_eq!(caller_key(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn error_statuses() {
        let cases = [
            (
                RepurposeError::Throttled {
                    caller: "a".into(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                RepurposeError::InvalidInput("Missing text".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RepurposeError::MissingCredential("OPENAI_API_KEY"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RepurposeError::Api {
                    status: 503,
                    message: "down".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RepurposeError::Fetch {
                    status: Some(404),
                    message: "gone".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                RepurposeError::Fetch {
                    status: None,
                    message: "dns".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (RepurposeError::Unreadable, StatusCode::UNPROCESSABLE_ENTITY),
            (
                RepurposeError::Storage("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
