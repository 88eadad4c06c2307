//! HTTP-level tests for the axum router.

#![cfg(feature = "server")]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use repurpose::server::{AppState, router};
use repurpose::{
    ChatOptions, ChatProvider, ChatResponse, Generator, Message, RepurposeError, Result,
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct StaticProvider {
    fail: bool,
    calls: AtomicU32,
}

#[async_trait]
impl ChatProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RepurposeError::Api {
                status: 500,
                message: "upstream exploded".into(),
            });
        }
        Ok(ChatResponse {
            content: json!({
                "x": [{"style": "story", "items": ["1/ {{LINK}}"]}],
                "linkedin": [{"headline": "H", "body": "B"}],
                "instagram": [{"caption": "C"}],
            })
            .to_string(),
            ..Default::default()
        })
    }
}

fn app(provider: Option<Arc<StaticProvider>>) -> axum::Router {
    let mut builder = Generator::builder();
    if let Some(provider) = provider {
        builder = builder.provider(provider);
    }
    router(AppState::new(Arc::new(builder.build())))
}

fn working() -> Arc<StaticProvider> {
    Arc::new(StaticProvider {
        fail: false,
        calls: AtomicU32::new(0),
    })
}

fn post(body: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_owned()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn generate_returns_drafts_with_link() {
    let response = app(Some(working()))
        .oneshot(post(
            r#"{"title":"T","text":"Body text","platforms":["x"],"link":"https://s.co/p"}"#,
            "203.0.113.7",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({
            "x": [{"style": "story", "items": ["1/ https://s.co/p"]}],
            "linkedin": [],
            "instagram": [],
        })
    );
}

#[tokio::test]
async fn get_on_generate_is_405() {
    let response = app(Some(working()))
        .oneshot(
            Request::builder()
                .uri("/api/generate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await, json!({"error": "Use POST"}));
}

#[tokio::test]
async fn missing_text_is_400() {
    let provider = working();
    let response = app(Some(provider.clone()))
        .oneshot(post(r#"{"title":"only a title"}"#, "203.0.113.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Missing text"}));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_json_body_is_400() {
    let response = app(Some(working()))
        .oneshot(post("this is not json", "203.0.113.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_key_is_500_naming_the_variable() {
    let response = app(None)
        .oneshot(post(r#"{"text":"hello"}"#, "203.0.113.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "OPENAI_API_KEY not set"})
    );
}

#[tokio::test]
async fn provider_failure_is_502_with_details() {
    let provider = Arc::new(StaticProvider {
        fail: true,
        calls: AtomicU32::new(0),
    });
    let response = app(Some(provider))
        .oneshot(post(r#"{"text":"hello"}"#, "203.0.113.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"], json!("Model request failed"));
    assert!(body["details"].as_str().unwrap().contains("upstream exploded"));
}

#[tokio::test]
async fn eleventh_request_from_one_ip_is_429() {
    let app = app(Some(working()));
    for _ in 0..10 {
        let response = app
            .clone()
            .oneshot(post(r#"{"text":"hello"}"#, "198.51.100.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post(r#"{"text":"hello"}"#, "198.51.100.4, 10.0.0.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Too many requests"})
    );

    let response = app
        .oneshot(post(r#"{"text":"hello"}"#, "198.51.100.5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_reports_configuration() {
    let response = app(None)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["model"], json!("gpt-4o-mini"));
    assert_eq!(body["provider_configured"], json!(false));
}
