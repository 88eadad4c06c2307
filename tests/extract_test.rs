//! `GET /api/extract` against pages served by wiremock.

#![cfg(feature = "server")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use repurpose::Generator;
use repurpose::extract::BROWSER_USER_AGENT;
use repurpose::server::{AppState, router};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<!DOCTYPE html>
<html><head>
<title>Why slow newsletters keep their readers</title>
<meta name="author" content="Ada Writer">
</head>
<body>
<header><a href="/">Home</a> <a href="/subscribe">Subscribe</a></header>
<article>
<h1>Why slow newsletters keep their readers</h1>
<p>Writers who publish once a month, and only when they have something to say, tend to keep their readers for years, while weekly digests quietly bleed subscribers.</p>
<p>The reason is attention: every issue that arrives without a clear idea teaches the reader that the next one can wait, and after a few of those the inbox filter does the rest.</p>
<p>Slow publishing also changes how an issue is written, because there is time to cut, to rewrite the opening, and to test the argument against a friend who disagrees.</p>
<p>None of this means frequency is bad, but it does mean that frequency without a reason is a cost that compounds, and the readers who leave rarely come back.</p>
</article>
<footer>Copyright</footer>
</body></html>"#;

fn app() -> axum::Router {
    router(AppState::new(Arc::new(Generator::builder().build())))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn extract_uri(page: &str) -> String {
    format!("/api/extract?url={page}")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn serve(route: &str, response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("user-agent", BROWSER_USER_AGENT))
        .and(header("accept-language", "en-US,en;q=0.9"))
        .respond_with(response)
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn extracts_readable_article() {
    let server = serve(
        "/p/slow",
        ResponseTemplate::new(200).set_body_raw(ARTICLE, "text/html; charset=utf-8"),
    )
    .await;
    let page = format!("{}/p/slow", server.uri());

    let response = app().oneshot(get(&extract_uri(&page))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["title"], json!("Why slow newsletters keep their readers"));
    assert_eq!(body["sourceUrl"], json!(page));
    assert!(
        body["text"]
            .as_str()
            .unwrap()
            .contains("the inbox filter does the rest")
    );
    assert!(body["html"].as_str().unwrap().contains("compounds"));
    assert!(body["length"].as_u64().unwrap() > 0);
    for field in ["author", "siteName", "excerpt"] {
        assert!(body.get(field).is_some(), "{field} missing");
    }
}

#[tokio::test]
async fn page_without_content_is_unprocessable() {
    let server = serve(
        "/empty",
        ResponseTemplate::new(200).set_body_raw("<html><body></body></html>", "text/html"),
    )
    .await;

    let response = app()
        .oneshot(get(&extract_uri(&format!("{}/empty", server.uri()))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Could not extract readable content."})
    );
}

#[tokio::test]
async fn upstream_status_is_passed_through() {
    for status in [404u16, 503] {
        let server = serve("/gone", ResponseTemplate::new(status)).await;

        let response = app()
            .oneshot(get(&extract_uri(&format!("{}/gone", server.uri()))))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), status);
        assert_eq!(
            json_body(response).await,
            json!({"error": format!("Failed to fetch URL ({status})")})
        );
    }
}

#[tokio::test]
async fn missing_url_is_rejected() {
    for uri in ["/api/extract", "/api/extract?url=", "/api/extract?url=ftp://x/y"] {
        let response = app().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            json_body(response).await,
            json!({"error": "Missing or invalid URL parameter."})
        );
    }
}

#[tokio::test]
async fn unreachable_host_is_a_server_error() {
    let response = app()
        .oneshot(get(&extract_uri("http://127.0.0.1:1/p")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], json!("Server error extracting content"));
    assert!(body["details"].is_string());
}
