//! Readable-article extraction from a web page.
//!
//! The page is fetched the way a desktop browser would ask for it, run
//! through a readability pass to isolate the article body, and flattened to
//! wrapped plain text that can be fed straight into generation.

use std::time::Duration;

use dom_smoothie::Readability;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;

use crate::{RepurposeError, Result};

/// Sent as `User-Agent`; some publishers refuse obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0 Safari/537.36";

const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Default deadline for the whole page fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Rejection message for a missing or unusable `url`.
pub const INVALID_URL: &str = "Missing or invalid URL parameter.";

/// Column at which extracted text is wrapped.
const TEXT_WIDTH: usize = 120;

const UNTITLED: &str = "Untitled";

/// The readable part of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub author: Option<String>,
    pub site_name: Option<String>,
    pub excerpt: Option<String>,
    /// Length of the article text in characters, as measured by readability.
    pub length: Option<usize>,
    pub text: String,
    /// Cleaned article markup.
    pub html: String,
    pub source_url: String,
}

/// Fetches pages and extracts their article content.
#[derive(Debug, Clone)]
pub struct Extractor {
    http: Client,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }

    /// Fetch `url` and extract its article.
    ///
    /// Only absolute `http`/`https` URLs are accepted. A non-success upstream
    /// status comes back as [`RepurposeError::Fetch`] carrying that status.
    pub async fn extract(&self, url: &str) -> Result<Article> {
        let target = Url::parse(url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| RepurposeError::InvalidInput(INVALID_URL.to_string()))?;

        let response = self
            .http
            .get(target)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT_LANGUAGE, BROWSER_ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepurposeError::Fetch {
                status: Some(status.as_u16()),
                message: format!("upstream returned {status}"),
            });
        }

        let html = response.text().await.map_err(fetch_error)?;
        debug!(url, bytes = html.len(), "page fetched");

        // Readability walks the whole DOM synchronously.
        let source_url = url.to_string();
        tokio::task::spawn_blocking(move || readable(&html, source_url))
            .await
            .map_err(|e| RepurposeError::Fetch {
                status: None,
                message: format!("extraction task failed: {e}"),
            })?
    }
}

fn fetch_error(e: reqwest::Error) -> RepurposeError {
    RepurposeError::Fetch {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// Run readability over `html` and flatten the result to text.
fn readable(html: &str, source_url: String) -> Result<Article> {
    let article = Readability::new(html, Some(source_url.as_str()), None)
        .and_then(|mut readability| readability.parse())
        .map_err(|e| {
            debug!(url = %source_url, error = %e, "readability found no article");
            RepurposeError::Unreadable
        })?;

    let content = article.content.to_string();
    let text = html2text::config::plain()
        .string_from_read(content.as_bytes(), TEXT_WIDTH)
        .map_err(|e| {
            debug!(url = %source_url, error = %e, "article markup did not convert");
            RepurposeError::Unreadable
        })?;
    if text.trim().is_empty() {
        return Err(RepurposeError::Unreadable);
    }

    let title = article.title.trim();
    Ok(Article {
        title: if title.is_empty() { UNTITLED } else { title }.to_string(),
        author: non_blank(article.byline),
        site_name: non_blank(article.site_name),
        excerpt: non_blank(article.excerpt),
        length: Some(article.length),
        text: text.trim_end().to_string(),
        html: content,
        source_url,
    })
}

fn non_blank<S: ToString>(value: Option<S>) -> Option<String> {
    value
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Why slow newsletters keep their readers</title></head>
<body>
<nav><a href="/">Home</a> <a href="/about">About</a></nav>
<article>
<h1>Why slow newsletters keep their readers</h1>
<p>Writers who publish once a month, and only when they have something to say, tend to keep their readers for years, while weekly digests quietly bleed subscribers.</p>
<p>The reason is attention: every issue that arrives without a clear idea teaches the reader that the next one can wait, and after a few of those the inbox filter does the rest.</p>
<p>Slow publishing also changes how an issue is written, because there is time to cut, to rewrite the opening, and to test the argument against a friend who disagrees.</p>
<p>None of this means frequency is bad, but it does mean that frequency without a reason is a cost that compounds, and the readers who leave rarely come back.</p>
</article>
</body></html>"#;

    #[test]
    fn extracts_article_text() {
        let article = readable(PAGE, "https://news.example/p/slow".into()).unwrap();
        assert_eq!(article.title, "Why slow newsletters keep their readers");
        assert!(article.text.contains("the inbox filter does the rest"));
        assert!(article.html.contains("<p>"));
        assert_eq!(article.source_url, "https://news.example/p/slow");
    }

    #[test]
    fn text_is_wrapped() {
        let article = readable(PAGE, "https://news.example/p/slow".into()).unwrap();
        assert!(article.text.lines().all(|l| l.chars().count() <= TEXT_WIDTH));
    }

    #[test]
    fn empty_page_is_unreadable() {
        let err = readable("<html><body></body></html>", "https://e.x/".into()).unwrap_err();
        assert!(matches!(err, RepurposeError::Unreadable), "{err:?}");
    }

    #[test]
    fn article_serializes_camel_case() {
        let article = Article {
            title: "T".into(),
            author: None,
            site_name: Some("S".into()),
            excerpt: None,
            length: Some(3),
            text: "abc".into(),
            html: "<p>abc</p>".into(),
            source_url: "https://e.x/".into(),
        };
        let value = serde_json::to_value(&article).unwrap();
        assert_eq!(value["siteName"], "S");
        assert_eq!(value["sourceUrl"], "https://e.x/");
        assert!(value["author"].is_null());
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let extractor = Extractor::new();
        for url in ["", "not a url", "ftp://files.example/a"] {
            let err = extractor.extract(url).await.unwrap_err();
            assert!(matches!(err, RepurposeError::InvalidInput(_)), "{url}: {err:?}");
        }
    }
}
