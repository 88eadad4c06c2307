//! Generation requests and their normalized form.

use serde_json::Value;

use super::platform::Platform;
use crate::{RepurposeError, Result};

/// Maximum title length (chars) after trimming.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum body length (chars) after whitespace collapsing.
pub const MAX_TEXT_CHARS: usize = 8000;

/// A generation request as sent by a caller.
///
/// Fields are kept loose so that [`GenerationRequest::normalize`] can apply
/// the defaulting rules (unknown platforms dropped, missing list defaulted)
/// instead of rejecting the whole request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub title: Option<String>,
    pub text: Option<String>,
    /// `None` when the caller sent no platform list at all.
    pub platforms: Option<Vec<String>>,
    pub link: Option<String>,
}

impl GenerationRequest {
    /// Create a request for the given article body.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = Some(platforms.into_iter().map(Into::into).collect());
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Extract a request from an arbitrary JSON body.
    ///
    /// Never fails: fields with the wrong type are treated as absent, and a
    /// non-object body yields an empty request (which then fails
    /// normalization for its missing text).
    pub fn from_value(body: &Value) -> Self {
        let string_field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        let platforms = body.get("platforms").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        });
        Self {
            title: string_field("title"),
            text: string_field("text"),
            platforms,
            link: string_field("link"),
        }
    }

    /// Validate and canonicalize the request.
    ///
    /// - text: internal whitespace runs collapse to one space, then trim,
    ///   then truncate; empty afterwards is an error
    /// - title: trim, then truncate
    /// - platforms: unknown names dropped, duplicates removed, canonical
    ///   order; absent means all, empty after filtering means `[x]`
    /// - link: empty string means no link
    pub fn normalize(&self) -> Result<NormalizedRequest> {
        let text = collapse_whitespace(self.text.as_deref().unwrap_or_default());
        let text = truncate_chars(&text, MAX_TEXT_CHARS);
        if text.is_empty() {
            return Err(RepurposeError::InvalidInput("Missing text".to_string()));
        }

        let title = truncate_chars(self.title.as_deref().unwrap_or_default().trim(), MAX_TITLE_CHARS);

        let platforms = match &self.platforms {
            None => Platform::ALL.to_vec(),
            Some(names) => {
                let mut selected: Vec<Platform> =
                    names.iter().filter_map(|n| n.parse().ok()).collect();
                selected.sort();
                selected.dedup();
                if selected.is_empty() {
                    vec![Platform::X]
                } else {
                    selected
                }
            }
        };

        let link = self.link.clone().filter(|l| !l.is_empty());

        Ok(NormalizedRequest {
            title,
            text,
            platforms,
            link,
        })
    }
}

/// A validated request. Every field obeys the normalization rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub title: String,
    pub text: String,
    /// Non-empty, de-duplicated, canonical order.
    pub platforms: Vec<Platform>,
    pub link: Option<String>,
}

impl NormalizedRequest {
    pub fn wants(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }
}

/// Replace every whitespace run with a single space and trim the ends.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` chars without splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collapses_and_trims_text() {
        let req = GenerationRequest::new("  hello \n\n\t world  ").normalize().unwrap();
        assert_eq!(req.text, "hello world");
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = GenerationRequest::new(" \n\t ").normalize().unwrap_err();
        assert!(matches!(err, RepurposeError::InvalidInput(m) if m == "Missing text"));
        assert!(GenerationRequest::default().normalize().is_err());
    }

    #[test]
    fn truncates_title_and_text() {
        let req = GenerationRequest::new("a".repeat(9000))
            .title(format!("  {}  ", "t".repeat(300)))
            .normalize()
            .unwrap();
        assert_eq!(req.text.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(req.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn truncation_respects_multibyte_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }

    #[test]
    fn platforms_default_to_all() {
        let req = GenerationRequest::new("body").normalize().unwrap();
        assert_eq!(req.platforms, Platform::ALL.to_vec());
    }

    #[test]
    fn platforms_filtered_deduped_and_ordered() {
        let req = GenerationRequest::new("body")
            .platforms(["instagram", "tiktok", "x", "instagram"])
            .normalize()
            .unwrap();
        assert_eq!(req.platforms, vec![Platform::X, Platform::Instagram]);
    }

    #[test]
    fn all_invalid_platforms_fall_back_to_x() {
        let req = GenerationRequest::new("body")
            .platforms(["myspace", "X"])
            .normalize()
            .unwrap();
        assert_eq!(req.platforms, vec![Platform::X]);

        let req = GenerationRequest::new("body")
            .platforms(Vec::<String>::new())
            .normalize()
            .unwrap();
        assert_eq!(req.platforms, vec![Platform::X]);
    }

    #[test]
    fn empty_link_means_none() {
        let req = GenerationRequest::new("body").link("").normalize().unwrap();
        assert_eq!(req.link, None);
    }

    #[test]
    fn from_value_ignores_wrong_types() {
        let req = GenerationRequest::from_value(&json!({
            "title": 7,
            "text": "body",
            "platforms": ["linkedin", 3],
            "link": null,
        }));
        assert_eq!(req.title, None);
        assert_eq!(req.text.as_deref(), Some("body"));
        assert_eq!(req.platforms, Some(vec!["linkedin".to_string()]));
        assert_eq!(req.link, None);

        let req = GenerationRequest::from_value(&json!({"text": 42}));
        assert!(req.normalize().is_err());
        assert_eq!(GenerationRequest::from_value(&json!("text")), GenerationRequest::default());
    }
}
