//! Generated drafts, one list per platform.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::platform::Platform;

/// Voice of an X thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XStyle {
    Authority,
    Story,
}

/// A numbered thread of short posts for X.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XThread {
    pub style: XStyle,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInPost {
    pub headline: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstagramPost {
    pub caption: String,
}

/// Drafts for every requested platform. Unrequested platforms stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub x: Vec<XThread>,
    #[serde(default)]
    pub linkedin: Vec<LinkedInPost>,
    #[serde(default)]
    pub instagram: Vec<InstagramPost>,
}

impl GenerationOutput {
    /// Build the output from a loosely parsed model reply.
    ///
    /// Only `platforms` are read. Within a platform array each element is
    /// decoded on its own; elements that don't fit the draft shape are
    /// dropped so one bad entry doesn't cost the rest.
    pub fn shape(reply: &Value, platforms: &[Platform]) -> Self {
        let wants = |p: Platform| platforms.contains(&p);
        Self {
            x: if wants(Platform::X) {
                decode_items(reply, Platform::X)
            } else {
                Vec::new()
            },
            linkedin: if wants(Platform::Linkedin) {
                decode_items(reply, Platform::Linkedin)
            } else {
                Vec::new()
            },
            instagram: if wants(Platform::Instagram) {
                decode_items(reply, Platform::Instagram)
            } else {
                Vec::new()
            },
        }
    }

    /// Total number of drafts across platforms.
    pub fn len(&self) -> usize {
        self.x.len() + self.linkedin.len() + self.instagram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode_items<T: DeserializeOwned>(reply: &Value, platform: Platform) -> Vec<T> {
    let Some(items) = reply.get(platform.as_str()).and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match T::deserialize(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(%platform, index, error = %e, "dropping malformed draft");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply() -> Value {
        json!({
            "x": [{"style": "story", "items": ["1/ hi", "2/ bye"]}],
            "linkedin": [{"headline": "H", "body": "B"}],
            "instagram": [{"caption": "C"}],
        })
    }

    #[test]
    fn linkedin_only_leaves_others_empty() {
        let out = GenerationOutput::shape(&reply(), &[Platform::Linkedin]);
        assert!(out.x.is_empty());
        assert!(out.instagram.is_empty());
        assert_eq!(out.linkedin.len(), 1);
        assert_eq!(out.linkedin[0].headline, "H");
    }

    #[test]
    fn all_platforms_decoded() {
        let out = GenerationOutput::shape(&reply(), &Platform::ALL);
        assert_eq!(out.len(), 3);
        assert_eq!(out.x[0].style, XStyle::Story);
    }

    #[test]
    fn malformed_entries_dropped() {
        let reply = json!({
            "x": [
                {"style": "rant", "items": ["nope"]},
                {"style": "authority", "items": ["1/ ok"]},
                "just a string",
            ],
            "linkedin": "not an array",
        });
        let out = GenerationOutput::shape(&reply, &Platform::ALL);
        assert_eq!(out.x.len(), 1);
        assert_eq!(out.x[0].style, XStyle::Authority);
        assert!(out.linkedin.is_empty());
    }

    #[test]
    fn empty_reply_shapes_to_empty_output() {
        let out = GenerationOutput::shape(&json!({}), &Platform::ALL);
        assert!(out.is_empty());
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"x": [], "linkedin": [], "instagram": []})
        );
    }
}
