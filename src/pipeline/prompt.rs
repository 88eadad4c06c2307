//! Prompt construction.
//!
//! Changing either prompt changes what the cache holds, so any edit here
//! must come with a [`PROMPT_VERSION`](crate::fingerprint::PROMPT_VERSION) bump.

use crate::types::{Message, NormalizedRequest};

/// Placeholder the model is told to use for the call-to-action link.
pub const LINK_PLACEHOLDER: &str = "{{LINK}}";

const SYSTEM_PROMPT: &str = r#"You repurpose newsletter articles into social media posts tailored to each platform.

Guidelines:
- Preserve the author's voice and keep it tight.
- End with a call to action pointing back to the original article, written as the literal placeholder {{LINK}}.
- X: one or two threads of numbered posts, each post at most 280 characters. Tag each thread with a style of "authority" or "story".
- LinkedIn: one long-form post with a strong opening hook, generous line breaks and 3-5 bullet points.
- Instagram: one caption with line breaks, one or two emojis per paragraph and a call to action.
- No hashtags, except 1-3 relevant ones on Instagram.

Reply with JSON only, no commentary, shaped exactly like:
{
  "x": [{ "style": "authority" | "story", "items": [string] }],
  "linkedin": [{ "headline": string, "body": string }],
  "instagram": [{ "caption": string }]
}"#;

/// The fixed system instruction.
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// The per-article user instruction.
pub fn user_prompt(request: &NormalizedRequest) -> String {
    let title = if request.title.is_empty() {
        "(unknown)"
    } else {
        request.title.as_str()
    };
    format!("Title: {title}\n\nArticle:\n{}", request.text)
}

/// System plus user message for one generation.
pub fn build_messages(request: &NormalizedRequest) -> Vec<Message> {
    vec![
        Message::system(system_prompt()),
        Message::user(user_prompt(request)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenerationRequest;

    #[test]
    fn untitled_articles_say_unknown() {
        let req = GenerationRequest::new("  some   body ").normalize().unwrap();
        assert_eq!(user_prompt(&req), "Title: (unknown)\n\nArticle:\nsome body");
    }

    #[test]
    fn title_is_included() {
        let req = GenerationRequest::new("body").title(" Hello ").normalize().unwrap();
        assert!(user_prompt(&req).starts_with("Title: Hello\n"));
    }

    #[test]
    fn system_prompt_mentions_placeholder() {
        assert!(system_prompt().contains(LINK_PLACEHOLDER));
        let messages = build_messages(&GenerationRequest::new("b").normalize().unwrap());
        assert_eq!(messages.len(), 2);
    }
}
