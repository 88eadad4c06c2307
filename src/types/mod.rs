//! Core types for requests, drafts and provider exchanges

mod chat;
mod output;
mod platform;
mod request;

pub use chat::{ChatOptions, ChatResponse, Message, Role, Usage};
pub use output::{GenerationOutput, InstagramPost, LinkedInPost, XStyle, XThread};
pub use platform::Platform;
pub use request::{GenerationRequest, MAX_TEXT_CHARS, MAX_TITLE_CHARS, NormalizedRequest};
pub(crate) use request::truncate_chars;
