//! The article-to-drafts pipeline.

pub mod generator;
pub mod inject;
pub mod parse;
pub mod prompt;

pub use generator::{Generation, Generator, GeneratorBuilder};
pub use inject::inject_link;
pub use parse::{ParsedReply, parse_reply};
