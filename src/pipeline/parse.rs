//! Tolerant parsing of model replies.
//!
//! Models asked for JSON sometimes wrap it in prose or code fences. The
//! parser tries, in order:
//!
//! 1. the whole reply as a JSON object
//! 2. each balanced top-level `{...}` block that holds an object, last one
//!    first
//! 3. an empty object
//!
//! Parsing never fails. Anything other than step 1 succeeding is reported
//! as degraded so callers can flag it.

use serde_json::{Map, Value};

/// Outcome of parsing a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub value: Value,
    /// The reply was not clean JSON: a block was salvaged or nothing was usable.
    pub degraded: bool,
}

pub fn parse_reply(content: &str) -> ParsedReply {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(content) {
        return ParsedReply {
            value,
            degraded: false,
        };
    }

    let value = object_blocks(content)
        .into_iter()
        .rev()
        .find_map(|block| match serde_json::from_str::<Value>(block) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        })
        .unwrap_or_else(|| Value::Object(Map::new()));

    ParsedReply {
        value,
        degraded: true,
    }
}

/// Balanced top-level `{...}` blocks, in order of appearance.
///
/// Braces inside JSON strings (including escaped quotes) are ignored, so
/// `{"a": "}"}` is one block. A `{` that never closes does not hide what
/// follows it: scanning resumes right after it.
fn object_blocks(s: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut from = 0;
    while let Some(unclosed) = scan_blocks(s, from, &mut blocks) {
        from = unclosed + 1;
    }
    blocks
}

/// Push the blocks of `s[from..]` onto `blocks`. Returns the position of the
/// outer `{` when the input ends inside a block.
fn scan_blocks<'a>(s: &'a str, from: usize, blocks: &mut Vec<&'a str>) -> Option<usize> {
    let mut depth = 0usize;
    let mut start = from;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in s.bytes().enumerate().skip(from) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    (depth > 0).then_some(start)
}
