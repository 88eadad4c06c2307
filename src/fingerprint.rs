//! Content fingerprints used as response cache keys.
//!
//! A key is the SHA-256 of a canonical JSON document holding the prompt
//! schema version, the model id, the platform list and the normalized
//! content. Field order is fixed by the struct below, so the digest is
//! stable across processes and restarts, which the persistent cache relies
//! on.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{NormalizedRequest, Platform, truncate_chars};

/// Version of the prompt template and output schema.
///
/// Bump whenever the prompt or the expected reply shape changes so stale
/// cache entries stop matching.
pub const PROMPT_VERSION: u32 = 1;

/// Body characters that participate in the key.
pub const KEY_TEXT_CHARS: usize = 4000;

/// Opaque fixed-length cache key (64 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Fingerprint a normalized request for `model`.
    pub fn for_request(request: &NormalizedRequest, model: &str) -> Self {
        let text = truncate_chars(&request.text, KEY_TEXT_CHARS);
        Self(digest(&KeyDocument {
            v: PROMPT_VERSION,
            model,
            platforms: &request.platforms,
            title: &request.title,
            text: &text,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-computed key, e.g. one read back from storage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize)]
struct KeyDocument<'a> {
    v: u32,
    model: &'a str,
    platforms: &'a [Platform],
    title: &'a str,
    text: &'a str,
}

fn digest(doc: &KeyDocument<'_>) -> String {
    // Serializing a struct of strings and unit enums cannot fail.
    let canonical = serde_json::to_vec(doc).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    format!("{:x}", hasher.finalize())
}
