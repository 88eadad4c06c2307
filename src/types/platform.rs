//! Target social platforms

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RepurposeError;

/// A social platform a draft can be written for.
///
/// Declaration order is the canonical order used for de-duplication and
/// cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    Linkedin,
    Instagram,
}

impl Platform {
    /// All platforms in canonical order.
    pub const ALL: [Platform; 3] = [Platform::X, Platform::Linkedin, Platform::Instagram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = RepurposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Platform::X),
            "linkedin" => Ok(Platform::Linkedin),
            "instagram" => Ok(Platform::Instagram),
            other => Err(RepurposeError::InvalidInput(format!(
                "unknown platform: {other}"
            ))),
        }
    }
}
