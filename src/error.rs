//! Repurpose error types

use std::time::Duration;

/// HTTP status codes worth another attempt.
const RETRIABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// How a failed provider call is classified for retry decisions.
///
/// The classification is closed: every error maps to exactly one kind, and
/// only [`FailureKind::Timeout`] and [`FailureKind::RetriableStatus`] are
/// retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    RetriableStatus,
    FatalStatus,
    NetworkError,
}

/// Repurpose error types
#[derive(Debug, thiserror::Error)]
pub enum RepurposeError {
    // Admission errors
    #[error("too many requests from {caller}")]
    Throttled { caller: String },

    // Request errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    /// No provider credential is configured; carries the env var that would supply it.
    #[error("{0} not set")]
    MissingCredential(&'static str),

    #[error("configuration error: {0}")]
    Configuration(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Content extraction errors
    /// Fetching the page failed; `status` is the upstream status when one came back.
    #[error("failed to fetch page: {message}")]
    Fetch {
        status: Option<u16>,
        message: String,
    },

    #[error("no readable content")]
    Unreadable,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for RepurposeError {
    fn from(err: rusqlite::Error) -> Self {
        RepurposeError::Storage(err.to_string())
    }
}

impl RepurposeError {
    /// Classify a provider-side failure, or `None` for local errors.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RepurposeError::Timeout(_) => Some(FailureKind::Timeout),
            RepurposeError::Api { status, .. } if RETRIABLE_STATUSES.contains(status) => {
                Some(FailureKind::RetriableStatus)
            }
            RepurposeError::Api { .. } => Some(FailureKind::FatalStatus),
            RepurposeError::Http(_) => Some(FailureKind::NetworkError),
            _ => None,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.failure_kind(),
            Some(FailureKind::Timeout | FailureKind::RetriableStatus)
        )
    }

    /// Whether the failure came from the model provider or the wire to it.
    pub fn is_upstream(&self) -> bool {
        self.failure_kind().is_some()
    }
}

/// Result type alias for Repurpose operations
pub type Result<T> = std::result::Result<T, RepurposeError>;
