//! Error types for the sync subsystem.

use thiserror::Error;

/// Sync subsystem error type.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Store credentials are not configured.
    #[error("missing credentials: {0}")]
    MissingCredentials(String),
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The store answered but refused the request.
    #[error("store rejected request with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// Embedding generation failed.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Store never answered: connection refused or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl SyncError {
    /// Whether the failure happened before the store could answer.
    ///
    /// Repeated transport failures are treated as a systemic outage.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Unavailable(_))
    }

    /// Build a rejection error, truncating the body to `max_chars`.
    #[must_use]
    pub fn rejected(status: u16, body: &str, max_chars: usize) -> Self {
        Self::Rejected {
            status,
            body: body.chars().take(max_chars).collect(),
        }
    }
}

/// Convenience result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
