//! Error types for the catalog module.

use thiserror::Error;

/// Errors that can occur while fetching or transforming catalog entries.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Catalog endpoint answered with a non-success status.
    #[error("catalog page {page} returned status {status}")]
    BadStatus {
        /// Page number that failed.
        page: u32,
        /// HTTP status code.
        status: u16,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Raw entry cannot be turned into a record.
    #[error("invalid catalog entry: {0}")]
    InvalidEntry(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CatalogError {
    /// Check if this error came from the network rather than the data.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::HttpRequest(_) | Self::BadStatus { .. })
    }
}

/// Convenience result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
