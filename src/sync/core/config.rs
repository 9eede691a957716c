//! Configuration for the sync subsystem.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::engine::policy::BatchPolicy;

/// Environment variable holding the store base URL.
pub const ENV_STORE_URL: &str = "SUPABASE_URL";
/// Preferred environment variable for the store key.
pub const ENV_STORE_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
/// Fallback environment variable for the store key.
pub const ENV_STORE_KEY: &str = "SUPABASE_KEY";
/// Environment variable overriding the target table.
pub const ENV_STORE_TABLE: &str = "CATALOG_SYNC_TABLE";
/// Environment variable pointing at the embedding service.
pub const ENV_EMBEDDING_ENDPOINT: &str = "EMBEDDING_ENDPOINT";
/// Environment variable overriding the embedding model name.
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";

/// Top-level configuration for a sync run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Store connection settings.
    pub store: StoreConfig,
    /// Embedding service settings.
    pub embedding: EmbeddingConfig,
    /// Batching and retry strategy.
    pub policy: BatchPolicy,
}

impl SyncConfig {
    /// Build a config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = read(ENV_STORE_URL) {
            config.store.base_url = url;
        }
        config.store.api_key = read(ENV_STORE_SERVICE_KEY).or_else(|| read(ENV_STORE_KEY));
        if let Some(table) = read(ENV_STORE_TABLE) {
            config.store.table = table;
        }
        if let Some(endpoint) = read(ENV_EMBEDDING_ENDPOINT) {
            config.embedding.endpoint = endpoint;
        }
        if let Some(model) = read(ENV_EMBEDDING_MODEL) {
            config.embedding.model = model;
        }

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> SyncResult<()> {
        self.store.validate()?;
        self.embedding.validate()?;
        self.policy.validate()
    }
}

/// Store connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project base URL; the REST root is `{base_url}/rest/v1`.
    pub base_url: String,
    /// Service key. Required for anything but a dry run.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Table holding catalog rows.
    pub table: String,
    /// Timeout for batch writes, in seconds.
    pub batch_timeout_secs: u64,
    /// Timeout for single-record retries, in seconds.
    pub single_timeout_secs: u64,
    /// Timeout for id listing requests, in seconds.
    pub fetch_timeout_secs: u64,
    /// Connection timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum characters of an error body kept for logs.
    pub error_body_chars: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://yqawmzggcgpeyaaynrjk.supabase.co".to_string(),
            api_key: None,
            table: "products".to_string(),
            batch_timeout_secs: 90,
            single_timeout_secs: 60,
            fetch_timeout_secs: 60,
            connect_timeout_secs: 10,
            error_body_chars: 500,
        }
    }
}

impl StoreConfig {
    /// Set the service key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Timeout for batch writes.
    #[must_use]
    pub const fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    /// Timeout for single-record retries.
    #[must_use]
    pub const fn single_timeout(&self) -> Duration {
        Duration::from_secs(self.single_timeout_secs)
    }

    /// Timeout for id listing requests.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Service key, or an error when it is not configured.
    ///
    /// # Errors
    /// Returns `MissingCredentials` if no key is set.
    pub fn require_api_key(&self) -> SyncResult<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                SyncError::MissingCredentials(format!(
                    "{ENV_STORE_SERVICE_KEY} is required; set it in .env or the environment"
                ))
            })
    }

    fn validate(&self) -> SyncResult<()> {
        Url::parse(&self.base_url)?;

        if self.table.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "store.table must not be empty".to_string(),
            ));
        }

        if self.batch_timeout_secs == 0 || self.single_timeout_secs == 0 || self.fetch_timeout_secs == 0
        {
            return Err(SyncError::InvalidConfig(
                "store timeouts must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Embedding service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding service.
    pub endpoint: String,
    /// Model served by the endpoint.
    pub model: String,
    /// Expected vector length; must match the store's vector columns.
    pub ndims: usize,
    /// Timeout for embedding requests, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for image downloads, in seconds.
    pub image_timeout_secs: u64,
    /// Extra attempts after a failed image download.
    pub image_retries: u32,
    /// Pause between image download attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Input text is cut to this many characters.
    pub max_text_chars: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8089".to_string(),
            model: "google/siglip-base-patch16-384".to_string(),
            ndims: 768,
            request_timeout_secs: 60,
            image_timeout_secs: 20,
            image_retries: 2,
            retry_delay_ms: 1000,
            max_text_chars: 500,
        }
    }
}

impl EmbeddingConfig {
    fn validate(&self) -> SyncResult<()> {
        Url::parse(&self.endpoint)?;

        if self.ndims == 0 {
            return Err(SyncError::InvalidConfig(
                "embedding.ndims must be > 0".to_string(),
            ));
        }

        if self.max_text_chars == 0 {
            return Err(SyncError::InvalidConfig(
                "embedding.max_text_chars must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
