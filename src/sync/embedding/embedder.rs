//! Embedding model abstraction and its HTTP implementation.

use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::sync::core::config::EmbeddingConfig;
use crate::sync::core::errors::{SyncError, SyncResult};

/// Trait abstraction over embedding models.
pub trait Embedder: Send + Sync {
    /// Embed the image found at `image_url`.
    ///
    /// # Errors
    /// Returns an error if the image cannot be downloaded or embedded.
    fn embed_image(&self, image_url: &str) -> SyncResult<Vec<f32>>;
    /// Embed a text string.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_text(&self, text: &str) -> SyncResult<Vec<f32>>;
    /// Return embedding dimensionality.
    fn ndims(&self) -> usize;
}

#[derive(Serialize)]
struct TextRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by an HTTP embedding service.
///
/// `POST {endpoint}/embed/text` takes `{model, input}` and
/// `POST {endpoint}/embed/image` takes `{model, image}` with base64 image
/// bytes; both answer `{"embedding": [...]}`.
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    /// Create a new embedder from config.
    ///
    /// # Errors
    /// Returns an error if the endpoint is invalid or the client cannot be built.
    pub fn new(config: EmbeddingConfig) -> SyncResult<Self> {
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        tracing::info!(
            "embedding model {} via {endpoint} ({} dims)",
            config.model,
            config.ndims
        );
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    fn route(&self, path: &str) -> SyncResult<Url> {
        Ok(Url::parse(&format!(
            "{}/{path}",
            self.endpoint.as_str().trim_end_matches('/')
        ))?)
    }

    /// Download image bytes, retrying a few times before giving up.
    fn download_image(&self, image_url: &str) -> SyncResult<Vec<u8>> {
        let attempts = self.config.image_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = self
                .client
                .get(image_url)
                .timeout(Duration::from_secs(self.config.image_timeout_secs))
                .send()
                .and_then(reqwest::blocking::Response::error_for_status)
                .and_then(reqwest::blocking::Response::bytes);

            match result {
                Ok(bytes) => return Ok(bytes.to_vec()),
                Err(err) => {
                    tracing::debug!("image download attempt {attempt}/{attempts} failed: {err}");
                    last_error = Some(err);
                    if attempt < attempts {
                        thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                    }
                }
            }
        }

        Err(last_error.map_or_else(
            || SyncError::Embedding(format!("failed to load image {image_url}")),
            SyncError::Http,
        ))
    }

    fn post_embedding<B: Serialize>(&self, path: &str, body: &B) -> SyncResult<Vec<f32>> {
        let response = self.client.post(self.route(path)?).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(SyncError::Embedding(format!(
                "{path} returned {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }
        let parsed: EmbeddingResponse = response.json()?;
        Ok(parsed.embedding)
    }
}

impl Embedder for HttpEmbedder {
    fn embed_image(&self, image_url: &str) -> SyncResult<Vec<f32>> {
        let bytes = self.download_image(image_url)?;
        let request = ImageRequest {
            model: &self.config.model,
            image: STANDARD.encode(bytes),
        };
        self.post_embedding("embed/image", &request)
    }

    fn embed_text(&self, text: &str) -> SyncResult<Vec<f32>> {
        let input = truncate_chars(text.trim(), self.config.max_text_chars);
        if input.is_empty() {
            return Err(SyncError::Embedding("text is empty".to_string()));
        }
        let request = TextRequest {
            model: &self.config.model,
            input: &input,
        };
        self.post_embedding("embed/text", &request)
    }

    fn ndims(&self) -> usize {
        self.config.ndims
    }
}

/// First `max_chars` characters of `text`.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
