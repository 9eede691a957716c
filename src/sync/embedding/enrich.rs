//! Attach embedding vectors to records.
//!
//! Enrichment never fails a record: any error or a vector of the wrong
//! length leaves the corresponding attribute `null`.

use serde_json::Value;
use tracing::warn;

use crate::sync::core::errors::SyncResult;
use crate::sync::core::record::Record;
use crate::sync::embedding::embedder::Embedder;

/// Attribute holding the image vector.
pub const IMAGE_EMBEDDING: &str = "image_embedding";
/// Attribute holding the text vector.
pub const INFO_EMBEDDING: &str = "info_embedding";

/// Plain attributes concatenated into the info text, in order.
const INFO_FIELDS: [&str; 7] = [
    "title",
    "brand",
    "description",
    "category",
    "gender",
    "price",
    "size",
];

/// Per-run enrichment tallies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnrichStats {
    /// Records that received an image vector.
    pub image_vectors: usize,
    /// Records that received an info vector.
    pub info_vectors: usize,
    /// Records skipped because they have no image.
    pub without_image: usize,
}

/// Enrichment stage over an embedder.
pub struct Enricher<'a> {
    embedder: &'a dyn Embedder,
    stats: EnrichStats,
}

impl<'a> Enricher<'a> {
    /// Create an enricher.
    #[must_use]
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            stats: EnrichStats::default(),
        }
    }

    /// Tallies so far.
    #[must_use]
    pub const fn stats(&self) -> EnrichStats {
        self.stats
    }

    /// Attach image and info vectors to `record`.
    pub fn enrich(&mut self, record: &mut Record) {
        let Some(image_url) = record.get_str("image_url").map(str::to_string) else {
            warn!("record {} has no image, skipping embeddings", record.id);
            self.stats.without_image += 1;
            mark_absent(record);
            return;
        };

        let image = self.checked(record, IMAGE_EMBEDDING, self.embedder.embed_image(&image_url));
        if !image.is_null() {
            self.stats.image_vectors += 1;
        }
        record.set(IMAGE_EMBEDDING, image);

        let text = info_text(record);
        let info = if text.trim().is_empty() {
            Value::Null
        } else {
            self.checked(record, INFO_EMBEDDING, self.embedder.embed_text(&text))
        };
        if !info.is_null() {
            self.stats.info_vectors += 1;
        }
        record.set(INFO_EMBEDDING, info);
    }

    fn checked(
        &self,
        record: &Record,
        label: &str,
        result: SyncResult<Vec<f32>>,
    ) -> Value {
        match result {
            Ok(vector) if vector.len() == self.embedder.ndims() => vector_value(&vector),
            Ok(vector) => {
                warn!(
                    "{label} for {} has {} dims, expected {}",
                    record.id,
                    vector.len(),
                    self.embedder.ndims()
                );
                Value::Null
            }
            Err(err) => {
                warn!("{label} failed for {}: {err}", record.id);
                Value::Null
            }
        }
    }
}

/// Set both vector attributes to `null`.
pub fn mark_absent(record: &mut Record) {
    record.set(IMAGE_EMBEDDING, Value::Null);
    record.set(INFO_EMBEDDING, Value::Null);
}

/// Text fed to the text encoder for a record.
#[must_use]
pub fn info_text(record: &Record) -> String {
    let mut parts: Vec<String> = INFO_FIELDS
        .iter()
        .filter_map(|field| record.get_str(field))
        .map(str::to_string)
        .collect();

    if let Some(metadata) = record
        .get_str("metadata")
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
    {
        if let Some(product_type) = metadata.get("product_type").and_then(Value::as_str) {
            parts.push(product_type.to_string());
        }
        if let Some(tags) = metadata.get("tags").and_then(Value::as_array) {
            let tags: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
            parts.push(tags.join(" "));
        }
    }

    parts.retain(|part| !part.is_empty());
    parts.join(" ")
}

fn vector_value(vector: &[f32]) -> Value {
    Value::Array(vector.iter().map(|x| Value::from(f64::from(*x))).collect())
}
