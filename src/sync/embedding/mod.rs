//! Optional embedding enrichment.

pub mod embedder;
pub mod enrich;

pub use embedder::{Embedder, HttpEmbedder};
pub use enrich::{EnrichStats, Enricher, info_text, mark_absent};
