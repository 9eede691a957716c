//! Catalog-to-store synchronization.
//!
//! This module provides:
//! - Core record, config, and error types
//! - Embedding enrichment over an HTTP embedding service
//! - The insert-new-only / delete-stale reconciliation engine
//! - A `PostgREST` store client
//! - The end-to-end sync pipeline

pub mod core;
pub mod embedding;
pub mod engine;
pub mod pipeline;
pub mod storage;

pub use self::core::{
    EmbeddingConfig, Record, Row, StoreConfig, SyncConfig, SyncError, SyncResult,
    collapse_duplicates, record_id,
};
pub use embedding::{EnrichStats, Embedder, Enricher, HttpEmbedder};
pub use engine::{BatchPolicy, DeleteOutcome, FallbackPolicy, InsertOutcome, Reconciler};
pub use pipeline::{RunOptions, SyncPipeline, SyncReport};
pub use storage::{CatalogStore, InsertAck, PostgrestStore, RequestTier};
