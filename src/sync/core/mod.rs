//! Core sync types: configuration, errors, and records.

pub mod config;
pub mod errors;
pub mod record;

pub use config::{EmbeddingConfig, StoreConfig, SyncConfig};
pub use errors::{SyncError, SyncResult};
pub use record::{Record, Row, collapse_duplicates, record_id};
