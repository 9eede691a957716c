//! Store access for catalog rows.

#[cfg(test)]
pub(crate) mod memory_store;
pub mod normalize;
pub mod postgrest;
pub mod store;

pub use normalize::{normalize_records, normalize_rows};
pub use postgrest::PostgrestStore;
pub use store::{CatalogStore, InsertAck, RequestTier};
