//! Remote product catalog: fetch raw entries and turn them into records.
//!
//! This module provides:
//! - A paginated `products.json` feed client
//! - Raw feed types
//! - The field transformer producing normalized records

pub mod config;
pub mod error;
pub mod fetch;
pub mod transform;
pub mod types;

pub use config::{CatalogConfig, CurrencyRate};
pub use error::{CatalogError, CatalogResult};
pub use fetch::{CatalogSource, ShopifyCatalog};
pub use transform::ProductTransformer;
pub use types::{RawImage, RawProduct, RawVariant};
