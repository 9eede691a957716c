//! Configuration for the catalog module.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::catalog::error::{CatalogError, CatalogResult};

/// Configuration for fetching and transforming one catalog source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Storefront base URL.
    pub base_url: String,
    /// Collection path below the base URL.
    pub collection_path: String,
    /// Products requested per page.
    pub per_page: u32,
    /// Pause between pages.
    #[serde(with = "duration_serde")]
    pub page_delay: Duration,
    /// Timeout for a single page request.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Source tag; must be unique per catalog.
    pub source: String,
    /// Brand written on every record.
    pub brand: String,
    /// Gender written on every record.
    pub gender: String,
    /// Country code written on every record.
    pub country: String,
    /// Currency the storefront prices in.
    pub base_currency: String,
    /// Extra currencies appended to the price field, in order.
    pub conversions: Vec<CurrencyRate>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://drmersclub.com".to_string(),
            collection_path: "collections/shop-all".to_string(),
            per_page: 250,
            page_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            source: "drmersclub".to_string(),
            brand: "Drmers Club".to_string(),
            gender: "man".to_string(),
            country: "CA".to_string(),
            base_currency: "CAD".to_string(),
            conversions: default_conversions(),
        }
    }
}

impl CatalogConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storefront base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the source tag.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the pause between pages.
    #[must_use]
    pub const fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Storefront base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// URL of the paginated `products.json` feed.
    #[must_use]
    pub fn products_url(&self) -> String {
        format!("{}/{}/products.json", self.base(), self.collection_path)
    }

    /// Public product page for a handle.
    #[must_use]
    pub fn product_url(&self, handle: &str) -> String {
        format!("{}/{}/products/{handle}", self.base(), self.collection_path)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> CatalogResult<()> {
        Url::parse(&self.base_url)?;

        if self.per_page == 0 {
            return Err(CatalogError::Config("per_page must be > 0".to_string()));
        }

        if self.source.trim().is_empty() {
            return Err(CatalogError::Config("source must not be empty".to_string()));
        }

        if let Some(rate) = self.conversions.iter().find(|rate| rate.rate <= 0.0) {
            return Err(CatalogError::Config(format!(
                "conversion rate for {} must be > 0",
                rate.code
            )));
        }

        Ok(())
    }
}

/// Conversion from the base currency into another currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRate {
    /// ISO currency code.
    pub code: String,
    /// Multiplier applied to a base-currency amount.
    pub rate: f64,
}

impl CurrencyRate {
    /// Create a new conversion entry.
    #[must_use]
    pub fn new(code: impl Into<String>, rate: f64) -> Self {
        Self {
            code: code.into(),
            rate,
        }
    }
}

/// Approximate conversions out of CAD.
fn default_conversions() -> Vec<CurrencyRate> {
    vec![
        CurrencyRate::new("USD", 0.72),
        CurrencyRate::new("EUR", 0.67),
        CurrencyRate::new("GBP", 0.57),
        CurrencyRate::new("CZK", 16.5),
        CurrencyRate::new("PLN", 2.9),
    ]
}

/// Serde module for Duration serialization as milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
