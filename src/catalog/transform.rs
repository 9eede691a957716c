//! Field transformer: raw catalog entries to normalized records.

use std::collections::BTreeSet;

use regex::Regex;
use scraper::Html;
use serde_json::{Value, json};

use crate::catalog::config::CatalogConfig;
use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::types::{RawProduct, RawVariant};
use crate::sync::core::record::Record;

/// Tags that imply a category, matched case-insensitively.
const TAG_CATEGORIES: [(&str, &str); 16] = [
    ("hoodie", "Hoodies"),
    ("hoodies", "Hoodies"),
    ("denim", "Denim"),
    ("jeans", "Denim"),
    ("knitwear", "Knitwear"),
    ("sweater", "Knitwear"),
    ("tee", "Tees"),
    ("tees", "Tees"),
    ("longsleeve", "Longsleeves"),
    ("sweatpants", "Sweatpants"),
    ("jacket", "Jackets"),
    ("zip up", "Hoodies"),
    ("basics", "Basics"),
    ("tops", "Tops"),
    ("bottoms", "Bottoms"),
    ("small goods", "Small Goods"),
];

/// Builds records from raw products. Pure: same input, same record.
pub struct ProductTransformer {
    config: CatalogConfig,
    type_splitter: Regex,
}

impl ProductTransformer {
    /// Create a transformer for one catalog.
    ///
    /// # Errors
    /// Returns an error if the config is invalid.
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        config.validate()?;
        let type_splitter =
            Regex::new(r"[\s&]+").map_err(|err| CatalogError::Config(err.to_string()))?;
        Ok(Self {
            config,
            type_splitter,
        })
    }

    /// Catalog configuration in use.
    #[must_use]
    pub const fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Transform one raw product into a record (without embeddings).
    ///
    /// # Errors
    /// Returns an error if the product has no native id.
    pub fn build(&self, raw: &RawProduct) -> CatalogResult<Record> {
        let native_id = raw.native_id().ok_or_else(|| {
            CatalogError::InvalidEntry(format!("product '{}' has no id", raw.title))
        })?;

        let images = raw.image_sources();
        let image_url = images.first().copied().unwrap_or_default();
        let additional_images = (images.len() > 1).then(|| images[1..].join(" , "));

        let description = raw.body_html.as_deref().map(strip_html).unwrap_or_default();
        let product_url = if raw.handle.is_empty() {
            String::new()
        } else {
            self.config.product_url(&raw.handle)
        };

        let metadata = json!({
            "product_id": native_id,
            "handle": raw.handle,
            "vendor": raw.vendor,
            "product_type": raw.product_type,
            "tags": raw.tags,
            "published_at": raw.published_at,
            "created_at": raw.created_at,
            "updated_at": raw.updated_at,
            "variants_count": raw.variants.len(),
        });

        let tags = if raw.tags.is_empty() {
            Value::Null
        } else {
            json!(raw.tags)
        };

        Ok(Record::new(self.config.source.as_str(), &native_id)
            .with("product_url", product_url)
            .with("affiliate_url", Value::Null)
            .with("image_url", image_url)
            .with("brand", self.config.brand.as_str())
            .with("title", raw.title.as_str())
            .with("description", non_empty(description))
            .with(
                "category",
                non_empty(self.format_category(&raw.product_type, &raw.tags)),
            )
            .with("gender", self.config.gender.as_str())
            .with("metadata", metadata.to_string())
            .with("size", non_empty(format_sizes(&raw.variants)))
            .with("second_hand", false)
            .with("country", self.config.country.as_str())
            .with("tags", tags)
            .with("price", non_empty(self.format_price(&raw.variants)))
            .with("sale", self.format_sale(&raw.variants))
            .with("additional_images", additional_images)
            .with("other", Value::Null))
    }

    /// Category from the product type plus tag mappings, sorted and comma separated.
    #[must_use]
    pub fn format_category(&self, product_type: &str, tags: &[String]) -> String {
        let mut categories: BTreeSet<String> = self
            .type_splitter
            .split(product_type)
            .filter(|part| !part.is_empty())
            .map(title_case)
            .collect();

        for tag in tags {
            let tag = tag.to_lowercase();
            if let Some((_, category)) = TAG_CATEGORIES.iter().find(|(key, _)| *key == tag) {
                categories.insert((*category).to_string());
            }
        }

        if categories.is_empty() {
            product_type.to_string()
        } else {
            categories.into_iter().collect::<Vec<_>>().join(", ")
        }
    }

    /// Lowest positive price in the base currency followed by each conversion,
    /// e.g. `140.00CAD,100.80USD`.
    #[must_use]
    pub fn format_price(&self, variants: &[RawVariant]) -> String {
        let lowest = variants
            .iter()
            .filter_map(RawVariant::price_amount)
            .filter(|price| *price > 0.0)
            .min_by(f64::total_cmp);

        let Some(base) = lowest else {
            return String::new();
        };

        let mut parts = vec![format!("{base:.2}{}", self.config.base_currency)];
        for rate in &self.config.conversions {
            if rate.code == self.config.base_currency {
                continue;
            }
            let converted = (base * rate.rate * 100.0).round() / 100.0;
            parts.push(format!("{converted:.2}{}", rate.code));
        }
        parts.join(",")
    }

    /// Sale note for the first variant discounted below its compare-at price.
    #[must_use]
    pub fn format_sale(&self, variants: &[RawVariant]) -> Option<String> {
        let currency = &self.config.base_currency;
        variants.iter().find_map(|variant| {
            let price = variant.price_amount().unwrap_or(0.0);
            let compare = variant.compare_at_amount()?;
            (compare > price)
                .then(|| format!("Sale: {price:.2}{currency} (was {compare:.2}{currency})"))
        })
    }
}

/// Distinct size labels in variant order.
#[must_use]
pub fn format_sizes(variants: &[RawVariant]) -> String {
    let mut sizes: Vec<&str> = Vec::new();
    for label in variants.iter().filter_map(RawVariant::size_label) {
        if !sizes.contains(&label) {
            sizes.push(label);
        }
    }
    sizes.join(", ")
}

/// Visible text of an HTML fragment, whitespace-separated.
#[must_use]
pub fn strip_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_start = true;
    for ch in word.chars() {
        if ch.is_alphabetic() {
            if at_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_start = false;
        } else {
            out.push(ch);
            at_start = true;
        }
    }
    out
}

fn non_empty(text: String) -> Value {
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text)
    }
}
