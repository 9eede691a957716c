//! Raw catalog entries as served by the `products.json` feed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of the products feed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProductsPage {
    /// Products on this page.
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

/// A product listing exactly as the storefront returns it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    /// Native product identifier (number or string depending on the feed).
    #[serde(default)]
    pub id: Value,
    /// URL handle.
    #[serde(default)]
    pub handle: String,
    /// Product title.
    #[serde(default)]
    pub title: String,
    /// HTML description.
    #[serde(default)]
    pub body_html: Option<String>,
    /// Vendor name.
    #[serde(default)]
    pub vendor: Option<String>,
    /// Free-form product type.
    #[serde(default)]
    pub product_type: String,
    /// Tags attached to the product.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    /// Publication timestamp.
    #[serde(default)]
    pub published_at: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Purchasable variants.
    #[serde(default)]
    pub variants: Vec<RawVariant>,
    /// Product images, primary first.
    #[serde(default)]
    pub images: Vec<RawImage>,
}

impl RawProduct {
    /// Native identifier rendered as a string, if present.
    #[must_use]
    pub fn native_id(&self) -> Option<String> {
        match &self.id {
            Value::Number(number) => Some(number.to_string()),
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }

    /// Image sources in feed order, skipping blanks.
    #[must_use]
    pub fn image_sources(&self) -> Vec<&str> {
        self.images
            .iter()
            .filter_map(|image| image.src.as_deref())
            .filter(|src| !src.is_empty())
            .collect()
    }
}

/// A purchasable variant of a product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVariant {
    /// Variant title.
    #[serde(default)]
    pub title: Option<String>,
    /// First option value (usually the size).
    #[serde(default)]
    pub option1: Option<String>,
    /// Price, as a string or number.
    #[serde(default)]
    pub price: Value,
    /// Pre-sale price, as a string or number.
    #[serde(default)]
    pub compare_at_price: Value,
}

impl RawVariant {
    /// Parsed price, if any.
    #[must_use]
    pub fn price_amount(&self) -> Option<f64> {
        parse_amount(&self.price)
    }

    /// Parsed compare-at price, if any.
    #[must_use]
    pub fn compare_at_amount(&self) -> Option<f64> {
        parse_amount(&self.compare_at_price)
    }

    /// Size label for the variant.
    #[must_use]
    pub fn size_label(&self) -> Option<&str> {
        self.option1
            .as_deref()
            .filter(|opt| !opt.is_empty())
            .or_else(|| self.title.as_deref().filter(|title| !title.is_empty()))
    }
}

/// A product image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    /// Image URL.
    #[serde(default)]
    pub src: Option<String>,
}

/// Parse a monetary amount that may be encoded as a string or a number.
fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Tags arrive either as an array or as a comma separated string.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let tags = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    Ok(tags)
}
