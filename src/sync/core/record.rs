//! Normalized catalog record, the unit of reconciliation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A flat JSON object as sent to the store.
pub type Row = Map<String, Value>;

/// Attribute keys owned by the record itself.
const RESERVED_KEYS: [&str; 2] = ["id", "source"];

/// A normalized record ready for enrichment and reconciliation.
///
/// Only `id` and `source` take part in reconciliation; attributes are opaque.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Natural key, unique per source.
    pub id: String,
    /// Catalog the record came from.
    pub source: String,
    /// Remaining attributes, ordered by name.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    /// Create a record whose id is derived as `{source}_{native_id}`.
    #[must_use]
    pub fn new(source: impl Into<String>, native_id: &str) -> Self {
        let source = source.into();
        Self {
            id: record_id(&source, native_id),
            source,
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute, builder style.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an attribute. Writes to `id` or `source` are ignored.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        if RESERVED_KEYS.contains(&key) {
            tracing::debug!("ignoring write to reserved key {key} on {}", self.id);
            return;
        }
        self.attributes.insert(key.to_string(), value.into());
    }

    /// Attribute value, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute as a non-empty string, if it is one.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }

    /// Flatten into the row shape the store expects.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        row.insert("id".to_string(), Value::String(self.id.clone()));
        row.insert("source".to_string(), Value::String(self.source.clone()));
        row
    }
}

/// Deterministic record id for a native catalog identifier.
#[must_use]
pub fn record_id(source: &str, native_id: &str) -> String {
    format!("{source}_{native_id}")
}

/// Collapse records sharing an id.
///
/// The last occurrence wins and takes the slot of the first occurrence, so
/// output order stays stable. Returns the collapsed set and how many
/// duplicates were dropped.
#[must_use]
pub fn collapse_duplicates(records: Vec<Record>) -> (Vec<Record>, usize) {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<Record> = Vec::with_capacity(records.len());
    let mut dropped = 0;

    for record in records {
        if let Some(&slot) = slots.get(&record.id) {
            unique[slot] = record;
            dropped += 1;
        } else {
            slots.insert(record.id.clone(), unique.len());
            unique.push(record);
        }
    }

    (unique, dropped)
}
