//! Schema normalization before bulk writes.
//!
//! Bulk inserts must be homogeneous: every row in one request carries the
//! same set of keys. Missing keys are filled with an explicit `null`.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::sync::core::record::{Record, Row};

/// Union of all keys present in `rows`.
#[must_use]
pub fn key_union(rows: &[Row]) -> BTreeSet<String> {
    rows.iter().flat_map(|row| row.keys().cloned()).collect()
}

/// Pad every row so all rows share the same keys.
#[must_use]
pub fn normalize_rows(rows: Vec<Row>) -> Vec<Row> {
    let keys = key_union(&rows);
    rows.into_iter()
        .map(|mut row| {
            for key in &keys {
                if !row.contains_key(key) {
                    row.insert(key.clone(), Value::Null);
                }
            }
            row
        })
        .collect()
}

/// Flatten records and normalize the resulting batch.
#[must_use]
pub fn normalize_records(records: &[Record]) -> Vec<Row> {
    normalize_rows(records.iter().map(Record::to_row).collect())
}
