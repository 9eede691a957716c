//! In-memory store used by engine and pipeline tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use serde_json::Value;

use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::record::Row;
use crate::sync::storage::store::{CatalogStore, InsertAck, RequestTier};

/// Request counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallLog {
    pub batch_inserts: usize,
    pub single_inserts: usize,
    pub list_pages: usize,
    pub deletes: usize,
}

impl CallLog {
    pub const fn writes(&self) -> usize {
        self.batch_inserts + self.single_inserts + self.deletes
    }
}

#[derive(Default)]
struct State {
    rows: BTreeMap<String, Row>,
    required: Vec<String>,
    down: bool,
    list_failure_page: Option<usize>,
    rejected_delete_requests: HashSet<usize>,
    calls: CallLog,
}

/// Insert-ignore store keyed by id, with switchable failure modes.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any insert request containing a row without `field`.
    pub fn require_field(&self, field: &str) {
        self.lock().required.push(field.to_string());
    }

    /// Every request fails at the transport level.
    pub fn go_down(&self) {
        self.lock().down = true;
    }

    pub fn fail_listing_from_page(&self, page: usize) {
        self.lock().list_failure_page = Some(page);
    }

    /// Reject the n-th delete request (0-based).
    pub fn reject_delete_request(&self, index: usize) {
        self.lock().rejected_delete_requests.insert(index);
    }

    pub fn seed_ids<I, S>(&self, source: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let mut row = Row::new();
            row.insert("id".to_string(), Value::String(id.into()));
            row.insert("source".to_string(), Value::String(source.to_string()));
            self.seed_row(row);
        }
    }

    pub fn seed_row(&self, row: Row) {
        if let Some(id) = row.get("id").and_then(Value::as_str) {
            let id = id.to_string();
            self.lock().rows.insert(id, row);
        }
    }

    pub fn row(&self, id: &str) -> Option<Row> {
        self.lock().rows.get(id).cloned()
    }

    pub fn ids_for(&self, source: &str) -> BTreeSet<String> {
        self.lock()
            .rows
            .values()
            .filter(|row| row.get("source").and_then(Value::as_str) == Some(source))
            .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    pub fn calls(&self) -> CallLog {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn source_of(row: &Row) -> Option<&str> {
    row.get("source").and_then(Value::as_str)
}

impl CatalogStore for MemoryStore {
    fn insert_rows(&self, rows: &[Row], tier: RequestTier) -> SyncResult<InsertAck> {
        let mut state = self.lock();
        match tier {
            RequestTier::Batch => state.calls.batch_inserts += 1,
            RequestTier::Single => state.calls.single_inserts += 1,
        }
        if state.down {
            return Err(SyncError::Unavailable("connection refused".to_string()));
        }

        let shapes: BTreeSet<usize> = rows.iter().map(|row| row.len()).collect();
        if shapes.len() > 1 {
            return Err(SyncError::rejected(400, "All object keys must match", 200));
        }
        for row in rows {
            for field in &state.required {
                if row.get(field).is_none_or(Value::is_null) {
                    return Err(SyncError::rejected(
                        400,
                        &format!("null value in column \"{field}\""),
                        200,
                    ));
                }
            }
        }

        let mut created = 0;
        for row in rows {
            let Some(id) = row.get("id").and_then(Value::as_str) else {
                continue;
            };
            if !state.rows.contains_key(id) {
                state.rows.insert(id.to_string(), row.clone());
                created += 1;
            }
        }
        Ok(InsertAck { created })
    }

    fn fetch_ids_page(
        &self,
        source: &str,
        offset: usize,
        limit: usize,
    ) -> SyncResult<Vec<String>> {
        let mut state = self.lock();
        let page_index = state.calls.list_pages;
        state.calls.list_pages += 1;
        if state.down {
            return Err(SyncError::Unavailable("connection refused".to_string()));
        }
        if state.list_failure_page.is_some_and(|page| page_index >= page) {
            return Err(SyncError::rejected(500, "listing failed", 200));
        }

        Ok(state
            .rows
            .values()
            .filter(|row| source_of(row) == Some(source))
            .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_string))
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn delete_ids(&self, source: &str, ids: &[String]) -> SyncResult<()> {
        let mut state = self.lock();
        let request_index = state.calls.deletes;
        state.calls.deletes += 1;
        if state.down {
            return Err(SyncError::Unavailable("connection refused".to_string()));
        }
        if state.rejected_delete_requests.contains(&request_index) {
            return Err(SyncError::rejected(500, "delete failed", 200));
        }

        let doomed: HashSet<&String> = ids.iter().collect();
        state
            .rows
            .retain(|id, row| !(doomed.contains(id) && source_of(row) == Some(source)));
        Ok(())
    }
}
