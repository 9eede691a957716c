//! Catalog reconciliation: insert-new-only and delete-stale.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, error, info, warn};

use crate::sync::core::record::Record;
use crate::sync::engine::policy::{BatchPolicy, FallbackPolicy, OutageBreaker};
use crate::sync::storage::normalize::normalize_records;
use crate::sync::storage::store::{CatalogStore, RequestTier};

/// Result of [`Reconciler::insert_new_only`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InsertOutcome {
    /// Rows newly created in the store.
    pub inserted: usize,
    /// Records accepted but already present; their rows were left unchanged.
    pub skipped: usize,
    /// Records the store refused or never received.
    pub failed: usize,
    /// The store stopped answering and the remaining records were not sent.
    pub aborted: bool,
}

impl InsertOutcome {
    /// Records the store accepted, new or already present.
    #[must_use]
    pub const fn accepted(&self) -> usize {
        self.inserted + self.skipped
    }
}

/// Result of [`Reconciler::delete_stale`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeleteOutcome {
    /// Stale rows removed.
    pub deleted: usize,
    /// Failed delete requests, or 1 when the existing ids could not be listed.
    pub errors: usize,
    /// The operation stopped before finishing.
    pub aborted: bool,
}

/// Makes the store's rows for one source match a fresh record set.
///
/// Batches run sequentially and each committed batch is final. Callers must
/// ensure no other writer touches the same source during a run.
pub struct Reconciler<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    policy: BatchPolicy,
}

impl<'a, S: CatalogStore + ?Sized> Reconciler<'a, S> {
    /// Create a reconciler over `store`.
    #[must_use]
    pub const fn new(store: &'a S, policy: BatchPolicy) -> Self {
        Self { store, policy }
    }

    /// Active batching policy.
    #[must_use]
    pub const fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    /// Insert records whose id is absent from the store; never modify present rows.
    ///
    /// A refused batch falls back to single-record submissions when the policy
    /// allows it, so one bad record only fails itself. Per-record failures are
    /// counted, never raised.
    pub fn insert_new_only(&self, records: &[Record]) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        if records.is_empty() {
            return outcome;
        }

        let batch_size = self.policy.insert_batch_size.max(1);
        let total_batches = records.len().div_ceil(batch_size);
        let mut breaker = self.policy.breaker();

        for (index, chunk) in records.chunks(batch_size).enumerate() {
            if breaker.tripped() {
                let unsent = records.len() - index * batch_size;
                error!(
                    "store unreachable after repeated transport failures; {unsent} records not sent"
                );
                outcome.failed += unsent;
                outcome.aborted = true;
                break;
            }

            let rows = normalize_records(chunk);
            let result = self.store.insert_rows(&rows, RequestTier::Batch);
            breaker.observe(&result);

            match result {
                Ok(ack) => {
                    let created = ack.created.min(chunk.len());
                    outcome.inserted += created;
                    outcome.skipped += chunk.len() - created;
                    debug!(
                        "insert batch {}/{total_batches}: {created} new, {} existing",
                        index + 1,
                        chunk.len() - created
                    );
                }
                Err(err) => {
                    error!("insert batch {}/{total_batches} failed: {err}", index + 1);
                    match self.policy.fallback {
                        FallbackPolicy::SingleItem => {
                            self.insert_singly(chunk, &mut breaker, &mut outcome);
                        }
                        FallbackPolicy::None => outcome.failed += chunk.len(),
                    }
                }
            }
        }

        info!(
            "insert-new-only: {} inserted, {} already present, {} failed",
            outcome.inserted, outcome.skipped, outcome.failed
        );
        outcome
    }

    /// Second tier: resubmit each record of a failed batch on its own.
    fn insert_singly(
        &self,
        chunk: &[Record],
        breaker: &mut OutageBreaker,
        outcome: &mut InsertOutcome,
    ) {
        for (position, record) in chunk.iter().enumerate() {
            if breaker.tripped() {
                error!(
                    "store unreachable during single inserts; {} records not sent",
                    chunk.len() - position
                );
                outcome.failed += chunk.len() - position;
                outcome.aborted = true;
                return;
            }

            let row = record.to_row();
            let result = self
                .store
                .insert_rows(std::slice::from_ref(&row), RequestTier::Single);
            breaker.observe(&result);

            match result {
                Ok(ack) if ack.created > 0 => outcome.inserted += 1,
                Ok(_) => outcome.skipped += 1,
                Err(err) => {
                    outcome.failed += 1;
                    error!("single insert of {} failed: {err}", record.id);
                }
            }
        }
    }

    /// Delete rows of `source` whose id is not in `keep_ids`.
    ///
    /// An empty `keep_ids` is refused: it almost always means the upstream
    /// fetch produced nothing, and honoring it would wipe the whole source.
    /// If the existing ids cannot be listed in full, nothing is deleted.
    pub fn delete_stale<I>(&self, source: &str, keep_ids: I) -> DeleteOutcome
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keep: HashSet<String> = keep_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .collect();

        if keep.is_empty() {
            warn!("no ids to keep for {source}; skipping delete to avoid wiping the source");
            return DeleteOutcome::default();
        }

        let existing = match self
            .store
            .fetch_ids_by_source(source, self.policy.id_page_size)
        {
            Ok(ids) => ids,
            Err(err) => {
                error!("failed to list existing ids for {source}: {err}");
                return DeleteOutcome {
                    deleted: 0,
                    errors: 1,
                    aborted: true,
                };
            }
        };

        let stale = stale_ids(existing, &keep);
        if stale.is_empty() {
            info!("no stale rows for {source}");
            return DeleteOutcome::default();
        }

        info!(
            "deleting {} stale rows for {source} (not in current catalog)",
            stale.len()
        );

        let mut outcome = DeleteOutcome::default();
        let mut breaker = self.policy.breaker();
        let batch_size = self.policy.delete_batch_size.max(1);

        for batch in stale.chunks(batch_size) {
            if breaker.tripped() {
                error!("store unreachable; leaving remaining stale rows for {source}");
                outcome.errors += 1;
                outcome.aborted = true;
                break;
            }

            let result = self.store.delete_ids(source, batch);
            breaker.observe(&result);
            match result {
                Ok(()) => outcome.deleted += batch.len(),
                Err(err) => {
                    outcome.errors += 1;
                    error!("delete batch of {} failed: {err}", batch.len());
                }
            }
        }

        info!(
            "delete-stale for {source}: {} deleted, {} errors",
            outcome.deleted, outcome.errors
        );
        outcome
    }
}

/// `existing - keep`, sorted and deduplicated.
#[must_use]
pub fn stale_ids(existing: Vec<String>, keep: &HashSet<String>) -> Vec<String> {
    existing
        .into_iter()
        .filter(|id| !keep.contains(id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::sync::storage::memory_store::MemoryStore;

    fn records(source: &str, ids: &[&str]) -> Vec<Record> {
        ids.iter()
            .map(|id| Record::new(source, id).with("title", format!("Product {id}")))
            .collect()
    }

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_insert_empty_input_issues_no_request() {
        let store = MemoryStore::new();
        let outcome = Reconciler::new(&store, BatchPolicy::default()).insert_new_only(&[]);
        assert_eq!(outcome, InsertOutcome::default());
        assert_eq!(store.calls().writes(), 0);
    }

    #[test]
    fn test_insert_is_idempotent() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store, BatchPolicy::default());
        let fresh = records("s", &["a", "b", "c"]);

        let first = reconciler.insert_new_only(&fresh);
        assert_eq!((first.inserted, first.skipped, first.failed), (3, 0, 0));

        let second = reconciler.insert_new_only(&fresh);
        assert_eq!((second.inserted, second.skipped, second.failed), (0, 3, 0));
        assert_eq!(store.ids_for("s"), ids(&["s_a", "s_b", "s_c"]));
    }

    #[test]
    fn test_insert_never_overwrites_existing_row() {
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(&store, BatchPolicy::default());
        reconciler.insert_new_only(&[Record::new("s", "x").with("f", 1)]);

        let outcome = reconciler.insert_new_only(&[Record::new("s", "x").with("f", 2)]);

        assert_eq!(outcome.inserted, 0);
        assert_eq!(store.row("s_x").unwrap()["f"], Value::from(1));
    }

    #[test]
    fn test_batch_isolation_retries_singly() {
        let store = MemoryStore::new();
        store.require_field("title");
        let mut fresh: Vec<Record> = (0..100)
            .map(|i| Record::new("s", &i.to_string()).with("title", "Tee"))
            .collect();
        fresh[42] = Record::new("s", "42");

        let outcome = Reconciler::new(&store, BatchPolicy::default()).insert_new_only(&fresh);

        assert_eq!(outcome.inserted, 99);
        assert_eq!(outcome.failed, 1);
        assert!(!outcome.aborted);
        assert!(store.row("s_42").is_none());
        let calls = store.calls();
        assert_eq!(calls.batch_inserts, 1);
        assert_eq!(calls.single_inserts, 100);
    }

    #[test]
    fn test_only_failed_batch_is_retried() {
        let store = MemoryStore::new();
        store.require_field("title");
        let mut fresh = records("s", &["a", "b", "c", "d", "e"]);
        fresh[3] = Record::new("s", "d");
        let policy = BatchPolicy::default().with_insert_batch_size(2);

        let outcome = Reconciler::new(&store, policy).insert_new_only(&fresh);

        assert_eq!((outcome.inserted, outcome.failed), (4, 1));
        let calls = store.calls();
        assert_eq!(calls.batch_inserts, 3);
        assert_eq!(calls.single_inserts, 2);
    }

    #[test]
    fn test_no_fallback_fails_whole_batch() {
        let store = MemoryStore::new();
        store.require_field("title");
        let mut fresh = records("s", &["a", "b", "c"]);
        fresh[0] = Record::new("s", "a");
        let policy = BatchPolicy::default().with_fallback(FallbackPolicy::None);

        let outcome = Reconciler::new(&store, policy).insert_new_only(&fresh);

        assert_eq!((outcome.inserted, outcome.failed), (0, 3));
        assert_eq!(store.calls().single_inserts, 0);
    }

    #[test]
    fn test_heterogeneous_batch_is_normalized() {
        let store = MemoryStore::new();
        let fresh = vec![
            Record::new("s", "a").with("title", "A"),
            Record::new("s", "b").with("title", "B").with("sale", "Sale: 1.00CAD"),
        ];

        let outcome = Reconciler::new(&store, BatchPolicy::default()).insert_new_only(&fresh);

        assert_eq!(outcome.inserted, 2);
        assert_eq!(store.calls().single_inserts, 0);
        assert_eq!(store.row("s_a").unwrap()["sale"], Value::Null);
    }

    #[test]
    fn test_unreachable_store_aborts_insert() {
        let store = MemoryStore::new();
        store.go_down();
        let fresh = records("s", &["a", "b", "c", "d", "e", "f"]);
        let policy = BatchPolicy::default()
            .with_insert_batch_size(2)
            .with_max_consecutive_transport_failures(2);

        let outcome = Reconciler::new(&store, policy).insert_new_only(&fresh);

        assert!(outcome.aborted);
        assert_eq!(outcome.failed, 6);
        assert_eq!(outcome.inserted, 0);
        let calls = store.calls();
        assert_eq!(calls.batch_inserts, 1);
        assert_eq!(calls.single_inserts, 1);
    }

    #[test]
    fn test_outage_in_last_batch_fallback_marks_aborted() {
        let store = MemoryStore::new();
        store.go_down();
        let fresh = records("s", &["a", "b"]);
        let policy = BatchPolicy::default()
            .with_insert_batch_size(2)
            .with_max_consecutive_transport_failures(2);

        let outcome = Reconciler::new(&store, policy).insert_new_only(&fresh);

        assert!(outcome.aborted);
        assert_eq!(outcome.failed, 2);
        let calls = store.calls();
        assert_eq!(calls.batch_inserts, 1);
        assert_eq!(calls.single_inserts, 1);
    }

    #[test]
    fn test_delete_empty_keep_set_is_noop() {
        let store = MemoryStore::new();
        store.seed_ids("s", ["s_a", "s_b"]);

        let outcome =
            Reconciler::new(&store, BatchPolicy::default()).delete_stale("s", Vec::<String>::new());

        assert_eq!((outcome.deleted, outcome.errors), (0, 0));
        assert_eq!(store.calls().deletes, 0);
        assert_eq!(store.calls().list_pages, 0);
        assert_eq!(store.ids_for("s").len(), 2);
    }

    #[test]
    fn test_delete_removes_exactly_stale_ids() {
        let store = MemoryStore::new();
        store.seed_ids("s", ["s_1", "s_2", "s_3", "s_4"]);

        let outcome =
            Reconciler::new(&store, BatchPolicy::default()).delete_stale("s", ["s_2", "s_4", "s_9"]);

        assert_eq!((outcome.deleted, outcome.errors), (2, 0));
        assert_eq!(store.ids_for("s"), ids(&["s_2", "s_4"]));
    }

    #[test]
    fn test_delete_never_touches_other_sources() {
        let store = MemoryStore::new();
        store.seed_ids("s", ["s_1", "s_2"]);
        store.seed_ids("t", ["t_1", "t_2"]);

        let outcome = Reconciler::new(&store, BatchPolicy::default()).delete_stale("s", ["s_1"]);

        assert_eq!(outcome.deleted, 1);
        assert_eq!(store.ids_for("t"), ids(&["t_1", "t_2"]));
    }

    #[test]
    fn test_delete_nothing_stale_sends_no_delete() {
        let store = MemoryStore::new();
        store.seed_ids("s", ["s_1"]);

        let outcome =
            Reconciler::new(&store, BatchPolicy::default()).delete_stale("s", ["s_1", "s_2"]);

        assert_eq!(outcome, DeleteOutcome::default());
        assert_eq!(store.calls().deletes, 0);
    }

    #[test]
    fn test_delete_aborts_when_listing_fails() {
        let store = MemoryStore::new();
        store.seed_ids("s", (0..5).map(|i| format!("s_{i}")));
        store.fail_listing_from_page(1);
        let policy = BatchPolicy::default().with_id_page_size(2);

        let outcome = Reconciler::new(&store, policy).delete_stale("s", ["s_0"]);

        assert_eq!((outcome.deleted, outcome.errors), (0, 1));
        assert!(outcome.aborted);
        assert_eq!(store.calls().deletes, 0);
        assert_eq!(store.ids_for("s").len(), 5);
    }

    #[test]
    fn test_failed_delete_batch_does_not_stop_others() {
        let store = MemoryStore::new();
        store.seed_ids("s", (0..7).map(|i| format!("s_{i}")));
        store.reject_delete_request(1);
        let policy = BatchPolicy::default().with_delete_batch_size(2);

        let outcome = Reconciler::new(&store, policy).delete_stale("s", ["s_0"]);

        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.deleted, 4);
        assert_eq!(store.calls().deletes, 3);
        assert_eq!(store.ids_for("s"), ids(&["s_0", "s_3", "s_4"]));
    }

    #[test]
    fn test_delete_paginates_large_sources() {
        let store = MemoryStore::new();
        store.seed_ids("s", (0..25).map(|i| format!("s_{i:02}")));
        let policy = BatchPolicy::default().with_id_page_size(10);

        let outcome = Reconciler::new(&store, policy).delete_stale("s", ["s_00"]);

        assert_eq!(outcome.deleted, 24);
        assert_eq!(store.calls().list_pages, 3);
        assert_eq!(store.ids_for("s"), ids(&["s_00"]));
    }

    #[test]
    fn test_sync_scenario_abc_to_bcd() {
        let store = MemoryStore::new();
        store.seed_ids("s", ["s_A", "s_B", "s_C"]);
        let reconciler = Reconciler::new(&store, BatchPolicy::default());
        let fresh = records("s", &["B", "C", "D"]);

        let inserted = reconciler.insert_new_only(&fresh);
        assert_eq!((inserted.inserted, inserted.failed), (1, 0));

        let deleted = reconciler.delete_stale("s", fresh.iter().map(|r| r.id.as_str()));
        assert_eq!((deleted.deleted, deleted.errors), (1, 0));

        assert_eq!(store.ids_for("s"), ids(&["s_B", "s_C", "s_D"]));
    }

    #[test]
    fn test_stale_ids_sorted_set_difference() {
        let keep: HashSet<String> = ["b".to_string()].into_iter().collect();
        let stale = stale_ids(
            vec!["c".to_string(), "a".to_string(), "b".to_string(), "a".to_string()],
            &keep,
        );
        assert_eq!(stale, vec!["a", "c"]);
    }
}
