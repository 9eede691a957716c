//! Reconciliation engine and its batching strategy.

pub mod policy;
pub mod reconcile;

pub use policy::{BatchPolicy, FallbackPolicy, OutageBreaker};
pub use reconcile::{DeleteOutcome, InsertOutcome, Reconciler, stale_ids};
