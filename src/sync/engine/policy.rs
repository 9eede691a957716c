//! Batching and retry strategy for the reconciliation engine.

use serde::{Deserialize, Serialize};

use crate::sync::core::errors::{SyncError, SyncResult};

/// What to do with the records of a batch the store refused.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Resubmit every record of the failed batch on its own.
    #[default]
    SingleItem,
    /// Count the whole batch as failed.
    None,
}

/// Two-tier write strategy: coarse batches, then an optional fine-grained fallback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchPolicy {
    /// Records per insert request.
    pub insert_batch_size: usize,
    /// Ids per delete request.
    pub delete_batch_size: usize,
    /// Ids requested per listing page. A shorter page ends the listing, so
    /// this must not exceed the store's per-response row cap (`PostgREST`
    /// `db-max-rows`, 1000 on hosted Supabase), or stale rows past the cap
    /// are never listed.
    pub id_page_size: usize,
    /// Second tier applied to failed insert batches.
    pub fallback: FallbackPolicy,
    /// Consecutive transport failures after which the store is considered down.
    pub max_consecutive_transport_failures: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            insert_batch_size: 100,
            delete_batch_size: 500,
            id_page_size: 1000,
            fallback: FallbackPolicy::SingleItem,
            max_consecutive_transport_failures: 5,
        }
    }
}

impl BatchPolicy {
    /// Set the insert batch size.
    #[must_use]
    pub const fn with_insert_batch_size(mut self, size: usize) -> Self {
        self.insert_batch_size = size;
        self
    }

    /// Set the delete batch size.
    #[must_use]
    pub const fn with_delete_batch_size(mut self, size: usize) -> Self {
        self.delete_batch_size = size;
        self
    }

    /// Set the id listing page size.
    #[must_use]
    pub const fn with_id_page_size(mut self, size: usize) -> Self {
        self.id_page_size = size;
        self
    }

    /// Set the fallback tier.
    #[must_use]
    pub const fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set the outage threshold.
    #[must_use]
    pub const fn with_max_consecutive_transport_failures(mut self, limit: usize) -> Self {
        self.max_consecutive_transport_failures = limit;
        self
    }

    /// Validate policy invariants.
    ///
    /// # Errors
    /// Returns an error if any size or threshold is zero.
    pub fn validate(&self) -> SyncResult<()> {
        for (name, value) in [
            ("insert_batch_size", self.insert_batch_size),
            ("delete_batch_size", self.delete_batch_size),
            ("id_page_size", self.id_page_size),
            (
                "max_consecutive_transport_failures",
                self.max_consecutive_transport_failures,
            ),
        ] {
            if value == 0 {
                return Err(SyncError::InvalidConfig(format!(
                    "policy.{name} must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Fresh outage detector for one operation.
    #[must_use]
    pub const fn breaker(&self) -> OutageBreaker {
        OutageBreaker::new(self.max_consecutive_transport_failures)
    }
}

/// Counts consecutive transport failures and trips once the limit is reached.
///
/// Any answer from the store, success or rejection, resets the count.
#[derive(Clone, Debug)]
pub struct OutageBreaker {
    limit: usize,
    consecutive: usize,
}

impl OutageBreaker {
    /// Create a breaker tripping after `limit` consecutive transport failures.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    /// Feed the result of one store request.
    pub fn observe<T>(&mut self, result: &SyncResult<T>) {
        match result {
            Err(err) if err.is_transport() => self.consecutive += 1,
            _ => self.consecutive = 0,
        }
    }

    /// Whether the store should be considered unreachable.
    #[must_use]
    pub const fn tripped(&self) -> bool {
        self.limit > 0 && self.consecutive >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BatchPolicy::default();
        assert_eq!(policy.insert_batch_size, 100);
        assert_eq!(policy.delete_batch_size, 500);
        assert_eq!(policy.id_page_size, 1000);
        assert_eq!(policy.fallback, FallbackPolicy::SingleItem);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(BatchPolicy::default().with_insert_batch_size(0).validate().is_err());
        assert!(BatchPolicy::default().with_delete_batch_size(0).validate().is_err());
        assert!(BatchPolicy::default().with_id_page_size(0).validate().is_err());
    }

    #[test]
    fn test_breaker_trips_on_consecutive_transport_failures() {
        let mut breaker = OutageBreaker::new(2);
        let down: SyncResult<()> = Err(SyncError::Unavailable("down".to_string()));
        let refused: SyncResult<()> = Err(SyncError::rejected(400, "bad", 10));

        breaker.observe(&down);
        assert!(!breaker.tripped());
        breaker.observe(&refused);
        breaker.observe(&down);
        assert!(!breaker.tripped());
        breaker.observe(&down);
        assert!(breaker.tripped());
        breaker.observe(&Ok::<(), SyncError>(()));
        assert!(!breaker.tripped());
    }

    #[test]
    fn test_fallback_serde_names() {
        let json = serde_json::to_string(&FallbackPolicy::SingleItem).unwrap();
        assert_eq!(json, "\"single_item\"");
    }
}
