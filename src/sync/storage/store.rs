//! Store abstraction the reconciliation engine writes through.

use crate::sync::core::errors::SyncResult;
use crate::sync::core::record::Row;

/// Which write tier a request belongs to; stores pick timeouts from it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestTier {
    /// Coarse batch write.
    Batch,
    /// Single-record retry after a batch failure.
    Single,
}

/// Store acknowledgement for an accepted insert request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InsertAck {
    /// Rows actually created. Rows whose id already existed are not counted.
    pub created: usize,
}

/// Primitives a catalog store must offer.
///
/// Implementations do not retry; retry strategy belongs to the engine.
pub trait CatalogStore: Send + Sync {
    /// Insert rows, ignoring any row whose id already exists.
    ///
    /// Existing rows must never be modified.
    ///
    /// # Errors
    /// Returns an error if the store refuses the request or cannot be reached.
    fn insert_rows(&self, rows: &[Row], tier: RequestTier) -> SyncResult<InsertAck>;

    /// One page of ids stored for `source`, in a stable order.
    ///
    /// # Errors
    /// Returns an error if the listing request fails.
    fn fetch_ids_page(&self, source: &str, offset: usize, limit: usize)
    -> SyncResult<Vec<String>>;

    /// Delete rows matching `source` whose id is in `ids`.
    ///
    /// # Errors
    /// Returns an error if the store refuses the request or cannot be reached.
    fn delete_ids(&self, source: &str, ids: &[String]) -> SyncResult<()>;

    /// Every id stored for `source`, paging until a short page.
    ///
    /// `page_size` must not exceed the store's per-response row cap; a capped
    /// page looks short and ends the listing early.
    ///
    /// # Errors
    /// Returns the first page error; a partial listing is never returned.
    fn fetch_ids_by_source(&self, source: &str, page_size: usize) -> SyncResult<Vec<String>> {
        let page_size = page_size.max(1);
        let mut ids = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_ids_page(source, offset, page_size)?;
            let len = page.len();
            ids.extend(page);
            tracing::debug!("listed {len} ids for {source} at offset {offset}");
            if len < page_size {
                break;
            }
            offset += page_size;
        }

        Ok(ids)
    }
}
