//! End-to-end sync run: fetch, build, enrich, reconcile.

use chrono::{SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::catalog::fetch::CatalogSource;
use crate::catalog::transform::ProductTransformer;
use crate::sync::core::errors::{SyncError, SyncResult};
use crate::sync::core::record::{Record, collapse_duplicates};
use crate::sync::embedding::embedder::Embedder;
use crate::sync::embedding::enrich::{EnrichStats, Enricher, mark_absent};
use crate::sync::engine::policy::BatchPolicy;
use crate::sync::engine::reconcile::{DeleteOutcome, InsertOutcome, Reconciler};
use crate::sync::storage::store::CatalogStore;

/// Per-run switches.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Do not compute embeddings.
    pub skip_embeddings: bool,
    /// Only process the first N catalog entries.
    pub limit: Option<usize>,
    /// Compute everything, write nothing.
    pub dry_run: bool,
    /// Remove rows no longer in the catalog after inserting.
    pub delete_stale: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_embeddings: false,
            limit: None,
            dry_run: false,
            delete_stale: true,
        }
    }
}

/// What a run did.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Raw entries fetched.
    pub fetched: usize,
    /// Why the fetch failed, if it did.
    pub fetch_error: Option<String>,
    /// Entries the transformer rejected.
    pub build_failures: usize,
    /// Records dropped because a later record had the same id.
    pub duplicates: usize,
    /// Records in the fresh set.
    pub records: usize,
    /// Enrichment tallies, when enrichment ran.
    pub enrichment: Option<EnrichStats>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Insert results, for live runs.
    pub insert: Option<InsertOutcome>,
    /// Delete results, when stale rows were reconciled.
    pub delete: Option<DeleteOutcome>,
}

impl SyncReport {
    /// Records that were (or in a dry run would have been) written.
    #[must_use]
    pub fn written(&self) -> usize {
        if self.dry_run {
            self.records
        } else {
            self.insert.map_or(0, |outcome| outcome.accepted())
        }
    }

    /// A run succeeds when it produced records and the store took at least one.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.records > 0 && self.written() > 0
    }
}

/// Wires a catalog source, transformer, optional embedder, and store.
pub struct SyncPipeline<'a> {
    source: &'a dyn CatalogSource,
    transformer: &'a ProductTransformer,
    embedder: Option<&'a dyn Embedder>,
    store: Option<&'a dyn CatalogStore>,
    policy: BatchPolicy,
}

impl<'a> SyncPipeline<'a> {
    /// Create a pipeline without embedder or store.
    #[must_use]
    pub fn new(source: &'a dyn CatalogSource, transformer: &'a ProductTransformer) -> Self {
        Self {
            source,
            transformer,
            embedder: None,
            store: None,
            policy: BatchPolicy::default(),
        }
    }

    /// Attach an embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: &'a dyn Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attach the store written by live runs.
    #[must_use]
    pub fn with_store(mut self, store: &'a dyn CatalogStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the batching policy.
    #[must_use]
    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute one run.
    ///
    /// Catalog, record, and store failures are reported in the returned
    /// [`SyncReport`]; only wiring errors are returned as `Err`.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if a live run has no store attached, or if the
    /// transformer tags records with a different source than the catalog's.
    pub fn run(&self, options: &RunOptions) -> SyncResult<SyncReport> {
        let source = self.source.source();
        let record_source = self.transformer.config().source.as_str();
        if record_source != source {
            return Err(SyncError::InvalidConfig(format!(
                "records are tagged '{record_source}' but the catalog source is '{source}'"
            )));
        }

        let store = if options.dry_run {
            None
        } else {
            Some(self.store.ok_or_else(|| {
                SyncError::InvalidConfig("a store is required unless dry_run is set".to_string())
            })?)
        };

        let mut report = SyncReport {
            dry_run: options.dry_run,
            ..SyncReport::default()
        };

        info!("starting sync for {source}");
        let mut raw = match self.source.fetch_all() {
            Ok(raw) => raw,
            Err(err) => {
                error!("catalog fetch failed for {source}: {err}");
                report.fetch_error = Some(err.to_string());
                return Ok(report);
            }
        };
        report.fetched = raw.len();
        if raw.is_empty() {
            error!("no products fetched for {source}; nothing to sync");
            return Ok(report);
        }

        if let Some(limit) = options.limit {
            raw.truncate(limit);
            info!("limited to {limit} products");
        }
        info!("processing {} products", raw.len());

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut records: Vec<Record> = Vec::with_capacity(raw.len());
        for entry in &raw {
            match self.transformer.build(entry) {
                Ok(record) => records.push(record.with("created_at", created_at.as_str())),
                Err(err) => {
                    report.build_failures += 1;
                    warn!("skipping catalog entry: {err}");
                }
            }
        }

        match self.embedder.filter(|_| !options.skip_embeddings) {
            Some(embedder) => {
                let mut enricher = Enricher::new(embedder);
                let total = records.len();
                for (index, record) in records.iter_mut().enumerate() {
                    enricher.enrich(record);
                    tracing::debug!("[{}/{total}] enriched {}", index + 1, record.id);
                }
                report.enrichment = Some(enricher.stats());
            }
            None => records.iter_mut().for_each(mark_absent),
        }

        let (records, duplicates) = collapse_duplicates(records);
        if duplicates > 0 {
            warn!("{duplicates} records shared an id with a later record and were dropped");
        }
        report.duplicates = duplicates;
        report.records = records.len();

        if records.is_empty() {
            error!("no records built for {source}; nothing to sync");
            return Ok(report);
        }

        let Some(store) = store else {
            for record in &records {
                let title: String = record.get_str("title").unwrap_or("").chars().take(50).collect();
                info!("[dry run] would insert {}: {title}", record.id);
            }
            info!("[dry run] would write {} records", records.len());
            return Ok(report);
        };

        let reconciler = Reconciler::new(store, self.policy.clone());
        let insert = reconciler.insert_new_only(&records);
        report.insert = Some(insert);

        if !options.delete_stale {
            info!("stale-row deletion disabled for this run");
        } else if options.limit.is_some() {
            info!("limit set; skipping stale-row deletion since the catalog is partial");
        } else if insert.aborted {
            warn!("store unreachable during insert; skipping stale-row deletion");
        } else {
            let keep = records.iter().map(|record| record.id.as_str());
            report.delete = Some(reconciler.delete_stale(source, keep));
        }

        info!(
            "done: {} records, {} inserted, {} already present, {} failed",
            report.records, insert.inserted, insert.skipped, insert.failed
        );
        Ok(report)
    }
}
