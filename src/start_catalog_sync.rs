//! Startup helpers for the catalog sync binary.
//!
//! Loads `.env`, parses arguments, wires the catalog, embedder, and store,
//! and maps the run report to a process exit code.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use crate::catalog::{CatalogConfig, ProductTransformer, ShopifyCatalog};
use crate::sync::core::config::SyncConfig;
use crate::sync::embedding::embedder::HttpEmbedder;
use crate::sync::engine::policy::BatchPolicy;
use crate::sync::pipeline::{RunOptions, SyncPipeline, SyncReport};
use crate::sync::storage::postgrest::PostgrestStore;

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "catalog-sync")]
#[command(version, about = "Sync a storefront catalog into the product store", long_about = None)]
pub struct Args {
    /// Do not compute image or text embeddings
    #[arg(long)]
    pub skip_embeddings: bool,

    /// Only process the first N products (disables stale-row deletion)
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Build and log records without writing to the store
    #[arg(long)]
    pub dry_run: bool,

    /// Records per insert request
    #[arg(long, value_name = "N")]
    pub insert_batch_size: Option<usize>,

    /// Ids per delete request
    #[arg(long, value_name = "N")]
    pub delete_batch_size: Option<usize>,

    /// Keep rows that are no longer in the catalog
    #[arg(long)]
    pub no_delete: bool,
}

impl Args {
    /// Per-run switches.
    #[must_use]
    pub const fn options(&self) -> RunOptions {
        RunOptions {
            skip_embeddings: self.skip_embeddings,
            limit: self.limit,
            dry_run: self.dry_run,
            delete_stale: !self.no_delete,
        }
    }

    /// Apply batch-size overrides on top of `base`.
    #[must_use]
    pub fn policy(&self, base: BatchPolicy) -> BatchPolicy {
        let mut policy = base;
        if let Some(size) = self.insert_batch_size {
            policy = policy.with_insert_batch_size(size);
        }
        if let Some(size) = self.delete_batch_size {
            policy = policy.with_delete_batch_size(size);
        }
        policy
    }
}

/// Run one sync (used by the `catalog-sync` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` when records were produced and written, `1` otherwise.
#[must_use]
pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting catalog sync v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    match execute(&args) {
        Ok(report) => exit_code(&report),
        Err(e) => {
            tracing::error!("Sync failed: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Wire the components from the environment and execute one run.
///
/// # Errors
/// Returns an error if configuration is invalid or a client cannot be built.
pub fn execute(args: &Args) -> anyhow::Result<SyncReport> {
    let mut config = SyncConfig::from_env();
    config.policy = args.policy(config.policy);
    config.validate().context("invalid sync configuration")?;

    let catalog_config = CatalogConfig::default();
    let transformer =
        ProductTransformer::new(catalog_config.clone()).context("invalid catalog configuration")?;
    let catalog = ShopifyCatalog::new(catalog_config).context("failed to create catalog client")?;

    let embedder = if args.skip_embeddings {
        tracing::info!("Embeddings disabled");
        None
    } else {
        Some(HttpEmbedder::new(config.embedding.clone()).context("failed to create embedder")?)
    };

    let store = if args.dry_run {
        tracing::info!("Dry run: no changes will be written");
        None
    } else {
        tracing::info!("Store: {} (table {})", config.store.base_url, config.store.table);
        Some(PostgrestStore::new(config.store.clone()).context("failed to create store client")?)
    };

    let mut pipeline = SyncPipeline::new(&catalog, &transformer).with_policy(config.policy);
    if let Some(embedder) = &embedder {
        pipeline = pipeline.with_embedder(embedder);
    }
    if let Some(store) = &store {
        pipeline = pipeline.with_store(store);
    }

    let report = pipeline.run(&args.options())?;
    log_summary(&report);
    Ok(report)
}

/// Map a run report to the process exit code.
#[must_use]
pub fn exit_code(report: &SyncReport) -> ExitCode {
    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn log_summary(report: &SyncReport) {
    tracing::info!(
        "Fetched {} products, {} records ({} invalid, {} duplicate ids)",
        report.fetched,
        report.records,
        report.build_failures,
        report.duplicates
    );
    if let Some(stats) = report.enrichment {
        tracing::info!(
            "Embeddings: {} image, {} info, {} without image",
            stats.image_vectors,
            stats.info_vectors,
            stats.without_image
        );
    }
    if let Some(insert) = report.insert {
        tracing::info!(
            "Inserted {} new, {} already present, {} failed{}",
            insert.inserted,
            insert.skipped,
            insert.failed,
            if insert.aborted { " (aborted)" } else { "" }
        );
    }
    if let Some(delete) = report.delete {
        tracing::info!("Deleted {} stale rows ({} errors)", delete.deleted, delete.errors);
    }
}
