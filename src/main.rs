//! Binary entrypoint that runs one catalog sync.

use std::process::ExitCode;

use catalog_sync::start_catalog_sync;

/// Fetch the catalog, reconcile the store, and report the outcome as the exit code.
fn main() -> ExitCode {
    start_catalog_sync::run()
}
