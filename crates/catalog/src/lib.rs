//! Catalog persistence and reconciliation
//!
//! This crate provides:
//! - The `CatalogGateway` seam and its sled implementation
//! - A durable run-lock and work queue (sled trees)
//! - The reconciliation engine that diffs a scan against the catalog
//! - The coordinator that runs reconciliations under the run-lock

pub mod coordinator;
pub mod enrich;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod queue;
pub mod reconcile;
pub mod sled_store;

// Re-exports
pub use coordinator::{RunOutcome, ScanCoordinator, SCANNER_LOCK};
pub use enrich::{Metadata, MetadataEnricher, NoopEnricher};
pub use error::{CatalogError, ReconcileError, Result};
pub use gateway::{CatalogEntry, CatalogGateway, ScanRoot};
pub use lock::{LockState, RunLock, SledRunLock};
pub use queue::{ScanRequest, SledWorkQueue, Trigger, WorkQueue};
pub use reconcile::{ReconcileReport, ReconciliationEngine};
pub use sled_store::SledCatalog;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Open (or create) the shared database under `data_dir`
///
/// The catalog, run-lock and work queue live in separate trees of this one
/// database.
pub fn open_db(data_dir: &Path) -> Result<sled::Db> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| CatalogError::Storage(sled::Error::Io(e)))?;
    Ok(sled::open(data_dir.join("shelf.db"))?)
}

/// Current wall-clock time in Unix milliseconds
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
