//! Catalog and reconciliation errors

use shelf_core::ScanError;
use thiserror::Error;

/// Persistence failures from a catalog gateway, run-lock or queue
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("row encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Why a reconciliation stopped
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The scan failed; the catalog was not touched
    #[error("scan failed: {0}")]
    Scan(#[from] ScanError),

    /// A catalog write failed; remaining steps were skipped and the stored
    /// tree was left as it was
    #[error("catalog update failed: {0}")]
    Persistence(#[from] CatalogError),
}
