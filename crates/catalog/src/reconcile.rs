//! Scan-and-reconcile: diff a fresh scan against the catalog
//!
//! One reconciliation of a root runs these steps in order:
//! 1. maintenance: re-size special entries whose artifact went missing
//! 2. scan (a failure here leaves the catalog untouched)
//! 3. delete rows whose parent directory no longer exists
//! 4. delete rows whose file hash was not seen by the scan
//! 5. insert newly seen entries (enriched, special ones sized)
//! 6. persist the fresh tree on the scan root
//!
//! Any catalog error stops the run before the tree is written, so the next
//! run repeats the diff against the old tree.

use crate::enrich::{MetadataEnricher, NoopEnricher};
use crate::error::ReconcileError;
use crate::gateway::{CatalogGateway, ScanRoot};
use ahash::AHashSet;
use serde::Serialize;
use shelf_core::hash::strip_trailing_separator;
use shelf_core::{ArtifactCache, FileEntry, FileHash, TreeScanner};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub scan_root_id: u64,
    /// The root was unknown and got registered by this run
    pub created_root: bool,
    /// Rows removed because their directory disappeared
    pub removed_by_parent: usize,
    /// Rows removed because the file itself disappeared
    pub removed_by_hash: usize,
    pub inserted: usize,
    /// Special entries re-sized by the maintenance pass
    pub resized: usize,
}

impl ReconcileReport {
    /// Nothing was added or removed
    pub fn is_noop(&self) -> bool {
        !self.created_root
            && self.removed_by_parent == 0
            && self.removed_by_hash == 0
            && self.inserted == 0
    }
}

/// Keeps the catalog of each root in sync with the filesystem
pub struct ReconciliationEngine {
    scanner: Arc<TreeScanner>,
    gateway: Arc<dyn CatalogGateway>,
    enricher: Arc<dyn MetadataEnricher>,
    artifacts: ArtifactCache,
}

impl ReconciliationEngine {
    pub fn new(
        scanner: Arc<TreeScanner>,
        gateway: Arc<dyn CatalogGateway>,
        artifacts: ArtifactCache,
    ) -> Self {
        Self {
            scanner,
            gateway,
            enricher: Arc::new(NoopEnricher),
            artifacts,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn MetadataEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn CatalogGateway> {
        &self.gateway
    }

    pub fn scanner(&self) -> &TreeScanner {
        &self.scanner
    }

    /// Bring the catalog of `root` in line with what is on disk
    pub async fn reconcile(&self, root: &Path) -> Result<ReconcileReport, ReconcileError> {
        let root = strip_trailing_separator(root);
        let mut report = ReconcileReport::default();

        let existing = self.gateway.get_scan_root_by_path(&root).await?;
        if let Some(scan_root) = &existing {
            report.resized = self.resize_missing(scan_root).await;
        }

        let outcome = self.scanner.scan(&root).await?;

        let scan_root = match existing {
            Some(scan_root) => scan_root,
            None => {
                report.created_root = true;
                info!("New scan root: {}", root.display());
                self.gateway.insert_scan_root(&root).await?
            }
        };
        let root_id = scan_root.id;
        report.scan_root_id = root_id;

        let live_dirs = outcome.tree.hash_set();
        report.removed_by_parent = self
            .gateway
            .delete_files_by_parent_hash_not_in(root_id, &live_dirs)
            .await?;

        let fresh: AHashSet<FileHash> = outcome.files.iter().map(|f| f.file_hash).collect();
        let stored = self.gateway.get_file_hashes(root_id).await?;
        let stale: Vec<FileHash> = stored.difference(&fresh).copied().collect();
        report.removed_by_hash = self.gateway.delete_files_by_hash(root_id, &stale).await?;

        let present = self.gateway.get_file_hashes(root_id).await?;
        for entry in outcome.files {
            if present.contains(&entry.file_hash) {
                continue;
            }
            let entry = self.prepare(entry).await;
            self.gateway.insert_file(&entry, root_id).await?;
            report.inserted += 1;
        }

        self.gateway.update_scan_root_tree(root_id, &outcome.tree).await?;

        info!(
            "Reconciled {}: +{} -{} ({} orphaned), {} resized",
            root.display(),
            report.inserted,
            report.removed_by_parent + report.removed_by_hash,
            report.removed_by_parent,
            report.resized
        );
        Ok(report)
    }

    /// Re-size special entries of a known root whose artifact is missing
    ///
    /// Returns the number of entries updated; an unknown root is a no-op.
    pub async fn maintain(&self, root: &Path) -> Result<usize, ReconcileError> {
        let root = strip_trailing_separator(root);
        match self.gateway.get_scan_root_by_path(&root).await? {
            Some(scan_root) => {
                let missing = self
                    .gateway
                    .get_special_entries_missing_cache_artifact(scan_root.id, &self.artifacts)
                    .await?;
                let mut resized = 0;
                for row in missing {
                    let size = self
                        .artifacts
                        .size_of(&row.entry.path(), &row.entry.cover_id)
                        .await
                        .map_err(ReconcileError::Scan)?;
                    self.gateway
                        .update_file_size(scan_root.id, row.id, &size)
                        .await?;
                    resized += 1;
                }
                Ok(resized)
            }
            None => {
                debug!("Nothing to maintain for unknown root {}", root.display());
                Ok(0)
            }
        }
    }

    /// Best-effort maintenance run before a scan; failures are only logged
    async fn resize_missing(&self, scan_root: &ScanRoot) -> usize {
        let missing = match self
            .gateway
            .get_special_entries_missing_cache_artifact(scan_root.id, &self.artifacts)
            .await
        {
            Ok(missing) => missing,
            Err(e) => {
                warn!("Artifact maintenance skipped for {}: {}", scan_root.path.display(), e);
                return 0;
            }
        };

        let mut resized = 0;
        for row in missing {
            let path = row.entry.path();
            let size = match self.artifacts.size_of(&path, &row.entry.cover_id).await {
                Ok(size) => size,
                Err(e) => {
                    warn!("Could not rebuild artifact for {}: {}", path.display(), e);
                    continue;
                }
            };
            match self.gateway.update_file_size(scan_root.id, row.id, &size).await {
                Ok(()) => resized += 1,
                Err(e) => warn!("Could not update size of {}: {}", path.display(), e),
            }
        }
        resized
    }

    /// Enrich a new entry and size it if it is a folded folder
    async fn prepare(&self, mut entry: FileEntry) -> FileEntry {
        if !entry.custom_details {
            match self.enricher.enrich(&entry).await {
                Ok(metadata) => {
                    entry.local_metadata = metadata.local;
                    entry.web_metadata = metadata.web;
                }
                Err(e) => warn!("Metadata lookup failed for {}: {}", entry.name, e),
            }
        }

        if entry.is_special() {
            match self.artifacts.size_of(&entry.path(), &entry.cover_id).await {
                Ok(size) => entry.size = size,
                Err(e) => warn!(
                    "Leaving {} unsized: {}",
                    entry.path().display(),
                    e
                ),
            }
        }

        entry
    }
}
