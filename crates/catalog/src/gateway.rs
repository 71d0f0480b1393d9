//! Catalog gateway seam
//!
//! The reconciliation engine only talks to storage through this trait, so a
//! relational backend can replace the bundled sled one. Every file query and
//! deletion is scoped to one scan root.

use crate::error::Result;
use ahash::AHashSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelf_core::{ArtifactCache, DirectoryNode, FileEntry, FileHash, PathHash};
use std::path::{Path, PathBuf};

/// A registered library root and its last reconciled tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRoot {
    pub id: u64,
    /// Last time the tree was written, Unix milliseconds
    pub timestamp_ms: u64,
    pub path: PathBuf,
    /// Serialized `DirectoryNode`; `None` until the first reconciliation ends
    pub directories: Option<String>,
}

impl ScanRoot {
    /// Decode the stored tree
    pub fn tree(&self) -> Result<Option<DirectoryNode>> {
        match &self.directories {
            Some(json) => Ok(Some(DirectoryNode::from_json(json)?)),
            None => Ok(None),
        }
    }
}

/// A persisted file row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub scan_root_id: u64,
    pub entry: FileEntry,
}

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn get_scan_root_by_path(&self, path: &Path) -> Result<Option<ScanRoot>>;

    async fn get_scan_roots(&self) -> Result<Vec<ScanRoot>>;

    /// Register `path` with no tree yet
    async fn insert_scan_root(&self, path: &Path) -> Result<ScanRoot>;

    /// Overwrite the stored tree and bump the timestamp
    async fn update_scan_root_tree(&self, root_id: u64, tree: &DirectoryNode) -> Result<()>;

    async fn get_file_hashes(&self, root_id: u64) -> Result<AHashSet<FileHash>>;

    async fn get_files(&self, root_id: u64) -> Result<Vec<CatalogEntry>>;

    /// Delete rows of `root_id` whose parent directory is not in `live`
    async fn delete_files_by_parent_hash_not_in(
        &self,
        root_id: u64,
        live: &AHashSet<PathHash>,
    ) -> Result<usize>;

    /// Delete rows of `root_id` whose file hash is in `hashes`
    async fn delete_files_by_hash(&self, root_id: u64, hashes: &[FileHash]) -> Result<usize>;

    async fn insert_file(&self, entry: &FileEntry, root_id: u64) -> Result<CatalogEntry>;

    /// Special entries of `root_id` whose download artifact is not on disk
    async fn get_special_entries_missing_cache_artifact(
        &self,
        root_id: u64,
        cache: &ArtifactCache,
    ) -> Result<Vec<CatalogEntry>>;

    async fn update_file_size(&self, root_id: u64, id: u64, size: &str) -> Result<()>;

    async fn count_files(&self, root_id: u64) -> Result<usize>;
}
