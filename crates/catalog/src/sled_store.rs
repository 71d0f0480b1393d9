//! sled-backed catalog
//!
//! Layout:
//! ```text
//! scan_roots: root_id (u64 BE)              -> bincode(ScanRoot)
//! files:      root_id (u64 BE) ++ id (u64 BE) -> bincode(CatalogEntry)
//! ```
//! Prefixing file keys with the root id keeps every per-root query a single
//! prefix scan.

use crate::error::{CatalogError, Result};
use crate::gateway::{CatalogEntry, CatalogGateway, ScanRoot};
use crate::now_ms;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use parking_lot::RwLock;
use shelf_core::{ArtifactCache, DirectoryNode, FileEntry, FileHash, FileKind, PathHash};
use sled::{Batch, Db, Tree};
use std::path::{Path, PathBuf};
use tracing::debug;

const ROOTS_TREE: &str = "scan_roots";
const FILES_TREE: &str = "files";

/// Catalog stored in two sled trees
pub struct SledCatalog {
    db: Db,
    roots: Tree,
    files: Tree,
    /// In-memory index: root path -> root id
    index: RwLock<AHashMap<PathBuf, u64>>,
}

impl SledCatalog {
    /// Open the catalog trees in `db`, building the path index
    pub fn open(db: &Db) -> Result<Self> {
        let roots = db.open_tree(ROOTS_TREE)?;
        let files = db.open_tree(FILES_TREE)?;

        let mut index = AHashMap::new();
        for item in roots.iter() {
            let (_, value) = item?;
            let root: ScanRoot = bincode::deserialize(&value)?;
            index.insert(root.path, root.id);
        }

        Ok(Self {
            db: db.clone(),
            roots,
            files,
            index: RwLock::new(index),
        })
    }

    fn load_root(&self, root_id: u64) -> Result<Option<ScanRoot>> {
        match self.roots.get(root_id.to_be_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Rows of one root with their keys
    fn scan_files(&self, root_id: u64) -> impl Iterator<Item = Result<(sled::IVec, CatalogEntry)>> + '_ {
        self.files.scan_prefix(root_id.to_be_bytes()).map(|item| -> Result<_> {
            let (key, value) = item?;
            let row: CatalogEntry = bincode::deserialize(&value)?;
            Ok((key, row))
        })
    }

    /// Remove every row of `root_id` matching `pred` in one atomic batch
    fn delete_where(&self, root_id: u64, pred: impl Fn(&FileEntry) -> bool) -> Result<usize> {
        let mut batch = Batch::default();
        let mut removed = 0usize;

        for item in self.scan_files(root_id) {
            let (key, row) = item?;
            if pred(&row.entry) {
                debug!("Removing {} from catalog", row.entry.path().display());
                batch.remove(key);
                removed += 1;
            }
        }

        if removed > 0 {
            self.files.apply_batch(batch)?;
        }
        Ok(removed)
    }
}

fn file_key(root_id: u64, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&root_id.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

#[async_trait]
impl CatalogGateway for SledCatalog {
    async fn get_scan_root_by_path(&self, path: &Path) -> Result<Option<ScanRoot>> {
        let id = match self.index.read().get(path) {
            Some(&id) => id,
            None => return Ok(None),
        };
        self.load_root(id)
    }

    async fn get_scan_roots(&self) -> Result<Vec<ScanRoot>> {
        self.roots
            .iter()
            .map(|item| -> Result<ScanRoot> {
                let (_, value) = item?;
                Ok(bincode::deserialize(&value)?)
            })
            .collect()
    }

    async fn insert_scan_root(&self, path: &Path) -> Result<ScanRoot> {
        if self.index.read().contains_key(path) {
            return Err(CatalogError::InvalidEntry(format!(
                "scan root already registered: {}",
                path.display()
            )));
        }

        let root = ScanRoot {
            id: self.db.generate_id()?,
            timestamp_ms: now_ms(),
            path: path.to_path_buf(),
            directories: None,
        };
        self.roots
            .insert(root.id.to_be_bytes(), bincode::serialize(&root)?)?;
        self.index.write().insert(root.path.clone(), root.id);

        debug!("Registered scan root {} ({})", root.path.display(), root.id);
        Ok(root)
    }

    async fn update_scan_root_tree(&self, root_id: u64, tree: &DirectoryNode) -> Result<()> {
        let mut root = self
            .load_root(root_id)?
            .ok_or_else(|| CatalogError::NotFound(format!("scan root {root_id}")))?;
        root.directories = Some(tree.to_json()?);
        root.timestamp_ms = now_ms();

        self.roots
            .insert(root_id.to_be_bytes(), bincode::serialize(&root)?)?;

        // End of a reconciliation: make it durable
        self.db.flush_async().await?;
        Ok(())
    }

    async fn get_file_hashes(&self, root_id: u64) -> Result<AHashSet<FileHash>> {
        self.scan_files(root_id)
            .map(|item| item.map(|(_, row)| row.entry.file_hash))
            .collect()
    }

    async fn get_files(&self, root_id: u64) -> Result<Vec<CatalogEntry>> {
        self.scan_files(root_id)
            .map(|item| item.map(|(_, row)| row))
            .collect()
    }

    async fn delete_files_by_parent_hash_not_in(
        &self,
        root_id: u64,
        live: &AHashSet<PathHash>,
    ) -> Result<usize> {
        self.delete_where(root_id, |entry| !live.contains(&entry.parent_hash))
    }

    async fn delete_files_by_hash(&self, root_id: u64, hashes: &[FileHash]) -> Result<usize> {
        if hashes.is_empty() {
            return Ok(0);
        }
        let doomed: AHashSet<FileHash> = hashes.iter().copied().collect();
        self.delete_where(root_id, |entry| doomed.contains(&entry.file_hash))
    }

    async fn insert_file(&self, entry: &FileEntry, root_id: u64) -> Result<CatalogEntry> {
        if entry.kind == FileKind::None {
            return Err(CatalogError::InvalidEntry(format!(
                "{} has no kind",
                entry.path().display()
            )));
        }
        if !self.roots.contains_key(root_id.to_be_bytes())? {
            return Err(CatalogError::NotFound(format!("scan root {root_id}")));
        }

        let row = CatalogEntry {
            id: self.db.generate_id()?,
            scan_root_id: root_id,
            entry: entry.clone(),
        };
        self.files
            .insert(file_key(root_id, row.id), bincode::serialize(&row)?)?;
        Ok(row)
    }

    async fn get_special_entries_missing_cache_artifact(
        &self,
        root_id: u64,
        cache: &ArtifactCache,
    ) -> Result<Vec<CatalogEntry>> {
        let mut missing = Vec::new();
        for item in self.scan_files(root_id) {
            let (_, row) = item?;
            if row.entry.is_special() && !cache.exists(&row.entry.cover_id) {
                missing.push(row);
            }
        }
        Ok(missing)
    }

    async fn update_file_size(&self, root_id: u64, id: u64, size: &str) -> Result<()> {
        let key = file_key(root_id, id);
        let value = self
            .files
            .get(key)?
            .ok_or_else(|| CatalogError::NotFound(format!("file {id} in root {root_id}")))?;

        let mut row: CatalogEntry = bincode::deserialize(&value)?;
        row.entry.size = size.to_string();
        self.files.insert(key, bincode::serialize(&row)?)?;
        Ok(())
    }

    async fn count_files(&self, root_id: u64) -> Result<usize> {
        Ok(self.files.scan_prefix(root_id.to_be_bytes()).count())
    }
}
