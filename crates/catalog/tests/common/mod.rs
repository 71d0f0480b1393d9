//! Shared fixtures for catalog integration tests

#![allow(dead_code)]

use shelf_catalog::{
    CatalogEntry, CatalogGateway, ReconciliationEngine, ScanCoordinator, SledCatalog, SledRunLock,
};
use shelf_core::{ArtifactCache, ScanConfig, TreeScanner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A library directory, an artifact cache and a catalog in one temp dir
pub struct Harness {
    _tmp: TempDir,
    pub library: PathBuf,
    pub cache: ArtifactCache,
    pub db: sled::Db,
    pub catalog: Arc<SledCatalog>,
    pub engine: Arc<ReconciliationEngine>,
}

impl Harness {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let library = tmp.path().join("library");
        fs::create_dir_all(&library).unwrap();
        let cache = ArtifactCache::new(tmp.path().join("cache"));

        let db = sled::open(tmp.path().join("db")).unwrap();
        let catalog = Arc::new(SledCatalog::open(&db).unwrap());
        let scanner = Arc::new(TreeScanner::new(ScanConfig::default()).unwrap());
        let engine = Arc::new(ReconciliationEngine::new(
            scanner,
            catalog.clone(),
            cache.clone(),
        ));

        Self {
            _tmp: tmp,
            library,
            cache,
            db,
            catalog,
            engine,
        }
    }

    pub fn coordinator(&self) -> (ScanCoordinator, Arc<SledRunLock>) {
        let lock = Arc::new(SledRunLock::open(&self.db).unwrap());
        (ScanCoordinator::new(self.engine.clone(), lock.clone()), lock)
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.library.join(rel)
    }

    pub fn touch(&self, rel: &str) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel.as_bytes()).unwrap();
    }

    /// Folder of `pages` jpg images
    pub fn comic(&self, rel: &str, pages: usize) {
        let dir = self.path(rel);
        fs::create_dir_all(&dir).unwrap();
        for page in 0..pages {
            fs::write(dir.join(format!("{page:03}.jpg")), vec![page as u8; 512]).unwrap();
        }
    }

    pub async fn root_id(&self) -> u64 {
        self.catalog
            .get_scan_root_by_path(&self.library)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    pub async fn files(&self) -> Vec<CatalogEntry> {
        let id = self.root_id().await;
        self.catalog.get_files(id).await.unwrap()
    }

    /// Catalog paths relative to the library, sorted
    pub async fn relative_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files()
            .await
            .iter()
            .map(|row| relative(&self.library, &row.entry.path()))
            .collect();
        paths.sort();
        paths
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap()
        .to_string_lossy()
        .replace('\\', "/")
}
