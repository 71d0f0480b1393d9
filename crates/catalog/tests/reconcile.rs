//! Reconciliation behaviour against a real directory tree

mod common;

use ahash::AHashSet;
use async_trait::async_trait;
use common::Harness;
use shelf_catalog::{
    CatalogEntry, CatalogError, CatalogGateway, Metadata, MetadataEnricher, ReconcileError,
    ReconciliationEngine, Result as CatalogResult, ScanRoot, SledCatalog,
};
use shelf_core::{
    ArtifactCache, DirectoryNode, FileEntry, FileHash, FileKind, PathHash, ScanConfig,
    TreeScanner, UNSIZED,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[tokio::test]
async fn test_first_run_registers_root_and_inserts_everything() {
    let h = Harness::new();
    h.touch("a.pdf");
    h.touch("novels/dune.epub");
    h.touch("novels/scifi/hyperion.mobi");

    let report = h.engine.reconcile(&h.library).await.unwrap();
    assert!(report.created_root);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.removed_by_parent + report.removed_by_hash, 0);

    assert_eq!(
        h.relative_paths().await,
        vec!["a.pdf", "novels/dune.epub", "novels/scifi/hyperion.mobi"]
    );

    let root = h
        .catalog
        .get_scan_root_by_path(&h.library)
        .await
        .unwrap()
        .unwrap();
    let tree = root.tree().unwrap().unwrap();
    assert_eq!(tree.len(), 3);
}

#[tokio::test]
async fn test_unchanged_tree_is_a_noop() {
    let h = Harness::new();
    h.touch("a.pdf");
    h.touch("x/b.pdf");
    h.comic("comics/akira", 3);

    h.engine.reconcile(&h.library).await.unwrap();
    let before = h.files().await;

    let report = h.engine.reconcile(&h.library).await.unwrap();
    assert!(report.is_noop(), "second run changed the catalog: {report:?}");
    assert_eq!(report.resized, 0);

    // Rows were kept, not re-created
    let after = h.files().await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_removed_directory_drops_nested_rows() {
    let h = Harness::new();
    h.touch("keep.pdf");
    h.touch("series/one.pdf");
    h.touch("series/extra/two.pdf");
    h.touch("series/extra/deeper/three.pdf");
    h.engine.reconcile(&h.library).await.unwrap();

    fs::remove_dir_all(h.path("series")).unwrap();
    let report = h.engine.reconcile(&h.library).await.unwrap();

    assert_eq!(report.removed_by_parent, 3);
    assert_eq!(report.removed_by_hash, 0);
    assert_eq!(h.relative_paths().await, vec!["keep.pdf"]);
}

#[tokio::test]
async fn test_rename_is_delete_plus_insert() {
    let h = Harness::new();
    h.touch("books/old.pdf");
    h.engine.reconcile(&h.library).await.unwrap();

    fs::rename(h.path("books/old.pdf"), h.path("books/new.pdf")).unwrap();
    let report = h.engine.reconcile(&h.library).await.unwrap();

    assert_eq!(report.removed_by_hash, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(h.relative_paths().await, vec!["books/new.pdf"]);
}

#[tokio::test]
async fn test_comic_folder_becomes_one_sized_entry() {
    let h = Harness::new();
    h.comic("comics/akira", 4);

    let report = h.engine.reconcile(&h.library).await.unwrap();
    assert_eq!(report.inserted, 1);

    let files = h.files().await;
    let entry = &files[0].entry;
    assert_eq!(entry.kind, FileKind::ComicManga);
    assert_eq!(entry.name, "akira");
    assert_ne!(entry.size, UNSIZED);
    assert!(h.cache.exists(&entry.cover_id));

    // The folded folder's directory is not part of the tree
    let root = h
        .catalog
        .get_scan_root_by_path(&h.library)
        .await
        .unwrap()
        .unwrap();
    let tree = root.tree().unwrap().unwrap();
    assert!(tree.child("comics").unwrap().children.is_empty());
}

#[tokio::test]
async fn test_mixed_image_folder_stays_plain() {
    let h = Harness::new();
    h.touch("art/1.jpg");
    h.touch("art/2.png");

    h.engine.reconcile(&h.library).await.unwrap();
    let files = h.files().await;
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|row| row.entry.kind == FileKind::Plain));
}

#[tokio::test]
async fn test_epub_without_container_is_not_folded() {
    let h = Harness::new();
    h.touch("dune/mimetype");
    fs::write(h.path("dune/mimetype"), "application/epub+zip").unwrap();
    h.touch("dune/content.opf");

    h.engine.reconcile(&h.library).await.unwrap();
    assert_eq!(
        h.relative_paths().await,
        vec!["dune/content.opf", "dune/mimetype"]
    );
}

#[tokio::test]
async fn test_failed_scan_leaves_catalog_untouched() {
    let h = Harness::new();
    h.touch("a.pdf");
    h.touch("x/b.pdf");
    h.engine.reconcile(&h.library).await.unwrap();

    let id = h.root_id().await;
    let before_files = h.files().await;
    let before_root = h
        .catalog
        .get_scan_root_by_path(&h.library)
        .await
        .unwrap()
        .unwrap();

    fs::remove_dir_all(&h.library).unwrap();
    let err = h.engine.reconcile(&h.library).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Scan(_)));

    assert_eq!(h.catalog.get_files(id).await.unwrap(), before_files);
    let after_root = h
        .catalog
        .get_scan_root_by_path(&h.library)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_root, before_root);
}

#[tokio::test]
async fn test_unknown_root_failing_scan_is_not_registered() {
    let h = Harness::new();
    let missing = h.path("nope");
    assert!(h.engine.reconcile(&missing).await.is_err());
    assert!(h.catalog.get_scan_roots().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_artifact_is_rebuilt() {
    let h = Harness::new();
    h.comic("comics/akira", 2);
    h.engine.reconcile(&h.library).await.unwrap();

    let cover_id = h.files().await[0].entry.cover_id.clone();
    let artifact = h.cache.artifact_path(&cover_id);
    fs::remove_file(&artifact).unwrap();

    assert_eq!(h.engine.maintain(&h.library).await.unwrap(), 1);
    assert!(artifact.is_file());

    // Also runs ahead of a regular reconciliation
    fs::remove_file(&artifact).unwrap();
    let report = h.engine.reconcile(&h.library).await.unwrap();
    assert_eq!(report.resized, 1);
    assert!(report.is_noop());
}

#[tokio::test]
async fn test_trailing_separator_maps_to_same_root() {
    let h = Harness::new();
    h.touch("a.pdf");
    h.engine.reconcile(&h.library).await.unwrap();

    let with_sep = format!("{}{}", h.library.display(), std::path::MAIN_SEPARATOR);
    let report = h.engine.reconcile(Path::new(&with_sep)).await.unwrap();
    assert!(!report.created_root);
    assert!(report.is_noop());
}

#[tokio::test]
async fn test_roots_are_isolated() {
    let a = Harness::new();
    a.touch("shared.pdf");
    a.engine.reconcile(&a.library).await.unwrap();

    // Second root in the same catalog
    let other = a.library.parent().unwrap().join("other");
    fs::create_dir_all(&other).unwrap();
    fs::write(other.join("b.pdf"), b"b").unwrap();
    a.engine.reconcile(&other).await.unwrap();

    fs::remove_file(other.join("b.pdf")).unwrap();
    let report = a.engine.reconcile(&other).await.unwrap();
    assert_eq!(report.removed_by_hash, 1);

    assert_eq!(a.relative_paths().await, vec!["shared.pdf"]);
}

struct TaggingEnricher;

#[async_trait]
impl MetadataEnricher for TaggingEnricher {
    async fn enrich(&self, entry: &FileEntry) -> anyhow::Result<Metadata> {
        if entry.name.starts_with("bad") {
            anyhow::bail!("lookup failed");
        }
        Ok(Metadata {
            local: Some(format!("{{\"title\":\"{}\"}}", entry.name)),
            web: None,
        })
    }
}

#[tokio::test]
async fn test_enrichment_failures_do_not_block_insertion() {
    let h = Harness::new();
    h.touch("good.pdf");
    h.touch("bad.pdf");

    let scanner = Arc::new(TreeScanner::new(ScanConfig::default()).unwrap());
    let engine = ReconciliationEngine::new(scanner, h.catalog.clone(), h.cache.clone())
        .with_enricher(Arc::new(TaggingEnricher));

    let report = engine.reconcile(&h.library).await.unwrap();
    assert_eq!(report.inserted, 2);

    let files = h.files().await;
    let good = files.iter().find(|r| r.entry.name == "good.pdf").unwrap();
    let bad = files.iter().find(|r| r.entry.name == "bad.pdf").unwrap();
    assert_eq!(
        good.entry.local_metadata.as_deref(),
        Some("{\"title\":\"good.pdf\"}")
    );
    assert_eq!(bad.entry.local_metadata, None);
}

/// Sled catalog whose `insert_file` always fails
struct FailingInserts(Arc<SledCatalog>);

#[async_trait]
impl CatalogGateway for FailingInserts {
    async fn get_scan_root_by_path(&self, path: &Path) -> CatalogResult<Option<ScanRoot>> {
        self.0.get_scan_root_by_path(path).await
    }

    async fn get_scan_roots(&self) -> CatalogResult<Vec<ScanRoot>> {
        self.0.get_scan_roots().await
    }

    async fn insert_scan_root(&self, path: &Path) -> CatalogResult<ScanRoot> {
        self.0.insert_scan_root(path).await
    }

    async fn update_scan_root_tree(&self, root_id: u64, tree: &DirectoryNode) -> CatalogResult<()> {
        self.0.update_scan_root_tree(root_id, tree).await
    }

    async fn get_file_hashes(&self, root_id: u64) -> CatalogResult<AHashSet<FileHash>> {
        self.0.get_file_hashes(root_id).await
    }

    async fn get_files(&self, root_id: u64) -> CatalogResult<Vec<CatalogEntry>> {
        self.0.get_files(root_id).await
    }

    async fn delete_files_by_parent_hash_not_in(
        &self,
        root_id: u64,
        live: &AHashSet<PathHash>,
    ) -> CatalogResult<usize> {
        self.0.delete_files_by_parent_hash_not_in(root_id, live).await
    }

    async fn delete_files_by_hash(&self, root_id: u64, hashes: &[FileHash]) -> CatalogResult<usize> {
        self.0.delete_files_by_hash(root_id, hashes).await
    }

    async fn insert_file(&self, entry: &FileEntry, _root_id: u64) -> CatalogResult<CatalogEntry> {
        Err(CatalogError::InvalidEntry(format!("refusing {}", entry.name)))
    }

    async fn get_special_entries_missing_cache_artifact(
        &self,
        root_id: u64,
        cache: &ArtifactCache,
    ) -> CatalogResult<Vec<CatalogEntry>> {
        self.0
            .get_special_entries_missing_cache_artifact(root_id, cache)
            .await
    }

    async fn update_file_size(&self, root_id: u64, id: u64, size: &str) -> CatalogResult<()> {
        self.0.update_file_size(root_id, id, size).await
    }

    async fn count_files(&self, root_id: u64) -> CatalogResult<usize> {
        self.0.count_files(root_id).await
    }
}

#[tokio::test]
async fn test_catalog_error_keeps_previous_tree() {
    let h = Harness::new();
    h.touch("a.pdf");
    h.engine.reconcile(&h.library).await.unwrap();
    let before = h
        .catalog
        .get_scan_root_by_path(&h.library)
        .await
        .unwrap()
        .unwrap();

    h.touch("new/b.pdf");
    let scanner = Arc::new(TreeScanner::new(ScanConfig::default()).unwrap());
    let engine = ReconciliationEngine::new(
        scanner,
        Arc::new(FailingInserts(h.catalog.clone())),
        h.cache.clone(),
    );
    let err = engine.reconcile(&h.library).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Persistence(_)));

    // Tree and timestamp untouched, so the next run diffs against the old tree
    let after = h
        .catalog
        .get_scan_root_by_path(&h.library)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after, before);
    assert_eq!(after.tree().unwrap().unwrap().len(), 1);
    assert_eq!(h.relative_paths().await, vec!["a.pdf"]);

    // A healthy run then catches up
    let report = h.engine.reconcile(&h.library).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(h.relative_paths().await, vec!["a.pdf", "new/b.pdf"]);
}

#[tokio::test]
async fn test_unwritable_cache_inserts_unsized_entry() {
    let h = Harness::new();
    h.comic("comics/akira", 2);

    // A regular file where the cache directory should be
    let blocked = h.library.parent().unwrap().join("blocked-cache");
    fs::write(&blocked, b"not a directory").unwrap();
    let scanner = Arc::new(TreeScanner::new(ScanConfig::default()).unwrap());
    let engine = ReconciliationEngine::new(
        scanner,
        h.catalog.clone(),
        ArtifactCache::new(&blocked),
    );

    let report = engine.reconcile(&h.library).await.unwrap();
    assert_eq!(report.inserted, 1);
    let files = h.files().await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].entry.kind, FileKind::ComicManga);
    assert_eq!(files[0].entry.size, UNSIZED);

    // Maintenance with a usable cache sizes it afterwards
    assert_eq!(h.engine.maintain(&h.library).await.unwrap(), 1);
    let files = h.files().await;
    assert_ne!(files[0].entry.size, UNSIZED);
    assert!(h.cache.exists(&files[0].entry.cover_id));
}
