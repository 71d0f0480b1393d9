//! Concurrency-bounded directory scanner
//!
//! A scan runs in three steps:
//! 1. walk: list every directory (bounded by a semaphore) into a `Listing`
//!    tree, each subtree returned by value and merged by its parent
//! 2. classify: top-down, test each subdirectory with the `FormatClassifier`,
//!    without descending into folders that matched
//! 3. fold: a pure pass turning the listing into a `DirectoryNode` tree and a
//!    flat entry list, collapsing special folders into single entries

use crate::classify::{ClassifierConfig, FormatClassifier};
use crate::entry::{human_size, FileEntry, FileKind};
use crate::error::{Result, ScanError};
use crate::hash::strip_trailing_separator;
use crate::tree::DirectoryNode;
use ahash::AHashMap;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, error, info, warn};

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum directory reads in flight at once
    pub concurrency: usize,
    pub classifier: ClassifierConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "scan.concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Result of a successful scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Root path as scanned (trailing separator removed)
    pub root: PathBuf,
    pub tree: DirectoryNode,
    pub files: Vec<FileEntry>,
}

/// Unfolded listing of one directory and everything beneath it
#[derive(Debug, Clone)]
pub struct Listing {
    pub path: PathBuf,
    /// Regular files directly inside `path`
    pub files: Vec<FileEntry>,
    pub subdirs: Vec<Listing>,
}

/// Counters from the most recent scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Highest number of concurrent directory reads observed
    pub peak_in_flight: usize,
    /// Directory reads performed (listings and classifications)
    pub dirs_read: usize,
}

/// Walks a root and produces a folded snapshot
#[derive(Debug)]
pub struct TreeScanner {
    classifier: FormatClassifier,
    permits: Semaphore,
    scanning: AtomicBool,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    dirs_read: AtomicUsize,
}

/// Held while a directory is being read
struct ReadSlot<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for ReadSlot<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TreeScanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier: FormatClassifier::new(config.classifier.clone()),
            permits: Semaphore::new(config.concurrency),
            scanning: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            dirs_read: AtomicUsize::new(0),
        })
    }

    /// Whether a scan is currently running (diagnostics only)
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            dirs_read: self.dirs_read.load(Ordering::SeqCst),
        }
    }

    /// Scan `root` into a directory tree and a flat entry list
    ///
    /// Any unreadable directory fails the whole scan; callers must not touch
    /// the catalog on error.
    pub async fn scan(&self, root: &Path) -> Result<ScanOutcome> {
        let root = strip_trailing_separator(root);
        info!("Scanning: {}", root.display());

        self.peak_in_flight.store(0, Ordering::SeqCst);
        self.dirs_read.store(0, Ordering::SeqCst);
        self.scanning.store(true, Ordering::SeqCst);
        let result = self.scan_inner(&root).await;
        self.scanning.store(false, Ordering::SeqCst);

        match &result {
            Ok(outcome) => info!(
                "Scan of {} finished: {} directories, {} entries",
                root.display(),
                outcome.tree.len(),
                outcome.files.len()
            ),
            Err(e) => error!("Scan of {} failed: {}", root.display(), e),
        }

        result
    }

    async fn scan_inner(&self, root: &Path) -> Result<ScanOutcome> {
        let listing = self.walk(root.to_path_buf()).await?;
        let special: AHashMap<PathBuf, FileKind> =
            self.classify_tree(&listing).await?.into_iter().collect();
        let (tree, files) = fold(listing, &special);

        Ok(ScanOutcome {
            root: root.to_path_buf(),
            tree,
            files,
        })
    }

    async fn slot(&self) -> Result<ReadSlot<'_>> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ScanError::InvalidConfig("scanner semaphore closed".into()))?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.dirs_read.fetch_add(1, Ordering::SeqCst);
        Ok(ReadSlot {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    fn walk(&self, dir: PathBuf) -> BoxFuture<'_, Result<Listing>> {
        async move {
            let (files, subdirs) = self.read_level(&dir).await?;
            let subdirs = try_join_all(subdirs.into_iter().map(|sub| self.walk(sub))).await?;
            Ok(Listing {
                path: dir,
                files,
                subdirs,
            })
        }
        .boxed()
    }

    /// List one directory; the read slot is released before recursing
    async fn read_level(&self, dir: &Path) -> Result<(Vec<FileEntry>, Vec<PathBuf>)> {
        let _slot = self.slot().await?;
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| ScanError::io(dir, e))?;

        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::io(dir, e))?
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ScanError::io(&path, e))?;

            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() {
                let meta = entry.metadata().await.map_err(|e| ScanError::io(&path, e))?;
                files.push(FileEntry::plain(dir, &name, human_size(meta.len())));
            } else if file_type.is_symlink() {
                match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => {
                        files.push(FileEntry::plain(dir, &name, human_size(meta.len())));
                    }
                    Ok(meta) if meta.is_dir() => {
                        warn!("Skipping directory symlink {}", path.display());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Skipping dangling symlink {}: {}", path.display(), e),
                }
            }
        }

        Ok((files, subdirs))
    }

    /// Special subdirectories anywhere in the listing, outermost first
    fn classify_tree<'a>(
        &'a self,
        listing: &'a Listing,
    ) -> BoxFuture<'a, Result<Vec<(PathBuf, FileKind)>>> {
        async move {
            let kinds = try_join_all(listing.subdirs.iter().map(|sub| async move {
                let _slot = self.slot().await?;
                Ok::<_, ScanError>((sub, self.classifier.classify(&sub.path).await))
            }))
            .await?;

            let mut found = Vec::new();
            let mut descend = Vec::new();
            for (sub, kind) in kinds {
                if kind.is_special() {
                    found.push((sub.path.clone(), kind));
                } else {
                    descend.push(sub);
                }
            }

            let nested = try_join_all(descend.into_iter().map(|sub| self.classify_tree(sub))).await?;
            found.extend(nested.into_iter().flatten());
            Ok(found)
        }
        .boxed()
    }
}

/// Fold a listing into a directory tree and entry list
///
/// Subdirectories present in `special` become one entry of that kind; their
/// contents are dropped. Pure: no I/O.
pub fn fold(listing: Listing, special: &AHashMap<PathBuf, FileKind>) -> (DirectoryNode, Vec<FileEntry>) {
    let mut node = DirectoryNode::new(&listing.path);
    let mut files = listing.files;

    for sub in listing.subdirs {
        match special.get(&sub.path) {
            Some(&kind) if kind.is_special() => {
                let name = sub
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!("Folding {} as {}", sub.path.display(), kind);
                files.push(FileEntry::special(&listing.path, &name, kind));
            }
            _ => {
                let (child, child_files) = fold(sub, special);
                node.children.push(child);
                files.extend(child_files);
            }
        }
    }

    (node, files)
}
