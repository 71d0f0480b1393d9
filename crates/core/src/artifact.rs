//! Download artifacts for special folders
//!
//! A folded folder has no single file to measure, so its size is the size of
//! a zip of its contents. The zip doubles as the download artifact and lives at
//! `<cache>/<cover_id>/<cover_id>.zip`.

use crate::entry::human_size;
use crate::error::{Result, ScanError};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Cache directory holding one zip artifact per special entry
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `cover_id` lives
    pub fn artifact_path(&self, cover_id: &str) -> PathBuf {
        self.root.join(cover_id).join(format!("{cover_id}.zip"))
    }

    pub fn exists(&self, cover_id: &str) -> bool {
        self.artifact_path(cover_id).is_file()
    }

    /// Human size of the artifact for `folder`, compressing it if needed
    ///
    /// An existing artifact is reused as-is.
    pub async fn size_of(&self, folder: &Path, cover_id: &str) -> Result<String> {
        let target = self.artifact_path(cover_id);

        if let Ok(meta) = tokio::fs::metadata(&target).await {
            if meta.is_file() {
                debug!("Artifact already cached: {}", target.display());
                return Ok(human_size(meta.len()));
            }
        }

        let source = folder.to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || compress_folder(&source, &target))
            .await?
            .map_err(|e| ScanError::Compression {
                path: folder.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!("Compressed {} ({} bytes)", folder.display(), bytes);
        Ok(human_size(bytes))
    }
}

/// Zip `folder` into `target` atomically, returning the archive size
fn compress_folder(folder: &Path, target: &Path) -> io::Result<u64> {
    let dir = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact has no parent"))?;
    std::fs::create_dir_all(dir)?;

    // Write next to the target so the final rename stays on one filesystem
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    let mut zip = ZipWriter::new(tmp);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let rel = match entry.path().strip_prefix(folder) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let name = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
        }
    }

    let tmp = zip.finish()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(std::fs::metadata(target)?.len())
}
