//! Catalog entry produced for each file or folded special folder

use crate::hash::{hash_path, hash_path_full, FileHash, PathHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Size recorded for special entries that have not been sized yet
pub const UNSIZED: &str = "0";

/// Kind of a scanned entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Ordinary file
    #[serde(rename = "FILE")]
    Plain,
    /// Folder of page images
    #[serde(rename = "COMIC-MANGA")]
    ComicManga,
    /// Unpacked EPUB bundle
    #[serde(rename = "EPUB")]
    Epub,
    /// Folder of audio tracks
    #[serde(rename = "AUDIOBOOK")]
    Audiobook,
    /// Classifier result for "not special"; never persisted
    #[serde(rename = "NONE")]
    None,
}

impl FileKind {
    /// Kinds that fold a whole directory into one entry
    pub fn is_special(self) -> bool {
        matches!(self, Self::ComicManga | Self::Epub | Self::Audiobook)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "FILE",
            Self::ComicManga => "COMIC-MANGA",
            Self::Epub => "EPUB",
            Self::Audiobook => "AUDIOBOOK",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FILE" => Ok(Self::Plain),
            "COMIC-MANGA" => Ok(Self::ComicManga),
            "EPUB" => Ok(Self::Epub),
            "AUDIOBOOK" => Ok(Self::Audiobook),
            "NONE" => Ok(Self::None),
            other => Err(format!("unknown file kind: {other}")),
        }
    }
}

/// A file, or a special folder folded into a single logical file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Absolute path of the containing directory
    pub parent_path: PathBuf,
    /// `hash_path(parent_path)`
    pub parent_hash: PathHash,
    /// `hash_path_full` of the file, or of the folded folder
    pub file_hash: FileHash,
    /// Human-readable size
    pub size: String,
    /// Random id naming the cover image and cache artifact
    pub cover_id: String,
    pub kind: FileKind,
    /// JSON blob from local metadata extraction
    pub local_metadata: Option<String>,
    /// JSON blob from web metadata lookup
    pub web_metadata: Option<String>,
    /// Metadata was edited by hand; enrichment must not overwrite it
    pub custom_details: bool,
}

impl FileEntry {
    /// Entry for a regular file at `dir/name`
    pub fn plain(dir: &Path, name: &str, size: String) -> Self {
        Self::build(dir, name, size, FileKind::Plain)
    }

    /// Entry for a folder at `dir/name` folded into one item of `kind`
    pub fn special(dir: &Path, name: &str, kind: FileKind) -> Self {
        Self::build(dir, name, UNSIZED.to_string(), kind)
    }

    fn build(dir: &Path, name: &str, size: String, kind: FileKind) -> Self {
        Self {
            name: name.to_string(),
            parent_path: dir.to_path_buf(),
            parent_hash: hash_path(dir),
            file_hash: hash_path_full(&dir.join(name)),
            size,
            cover_id: Uuid::new_v4().to_string(),
            kind,
            local_metadata: None,
            web_metadata: None,
            custom_details: false,
        }
    }

    /// Absolute path of the file or folded folder
    pub fn path(&self) -> PathBuf {
        self.parent_path.join(&self.name)
    }

    pub fn is_special(&self) -> bool {
        self.kind.is_special()
    }
}

/// Format a byte count with binary prefixes ("512 B", "1.5 KiB", "2.0 MiB")
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
    const THRESH: f64 = 1024.0;

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0usize;
    value /= THRESH;
    // round to one decimal before deciding whether to step up a unit
    while (value * 10.0).round() / 10.0 >= THRESH && unit < UNITS.len() - 1 {
        value /= THRESH;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_entry_hashes() {
        let dir = Path::new("/lib/novels");
        let e = FileEntry::plain(dir, "dune.epub", "1.0 MiB".into());
        assert_eq!(e.parent_hash, hash_path(dir));
        assert_eq!(e.file_hash, hash_path_full(Path::new("/lib/novels/dune.epub")));
        assert_eq!(e.kind, FileKind::Plain);
        assert_eq!(e.path(), PathBuf::from("/lib/novels/dune.epub"));
    }

    #[test]
    fn test_special_entry_uses_folder_path() {
        let dir = Path::new("/lib/comics");
        let e = FileEntry::special(dir, "Akira v01", FileKind::ComicManga);
        assert_eq!(e.file_hash, hash_path_full(Path::new("/lib/comics/Akira v01")));
        assert_eq!(e.size, UNSIZED);
        assert!(e.is_special());
    }

    #[test]
    fn test_cover_ids_are_unique() {
        let dir = Path::new("/lib");
        let a = FileEntry::plain(dir, "a", "1 B".into());
        let b = FileEntry::plain(dir, "a", "1 B".into());
        assert_ne!(a.cover_id, b.cover_id);
        assert_eq!(a.file_hash, b.file_hash);
    }

    #[test]
    fn test_kind_strings() {
        for kind in [
            FileKind::Plain,
            FileKind::ComicManga,
            FileKind::Epub,
            FileKind::Audiobook,
            FileKind::None,
        ] {
            assert_eq!(kind.as_str().parse::<FileKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
        assert!(!FileKind::Plain.is_special());
        assert!(!FileKind::None.is_special());
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1024), "1.0 KiB");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
        // 1023.96 KiB rounds up to the next unit
        assert_eq!(human_size(1_048_535), "1.0 MiB");
    }
}
