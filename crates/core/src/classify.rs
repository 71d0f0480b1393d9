//! Content-based classification of special folders
//!
//! A directory has no extension to go by, so it is recognised by what it
//! holds: a flat folder of page images, an unpacked EPUB container, or a
//! flat folder of audio tracks. Anything ambiguous or unreadable is treated
//! as an ordinary directory.

use crate::entry::FileKind;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing::debug;

const COMIC_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "m4b", "ogg"];
const EPUB_MIMETYPE: &str = "application/epub+zip";

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Require every page of a comic folder to share one extension
    pub strict_comics: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strict_comics: true,
        }
    }
}

/// Special folder formats, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialFormat {
    ComicManga,
    Epub,
    Audiobook,
}

impl SpecialFormat {
    const PRIORITY: [SpecialFormat; 3] = [Self::ComicManga, Self::Epub, Self::Audiobook];

    fn kind(self) -> FileKind {
        match self {
            Self::ComicManga => FileKind::ComicManga,
            Self::Epub => FileKind::Epub,
            Self::Audiobook => FileKind::Audiobook,
        }
    }
}

/// Decides whether a directory is a special logical unit
#[derive(Debug, Clone, Default)]
pub struct FormatClassifier {
    config: ClassifierConfig,
}

impl FormatClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify `dir`, returning `FileKind::None` for ordinary folders
    ///
    /// I/O errors never propagate: a format whose check fails is skipped and
    /// the next one is tried. An unreadable directory ends up plain, so its
    /// contents are still scanned and the scan itself reports the error.
    pub async fn classify(&self, dir: &Path) -> FileKind {
        for format in SpecialFormat::PRIORITY {
            let matched = match format {
                SpecialFormat::ComicManga => {
                    is_media_folder(dir, COMIC_EXTENSIONS, self.config.strict_comics).await
                }
                SpecialFormat::Epub => is_epub_folder(dir).await,
                SpecialFormat::Audiobook => is_media_folder(dir, AUDIO_EXTENSIONS, false).await,
            };

            match matched {
                Ok(true) => {
                    debug!("{} classified as {}", dir.display(), format.kind());
                    return format.kind();
                }
                Ok(false) => {}
                // A failed check only rules out its own format
                Err(e) => debug!("{:?} check of {} failed: {}", format, dir.display(), e),
            }
        }

        FileKind::None
    }
}

/// Flat, non-empty folder whose files all carry an allowed extension
async fn is_media_folder(dir: &Path, extensions: &[&str], strict: bool) -> io::Result<bool> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut first_ext: Option<String> = None;
    let mut count = 0usize;

    while let Some(entry) = entries.next_entry().await? {
        // follow symlinks: a linked page still counts as a page
        let metadata = tokio::fs::metadata(entry.path()).await?;
        if !metadata.is_file() {
            return Ok(false);
        }

        let ext = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !extensions.contains(&ext.as_str()) {
            return Ok(false);
        }

        if strict {
            match &first_ext {
                None => first_ext = Some(ext),
                Some(seen) if *seen != ext => return Ok(false),
                Some(_) => {}
            }
        }

        count += 1;
    }

    Ok(count > 0)
}

/// Unpacked EPUB: mimetype marker, container manifest, and the package
/// document it points at
async fn is_epub_folder(dir: &Path) -> io::Result<bool> {
    let mimetype = match read_optional(&dir.join("mimetype")).await? {
        Some(content) => content,
        None => return Ok(false),
    };
    if mimetype.trim() != EPUB_MIMETYPE {
        return Ok(false);
    }

    let container = match read_optional(&dir.join("META-INF").join("container.xml")).await? {
        Some(content) => content,
        None => return Ok(false),
    };

    let Some(full_path) = rootfile_path(&container) else {
        return Ok(false);
    };

    let package = dir.join(full_path.trim_start_matches('/'));
    tokio::fs::try_exists(&package).await
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        // e.g. the marker is a directory or not UTF-8
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(None),
        Err(e) => Err(e),
    }
}

/// Extract `full-path` of the first `container/rootfiles/rootfile` element
///
/// Returns `None` for malformed XML or a missing/empty attribute.
pub fn rootfile_path(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if let Some(path) = match_rootfile(&stack, &e) {
                    return path;
                }
                stack.push(e.local_name().as_ref().to_vec());
            }
            Ok(Event::Empty(e)) => {
                if let Some(path) = match_rootfile(&stack, &e) {
                    return path;
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(e) => {
                debug!("container.xml parse error: {}", e);
                return None;
            }
        }
    }
}

/// `Some(result)` when `e` is the rootfile element, `None` otherwise
fn match_rootfile(stack: &[Vec<u8>], e: &BytesStart<'_>) -> Option<Option<String>> {
    let in_rootfiles = stack.len() == 2 && stack[0] == b"container" && stack[1] == b"rootfiles";
    if !in_rootfiles || e.local_name().as_ref() != b"rootfile" {
        return None;
    }

    let path = e
        .try_get_attribute("full-path")
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
        .filter(|v| !v.trim().is_empty());
    Some(path)
}
