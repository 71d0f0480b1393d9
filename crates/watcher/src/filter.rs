//! Noise filtering for watch events
//!
//! A change only matters if it can alter the catalog. Events are dropped when
//! every path they carry is:
//! 1. inside the artifact cache (our own zip writes)
//! 2. an OS or editor by-product (`.DS_Store`, swap files, partial downloads)
//! 3. matched by a configured pattern (gitignore syntax, relative to the root)

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};

/// Decides which watch events can be ignored for one root
#[derive(Debug)]
pub struct NoiseFilter {
    root: PathBuf,
    cache_dir: Option<PathBuf>,
    patterns: Option<Gitignore>,
}

impl NoiseFilter {
    /// Build a filter for `root`; `patterns` use gitignore syntax
    pub fn new(
        root: &Path,
        cache_dir: Option<&Path>,
        patterns: &[String],
    ) -> Result<Self, ignore::Error> {
        let patterns = if patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(root);
            for pattern in patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };

        Ok(Self {
            root: root.to_path_buf(),
            cache_dir: cache_dir.map(Path::to_path_buf),
            patterns,
        })
    }

    /// True when the event cannot change the catalog
    pub fn is_noise(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return true;
        }
        // No paths means "something changed somewhere"
        !event.paths.is_empty() && event.paths.iter().all(|p| self.should_ignore(p))
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        if let Some(cache) = &self.cache_dir {
            if path.starts_with(cache) {
                return true;
            }
        }

        if is_system_litter(path) {
            return true;
        }

        match &self.patterns {
            Some(patterns) if path.starts_with(&self.root) => patterns
                .matched_path_or_any_parents(path, path.is_dir())
                .is_ignore(),
            _ => false,
        }
    }
}

/// OS metadata files and editor/download temporaries
fn is_system_litter(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    // macOS and Windows metadata
    if name == ".DS_Store" || name.starts_with("._") || name == "Thumbs.db" || name == "desktop.ini" {
        return true;
    }

    // Vim swap, Emacs lock/auto-save, backup files
    if name.ends_with(".swp") || name.ends_with(".swo") || name.ends_with('~') {
        return true;
    }
    if name.starts_with(".#") || (name.starts_with('#') && name.ends_with('#')) {
        return true;
    }

    // In-progress downloads
    name.ends_with(".part") || name.ends_with(".crdownload")
}
