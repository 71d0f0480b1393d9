//! CLI command implementations

pub mod config;
pub mod maintain;
pub mod roots;
pub mod scan;
pub mod status;
pub mod watch;

use shelf_core::hash::strip_trailing_separator;
use std::path::PathBuf;

/// Explicit roots, or the fallback list, normalized and absolute
pub(crate) fn resolve_roots(explicit: Vec<PathBuf>, fallback: &[PathBuf]) -> Vec<PathBuf> {
    let roots = if explicit.is_empty() {
        fallback.to_vec()
    } else {
        explicit
    };

    roots
        .into_iter()
        .map(|root| {
            let absolute = std::path::absolute(&root).unwrap_or(root);
            strip_trailing_separator(&absolute)
        })
        .collect()
}
