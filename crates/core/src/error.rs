//! Scan error taxonomy

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by scanning and artifact sizing
#[derive(Debug, Error)]
pub enum ScanError {
    /// A directory or file could not be read; the whole scan is abandoned
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    /// Building the download artifact for a special folder failed
    #[error("failed to compress {}: {reason}", path.display())]
    Compression { path: PathBuf, reason: String },

    #[error("scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
