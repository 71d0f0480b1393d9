//! SHA-256 path addressing for directories and catalog entries
//!
//! Identity is derived from the absolute path string, never from file
//! contents: a file only "changes" when its name or location changes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Error returned when parsing a hash from hex
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex length: expected {expected} characters, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid hex character in {0:?}")]
    Char(String),
}

/// Truncated path hash (16 hex chars) identifying a directory
///
/// Used for `DirectoryNode::hash` and `FileEntry::parent_hash`. A collision
/// here only costs a redundant orphan scan, so 64 bits are plenty.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PathHash([u8; 8]);

/// Full path hash (64 hex chars) identifying a catalog entry
///
/// Drives insert/delete decisions, so it keeps the whole digest.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FileHash([u8; 32]);

impl PathHash {
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        decode_fixed(s).map(Self)
    }
}

impl FileHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        decode_fixed(s).map(Self)
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    if s.len() != N * 2 {
        return Err(HexError::Length {
            expected: N * 2,
            actual: s.len(),
        });
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(s, &mut bytes).map_err(|_| HexError::Char(s.to_string()))?;
    Ok(bytes)
}

impl std::fmt::Debug for PathHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PathHash({})", self.to_hex())
    }
}

impl std::fmt::Display for PathHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileHash({})", self.to_hex())
    }
}

impl std::fmt::Display for FileHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<PathHash> for String {
    fn from(hash: PathHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for PathHash {
    type Error = HexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<FileHash> for String {
    fn from(hash: FileHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for FileHash {
    type Error = HexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

fn digest_path(path: &Path) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Hash a directory path (SHA-256, first 16 hex characters)
pub fn hash_path(path: &Path) -> PathHash {
    let digest = digest_path(path);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    PathHash(bytes)
}

/// Hash an entry path (full SHA-256)
pub fn hash_path_full(path: &Path) -> FileHash {
    FileHash(digest_path(path))
}

/// Drop trailing separators so `/books/` and `/books` address the same root
pub fn strip_trailing_separator(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(MAIN_SEPARATOR);
    if trimmed.is_empty() && !raw.is_empty() {
        // the filesystem root itself
        return PathBuf::from(MAIN_SEPARATOR.to_string());
    }
    PathBuf::from(trimmed)
}
