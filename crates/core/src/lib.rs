//! Library scanning primitives
//!
//! This crate provides:
//! - Path hashing (directory and file identities)
//! - The directory tree snapshot stored per scan root
//! - Special-folder classification (comics, EPUBs, audiobooks)
//! - A concurrency-bounded scanner that folds special folders
//! - The zip artifact cache used to size special entries

pub mod artifact;
pub mod classify;
pub mod entry;
pub mod error;
pub mod hash;
pub mod scanner;
pub mod tree;

// Re-exports
pub use artifact::ArtifactCache;
pub use classify::{ClassifierConfig, FormatClassifier};
pub use entry::{human_size, FileEntry, FileKind, UNSIZED};
pub use error::{Result, ScanError};
pub use hash::{hash_path, hash_path_full, FileHash, PathHash};
pub use scanner::{fold, Listing, ScanConfig, ScanOutcome, ScanStats, TreeScanner};
pub use tree::DirectoryNode;
