//! Directory tree snapshot produced by a scan
//!
//! A `DirectoryNode` is addressed by the hash of its absolute path, not its
//! contents. The whole tree is persisted as an opaque JSON blob on the scan
//! root and compared hash-by-hash on the next reconciliation.

use crate::hash::{hash_path, PathHash};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One directory level of a scan snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Final path component
    pub name: String,
    /// `hash_path` of the absolute directory path
    pub hash: PathHash,
    /// Subdirectories in listing order
    #[serde(rename = "directories")]
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// Create an empty node for the directory at `path`
    pub fn new(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            hash: hash_path(path),
            children: Vec::new(),
        }
    }

    /// All node hashes in pre-order (this node first)
    pub fn hashes(&self) -> Vec<PathHash> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_hashes(&mut out);
        out
    }

    fn collect_hashes(&self, out: &mut Vec<PathHash>) {
        out.push(self.hash);
        for child in &self.children {
            child.collect_hashes(out);
        }
    }

    /// Hash set for membership checks during reconciliation
    pub fn hash_set(&self) -> AHashSet<PathHash> {
        self.hashes().into_iter().collect()
    }

    /// Number of nodes including this one
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(DirectoryNode::len).sum::<usize>()
    }

    /// A node always counts itself, so a tree is never empty
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Find a direct child by name
    pub fn child(&self, name: &str) -> Option<&DirectoryNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Serialize for the scan root row
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a serialized tree
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
