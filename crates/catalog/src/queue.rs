//! Durable FIFO of pending scan requests

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use ulid::Ulid;

const QUEUE_TREE: &str = "scan_queue";

/// What asked for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// Debounced filesystem events
    Watch,
    /// Periodic sweep
    Schedule,
    /// CLI invocation
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Watch => "watch",
            Self::Schedule => "schedule",
            Self::Manual => "manual",
        })
    }
}

/// Queue item: reconcile `root`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub id: Ulid,
    pub root: PathBuf,
    pub trigger: Trigger,
    pub requested_at_ms: u64,
}

impl ScanRequest {
    pub fn new(root: impl AsRef<Path>, trigger: Trigger) -> Self {
        let id = Ulid::new();
        Self {
            id,
            root: root.as_ref().to_path_buf(),
            trigger,
            requested_at_ms: id.timestamp_ms(),
        }
    }
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, request: &ScanRequest) -> Result<()>;

    /// Remove and return the oldest request
    async fn dequeue(&self) -> Result<Option<ScanRequest>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queue stored in a sled tree keyed by monotonically increasing ids
pub struct SledWorkQueue {
    db: Db,
    tree: Tree,
}

impl SledWorkQueue {
    pub fn open(db: &Db) -> Result<Self> {
        Ok(Self {
            db: db.clone(),
            tree: db.open_tree(QUEUE_TREE)?,
        })
    }

    /// Pending requests, oldest first, without removing them
    pub fn pending(&self) -> Result<Vec<ScanRequest>> {
        self.tree
            .iter()
            .values()
            .map(|value| -> Result<ScanRequest> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }
}

#[async_trait]
impl WorkQueue for SledWorkQueue {
    async fn enqueue(&self, request: &ScanRequest) -> Result<()> {
        let seq = self.db.generate_id()?;
        self.tree
            .insert(seq.to_be_bytes(), serde_json::to_vec(request)?)?;
        self.tree.flush_async().await?;
        debug!(
            "Queued {} scan of {} ({})",
            request.trigger,
            request.root.display(),
            request.id
        );
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<ScanRequest>> {
        while let Some((key, value)) = self.tree.pop_min()? {
            match serde_json::from_slice(&value) {
                Ok(request) => return Ok(Some(request)),
                // A corrupt item must not wedge the queue
                Err(e) => warn!("Dropping unreadable queue item {:?}: {}", key, e),
            }
        }
        Ok(None)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }
}
