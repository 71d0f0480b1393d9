//! Durable run-lock guaranteeing one reconciliation at a time

use crate::error::Result;
use crate::now_ms;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::Tree;
use std::time::Duration;
use tracing::{debug, warn};

const LOCKS_TREE: &str = "locks";

/// Persisted state of one named lock
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub running: bool,
    /// When the current holder acquired the lock
    pub started_at_ms: Option<u64>,
    /// Start time of the last run that released the lock
    pub last_scan_ms: Option<u64>,
}

#[async_trait]
pub trait RunLock: Send + Sync {
    /// Atomically take the lock; `false` when someone else holds it
    async fn try_acquire(&self, key: &str) -> Result<bool>;

    async fn release(&self, key: &str) -> Result<()>;

    async fn state(&self, key: &str) -> Result<LockState>;
}

/// Run-lock stored as JSON records in a sled tree
///
/// Acquisition is a compare-and-swap on the stored record, so two processes
/// sharing the database cannot both win.
pub struct SledRunLock {
    tree: Tree,
    /// Take over a lock held longer than this (crashed holder)
    stale_after: Option<Duration>,
}

impl SledRunLock {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(LOCKS_TREE)?,
            stale_after: None,
        })
    }

    /// Allow takeover of locks older than `stale_after`
    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Clear every lock still marked as running, returning how many were held
    ///
    /// sled admits a single process per database, so a held record seen
    /// right after opening was left by a process that died mid-run.
    pub fn clear_abandoned(&self) -> Result<usize> {
        let mut cleared = 0;
        for item in self.tree.iter() {
            let (key, value) = item?;
            let state: LockState = serde_json::from_slice(&value)?;
            if !state.running {
                continue;
            }
            warn!(
                "Clearing lock {:?} abandoned since {:?}",
                String::from_utf8_lossy(&key),
                state.started_at_ms
            );
            // The interrupted run never finished, so it does not count as a scan
            let next = LockState {
                running: false,
                started_at_ms: None,
                last_scan_ms: state.last_scan_ms,
            };
            self.tree.insert(key, serde_json::to_vec(&next)?)?;
            cleared += 1;
        }
        if cleared > 0 {
            self.tree.flush()?;
        }
        Ok(cleared)
    }

    fn decode(value: Option<&sled::IVec>) -> Result<LockState> {
        match value {
            Some(bytes) => Ok(serde_json::from_slice(bytes)?),
            None => Ok(LockState::default()),
        }
    }

    fn is_stale(&self, state: &LockState, now: u64) -> bool {
        match (self.stale_after, state.started_at_ms) {
            (Some(limit), Some(started)) => now.saturating_sub(started) >= limit.as_millis() as u64,
            _ => false,
        }
    }
}

#[async_trait]
impl RunLock for SledRunLock {
    async fn try_acquire(&self, key: &str) -> Result<bool> {
        loop {
            let current = self.tree.get(key)?;
            let state = Self::decode(current.as_ref())?;
            let now = now_ms();

            if state.running {
                if !self.is_stale(&state, now) {
                    return Ok(false);
                }
                warn!(
                    "Taking over stale lock {:?} held since {:?}",
                    key, state.started_at_ms
                );
            }

            let next = LockState {
                running: true,
                started_at_ms: Some(now),
                last_scan_ms: state.last_scan_ms,
            };
            let swapped = self
                .tree
                .compare_and_swap(key, current, Some(serde_json::to_vec(&next)?))?;

            if swapped.is_ok() {
                self.tree.flush_async().await?;
                debug!("Acquired lock {:?}", key);
                return Ok(true);
            }
            // Lost a race with another writer; re-read and decide again
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        let state = Self::decode(self.tree.get(key)?.as_ref())?;
        let next = LockState {
            running: false,
            started_at_ms: None,
            last_scan_ms: state.started_at_ms.or(state.last_scan_ms),
        };
        self.tree.insert(key, serde_json::to_vec(&next)?)?;
        self.tree.flush_async().await?;
        debug!("Released lock {:?}", key);
        Ok(())
    }

    async fn state(&self, key: &str) -> Result<LockState> {
        Self::decode(self.tree.get(key)?.as_ref())
    }
}
