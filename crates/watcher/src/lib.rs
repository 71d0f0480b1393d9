//! Filesystem watching for shelf
//!
//! This crate provides:
//! - One recursive notify watcher per scan root, bridged into tokio
//! - Noise filtering so cache writes and OS litter never trigger scans
//! - Per-root debouncing into durable scan requests
//! - The queue consumer and the periodic scheduler

pub mod consumer;
pub mod debounce;
pub mod filter;
pub mod schedule;

pub use consumer::QueueConsumer;
pub use debounce::Debouncer;
pub use filter::NoiseFilter;
pub use schedule::{ScheduleConfig, Scheduler, SweepSummary};

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Watch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period after the last event before a root is rescanned
    pub debounce_ms: u64,
    /// How often the queue consumer looks for work
    pub poll_interval_ms: u64,
    /// Extra gitignore-style patterns whose changes are ignored
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            poll_interval_ms: 1000,
            ignore_patterns: vec![],
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch {}: {source}", root.display())]
    Notify {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ignore::Error),
}

/// Recursive watcher for one scan root
///
/// Every relevant event is forwarded as the root path; dropping the value
/// stops the underlying notify stream.
pub struct RootWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl RootWatcher {
    pub fn start(
        root: &Path,
        filter: NoiseFilter,
        tx: mpsc::Sender<PathBuf>,
    ) -> Result<Self, WatchError> {
        let key = root.to_path_buf();
        let notify_err = |source| WatchError::Notify {
            root: root.to_path_buf(),
            source,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let relevant = match res {
                    Ok(event) => !filter.is_noise(&event),
                    Err(e) => {
                        // Events may have been lost: rescan the whole root
                        warn!("Watch error under {}: {}", key.display(), e);
                        true
                    }
                };
                if relevant {
                    // Runs on notify's own thread, outside the runtime
                    if tx.blocking_send(key.clone()).is_err() {
                        debug!("Watch channel closed, dropping event for {}", key.display());
                    }
                }
            },
            NotifyConfig::default(),
        )
        .map_err(notify_err)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(notify_err)?;

        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Owns the watchers of every registered root
pub struct WatchSet {
    config: WatchConfig,
    cache_dir: Option<PathBuf>,
    tx: mpsc::Sender<PathBuf>,
    watchers: Mutex<HashMap<PathBuf, RootWatcher>>,
}

impl WatchSet {
    /// Create an empty set; the receiver yields one root path per relevant event
    pub fn new(config: WatchConfig, cache_dir: Option<PathBuf>) -> (Self, mpsc::Receiver<PathBuf>) {
        let (tx, rx) = mpsc::channel(1024);
        let set = Self {
            config,
            cache_dir,
            tx,
            watchers: Mutex::new(HashMap::new()),
        };
        (set, rx)
    }

    /// Start watching `root`; already-watched roots are left alone
    pub fn watch(&self, root: &Path) -> Result<bool, WatchError> {
        if self.watchers.lock().contains_key(root) {
            return Ok(false);
        }

        let filter = NoiseFilter::new(root, self.cache_dir.as_deref(), &self.config.ignore_patterns)?;
        let watcher = RootWatcher::start(root, filter, self.tx.clone())?;

        info!("Watching {}", root.display());
        self.watchers.lock().insert(root.to_path_buf(), watcher);
        Ok(true)
    }

    pub fn unwatch(&self, root: &Path) -> bool {
        let removed = self.watchers.lock().remove(root).is_some();
        if removed {
            info!("Stopped watching {}", root.display());
        }
        removed
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.watchers.lock().keys().cloned().collect();
        roots.sort();
        roots
    }

    pub fn len(&self) -> usize {
        self.watchers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every watcher; the event channel closes once the set itself is dropped
    pub fn shutdown(&self) {
        let drained: Vec<RootWatcher> = self.watchers.lock().drain().map(|(_, w)| w).collect();
        info!("Stopping {} watcher(s)", drained.len());
        drop(drained);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_watch_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (set, _rx) = WatchSet::new(WatchConfig::default(), None);

        assert!(set.watch(tmp.path()).unwrap());
        assert!(!set.watch(tmp.path()).unwrap());
        assert_eq!(set.len(), 1);

        assert!(set.unwatch(tmp.path()));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let (set, _rx) = WatchSet::new(WatchConfig::default(), None);
        let err = set.watch(&tmp.path().join("gone")).unwrap_err();
        assert!(matches!(err, WatchError::Notify { .. }));
    }

    #[tokio::test]
    async fn test_file_creation_is_reported_as_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let (set, mut rx) = WatchSet::new(WatchConfig::default(), None);
        set.watch(&root).unwrap();

        fs::write(root.join("new.pdf"), b"pdf").unwrap();

        let got = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no watch event")
            .unwrap();
        assert_eq!(got, root);

        set.shutdown();
        assert!(set.is_empty());
    }
}
