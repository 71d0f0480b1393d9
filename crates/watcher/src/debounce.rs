//! Per-root debouncing of watch events
//!
//! Each root has one deadline, pushed back on every event. When a deadline
//! passes quietly the root gets exactly one `ScanRequest` on the work queue.

use shelf_catalog::{ScanRequest, Trigger, WorkQueue};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

/// Coalesces bursts of root events into scan requests
pub struct Debouncer {
    window: Duration,
    queue: Arc<dyn WorkQueue>,
}

impl Debouncer {
    pub fn new(window: Duration, queue: Arc<dyn WorkQueue>) -> Self {
        Self { window, queue }
    }

    /// Consume root events until the channel closes
    ///
    /// Returns the number of requests enqueued. Roots still waiting for their
    /// quiet period when the channel closes are dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<PathBuf>) -> usize {
        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();
        let mut emitted = 0usize;

        loop {
            let next_deadline = pending.values().min().copied();

            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(root) => {
                        debug!("Change under {}", root.display());
                        pending.insert(root, Instant::now() + self.window);
                    }
                    None => {
                        if !pending.is_empty() {
                            info!("Watch channel closed, dropping {} pending root(s)", pending.len());
                        }
                        break;
                    }
                },
                _ = sleep_until(next_deadline.unwrap_or_else(Instant::now)), if next_deadline.is_some() => {
                    let now = Instant::now();
                    let due: Vec<PathBuf> = pending
                        .iter()
                        .filter(|(_, deadline)| **deadline <= now)
                        .map(|(root, _)| root.clone())
                        .collect();

                    for root in due {
                        pending.remove(&root);
                        if self.emit(root).await {
                            emitted += 1;
                        }
                    }
                }
            }
        }

        emitted
    }

    async fn emit(&self, root: PathBuf) -> bool {
        let request = ScanRequest::new(&root, Trigger::Watch);
        match self.queue.enqueue(&request).await {
            Ok(()) => {
                info!("Queued rescan of {}", root.display());
                true
            }
            Err(e) => {
                error!("Failed to queue rescan of {}: {}", root.display(), e);
                false
            }
        }
    }
}
