//! Drains the work queue into the scan coordinator

use shelf_catalog::{RunOutcome, ScanCoordinator, WorkQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Polls the work queue and runs each request under the run-lock
///
/// Requests that meet a held lock are dropped: the holder's scan already
/// covers them, or the next event/tick will.
pub struct QueueConsumer {
    queue: Arc<dyn WorkQueue>,
    coordinator: Arc<ScanCoordinator>,
    poll_interval: Duration,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        coordinator: Arc<ScanCoordinator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            coordinator,
            poll_interval,
        }
    }

    /// Poll until `shutdown` flips to true
    ///
    /// A reconciliation in progress always finishes before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Queue consumer started (poll every {:?})", self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    while self.poll_once().await.is_some() {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Queue consumer stopped");
    }

    /// Run the oldest queued request, if any
    pub async fn poll_once(&self) -> Option<RunOutcome> {
        let request = match self.queue.dequeue().await {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to read work queue: {}", e);
                return None;
            }
        };

        debug!("Dequeued {} request {}", request.trigger, request.id);
        let outcome = self.coordinator.run(&request).await;
        if outcome.is_contended() {
            info!("Dropped request for {}: scanner busy", request.root.display());
        }
        Some(outcome)
    }
}
