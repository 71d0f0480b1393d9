//! Periodic sweep of every known scan root
//!
//! Catches changes the watchers missed (network shares, dropped events,
//! changes made while the daemon was down).

use serde::{Deserialize, Serialize};
use shelf_catalog::{RunOutcome, ScanCoordinator, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// Seconds between sweeps (default: 1 hour)
    pub interval_secs: u64,
    /// Seconds after which a held run-lock is considered abandoned; 0 = never
    pub stale_lock_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60 * 60,
            stale_lock_secs: 24 * 60 * 60,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_lock_secs > 0).then(|| Duration::from_secs(self.stale_lock_secs))
    }
}

/// Sweep totals for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub completed: usize,
    pub failed: usize,
    pub contended: usize,
}

/// Periodically reconciles all known roots
pub struct Scheduler {
    coordinator: Arc<ScanCoordinator>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(coordinator: Arc<ScanCoordinator>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    /// Sweep every `interval` until `shutdown` flips to true
    ///
    /// The first sweep happens one full interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Starting scheduled sweeps (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let summary = self.sweep_once().await;
                    debug!("Scheduled sweep finished: {:?}", summary);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Reconcile every known root under one lock acquisition
    pub async fn sweep_once(&self) -> SweepSummary {
        let roots = match self.coordinator.known_roots().await {
            Ok(roots) => roots,
            Err(e) => {
                warn!("Scheduled sweep skipped: {}", e);
                return SweepSummary::default();
            }
        };
        if roots.is_empty() {
            debug!("Scheduled sweep: no roots registered");
            return SweepSummary::default();
        }

        let mut summary = SweepSummary::default();
        for (_, outcome) in self.coordinator.sweep(&roots, Trigger::Schedule).await {
            match outcome {
                RunOutcome::Completed(_) => summary.completed += 1,
                RunOutcome::Failed(_) => summary.failed += 1,
                RunOutcome::Contended => summary.contended += 1,
            }
        }

        if summary.contended > 0 {
            info!("Scheduled sweep skipped: scanner busy");
        } else {
            info!(
                "Scheduled sweep: {} root(s) reconciled, {} failed",
                summary.completed, summary.failed
            );
        }
        summary
    }
}
