//! Lock-guarded entry point for every reconciliation

use crate::error::Result;
use crate::lock::RunLock;
use crate::queue::{ScanRequest, Trigger};
use crate::reconcile::{ReconcileReport, ReconciliationEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Run-lock key shared by watch, schedule and manual triggers
pub const SCANNER_LOCK: &str = "scanner";

/// Result of one coordinated run
#[derive(Debug)]
pub enum RunOutcome {
    Completed(ReconcileReport),
    /// Reconciliation failed; the lock was released
    Failed(String),
    /// Another reconciliation held the lock; nothing was done
    Contended,
}

impl RunOutcome {
    pub fn is_contended(&self) -> bool {
        matches!(self, Self::Contended)
    }
}

/// Serializes reconciliations through the run-lock
pub struct ScanCoordinator {
    engine: Arc<ReconciliationEngine>,
    lock: Arc<dyn RunLock>,
}

impl ScanCoordinator {
    pub fn new(engine: Arc<ReconciliationEngine>, lock: Arc<dyn RunLock>) -> Self {
        Self { engine, lock }
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Reconcile the request's root if the lock is free
    pub async fn run(&self, request: &ScanRequest) -> RunOutcome {
        let roots = [request.root.clone()];
        self.sweep(&roots, request.trigger)
            .await
            .pop()
            .map(|(_, outcome)| outcome)
            .unwrap_or(RunOutcome::Contended)
    }

    /// Reconcile several roots under a single lock acquisition
    ///
    /// On contention every root is reported as `Contended`.
    pub async fn sweep(&self, roots: &[PathBuf], trigger: Trigger) -> Vec<(PathBuf, RunOutcome)> {
        match self.lock.try_acquire(SCANNER_LOCK).await {
            Ok(true) => {}
            Ok(false) => {
                info!("Scanner busy, dropping {} request for {} root(s)", trigger, roots.len());
                return roots
                    .iter()
                    .map(|root| (root.clone(), RunOutcome::Contended))
                    .collect();
            }
            Err(e) => {
                error!("Could not take scanner lock: {}", e);
                let msg = e.to_string();
                return roots
                    .iter()
                    .map(|root| (root.clone(), RunOutcome::Failed(msg.clone())))
                    .collect();
            }
        }

        let mut outcomes = Vec::with_capacity(roots.len());
        for root in roots {
            outcomes.push((root.clone(), self.reconcile_one(root, trigger).await));
        }

        if let Err(e) = self.lock.release(SCANNER_LOCK).await {
            error!("Failed to release scanner lock: {}", e);
        }
        outcomes
    }

    /// Paths of every registered scan root
    pub async fn known_roots(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .engine
            .gateway()
            .get_scan_roots()
            .await?
            .into_iter()
            .map(|root| root.path)
            .collect())
    }

    async fn reconcile_one(&self, root: &Path, trigger: Trigger) -> RunOutcome {
        info!("Starting {} reconciliation of {}", trigger, root.display());
        match self.engine.reconcile(root).await {
            Ok(report) => RunOutcome::Completed(report),
            Err(e) => {
                error!("Reconciliation of {} failed: {}", root.display(), e);
                RunOutcome::Failed(e.to_string())
            }
        }
    }
}
