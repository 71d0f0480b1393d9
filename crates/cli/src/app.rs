//! Composition root: every long-lived service, wired once per process

use crate::config::AppConfig;
use anyhow::{Context, Result};
use shelf_catalog::{
    ReconciliationEngine, ScanCoordinator, SledCatalog, SledRunLock, SledWorkQueue,
};
use shelf_core::{ArtifactCache, TreeScanner};
use std::sync::Arc;

/// Opened database and the services built on it
pub struct App {
    pub config: AppConfig,
    pub db: sled::Db,
    pub catalog: Arc<SledCatalog>,
    pub queue: Arc<SledWorkQueue>,
    pub lock: Arc<SledRunLock>,
    pub artifacts: ArtifactCache,
    pub engine: Arc<ReconciliationEngine>,
    pub coordinator: Arc<ScanCoordinator>,
}

impl App {
    pub fn open(config: AppConfig) -> Result<Self> {
        // sled allows one process per database
        let db = shelf_catalog::open_db(&config.data_dir).with_context(|| {
            format!(
                "Failed to open database in {} (is `shelf watch` already running?)",
                config.data_dir.display()
            )
        })?;

        let catalog = Arc::new(SledCatalog::open(&db).context("Failed to open catalog")?);
        let queue = Arc::new(SledWorkQueue::open(&db).context("Failed to open work queue")?);
        let lock = Arc::new(
            SledRunLock::open(&db)
                .context("Failed to open run-lock")?
                .with_stale_after(config.schedule.stale_after()),
        );
        // Only one process can have the database open, so a held lock is left
        // over from a run that was killed
        lock.clear_abandoned().context("Failed to clear abandoned run-lock")?;

        let artifacts = ArtifactCache::new(&config.cache_dir);
        let scanner = Arc::new(TreeScanner::new(config.scan.clone())?);
        let engine = Arc::new(ReconciliationEngine::new(
            scanner,
            catalog.clone(),
            artifacts.clone(),
        ));
        let coordinator = Arc::new(ScanCoordinator::new(engine.clone(), lock.clone()));

        Ok(Self {
            config,
            db,
            catalog,
            queue,
            lock,
            artifacts,
            engine,
            coordinator,
        })
    }

    /// Flush pending writes before exit
    pub async fn close(&self) -> Result<()> {
        self.db.flush_async().await.context("Failed to flush database")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_catalog::{RunLock, RunOutcome, Trigger, SCANNER_LOCK};
    use std::fs;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> AppConfig {
        AppConfig {
            data_dir: tmp.path().join("data"),
            cache_dir: tmp.path().join("cache"),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_killed_run_does_not_block_next_open() {
        let tmp = TempDir::new().unwrap();
        let library = tmp.path().join("library");
        fs::create_dir_all(&library).unwrap();
        fs::write(library.join("a.pdf"), b"a").unwrap();

        {
            // Exits holding the lock, like an interrupted `shelf scan`
            let app = App::open(config(&tmp)).unwrap();
            assert!(app.lock.try_acquire(SCANNER_LOCK).await.unwrap());
            app.close().await.unwrap();
        }

        let app = App::open(config(&tmp)).unwrap();
        assert!(!app.lock.state(SCANNER_LOCK).await.unwrap().running);

        let outcomes = app.coordinator.sweep(&[library], Trigger::Manual).await;
        assert_eq!(outcomes.len(), 1);
        assert!(
            matches!(&outcomes[0].1, RunOutcome::Completed(report) if report.inserted == 1),
            "{:?}",
            outcomes[0].1
        );
    }
}
