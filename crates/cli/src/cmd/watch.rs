//! Watch daemon: watchers, debouncer, queue consumer and scheduler

use anyhow::{Context, Result};
use cli_lib::{App, AppConfig};
use shelf_catalog::Trigger;
use shelf_watcher::{Debouncer, QueueConsumer, Scheduler, WatchSet};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub async fn run(config: AppConfig) -> Result<()> {
    let configured = super::resolve_roots(Vec::new(), &config.roots);
    let app = App::open(config)?;

    // Register configured roots (first scan) and catch up on known ones
    let mut roots: BTreeSet<PathBuf> = app.coordinator.known_roots().await?.into_iter().collect();
    roots.extend(configured);
    let roots: Vec<PathBuf> = roots.into_iter().collect();

    if roots.is_empty() {
        warn!("No roots configured; nothing to watch");
    } else {
        info!("Initial reconciliation of {} root(s)", roots.len());
        app.coordinator.sweep(&roots, Trigger::Manual).await;
    }

    let (watch_set, events) = WatchSet::new(
        app.config.watch.clone(),
        Some(app.config.cache_dir.clone()),
    );
    for root in &roots {
        if let Err(e) = watch_set.watch(root) {
            error!("{}", e);
        }
    }

    let (stop_tx, stop_rx) = watch::channel(false);

    let debouncer = Debouncer::new(app.config.watch.debounce(), app.queue.clone());
    let debounce_task = tokio::spawn(debouncer.run(events));

    let consumer = QueueConsumer::new(
        app.queue.clone(),
        app.coordinator.clone(),
        app.config.watch.poll_interval(),
    );
    let consumer_task = tokio::spawn(consumer.run(stop_rx.clone()));

    let scheduler_task = app.config.schedule.enabled.then(|| {
        let scheduler = Scheduler::new(app.coordinator.clone(), app.config.schedule.interval());
        tokio::spawn(scheduler.run(stop_rx.clone()))
    });

    info!("Watching {} root(s); press Ctrl-C to stop", watch_set.len());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    // Dropping the watchers and the set closes the event channel
    watch_set.shutdown();
    drop(watch_set);
    let _ = stop_tx.send(true);

    debounce_task.await.context("Debouncer task failed")?;
    consumer_task.await.context("Queue consumer task failed")?;
    if let Some(task) = scheduler_task {
        task.await.context("Scheduler task failed")?;
    }

    app.close().await
}
