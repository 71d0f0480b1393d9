//! Rebuild missing special-entry artifacts without rescanning

use anyhow::{bail, Result};
use cli_lib::{App, AppConfig};
use owo_colors::OwoColorize;
use shelf_catalog::{RunLock, SCANNER_LOCK};
use std::path::PathBuf;

pub async fn run(config: AppConfig, roots: Vec<PathBuf>) -> Result<()> {
    let app = App::open(config)?;
    let known = app.coordinator.known_roots().await?;
    let roots = super::resolve_roots(roots, &known);
    if roots.is_empty() {
        println!("{}", "No roots registered yet".dimmed());
        return Ok(());
    }

    if !app.lock.try_acquire(SCANNER_LOCK).await? {
        bail!("Another reconciliation is running; try again later");
    }

    let mut result = Ok(());
    for root in &roots {
        match app.engine.maintain(root).await {
            Ok(0) => println!("{} {}: nothing to rebuild", "✓".green(), root.display()),
            Ok(n) => println!("{} {}: {} artifact(s) rebuilt", "✓".green(), root.display(), n),
            Err(e) => {
                println!("{} {}: {}", "✗".red(), root.display(), e);
                result = Err(e.into());
                break;
            }
        }
    }

    app.lock.release(SCANNER_LOCK).await?;
    app.close().await?;
    result
}
