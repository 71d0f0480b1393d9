//! Show run-lock, queue and per-root status

use anyhow::Result;
use cli_lib::util::{format_absolute_time, format_relative_time};
use cli_lib::{App, AppConfig};
use owo_colors::OwoColorize;
use shelf_catalog::{CatalogGateway, RunLock, WorkQueue, SCANNER_LOCK};

pub async fn run(config: AppConfig) -> Result<()> {
    let app = App::open(config)?;
    let lock = app.lock.state(SCANNER_LOCK).await?;
    let roots = app.catalog.get_scan_roots().await?;

    println!("{}", "Library Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    print!("Scanner:       ");
    match (lock.running, lock.started_at_ms) {
        (true, Some(started)) => println!(
            "{} (since {})",
            "Running".green(),
            format_relative_time(started)
        ),
        (true, None) => println!("{}", "Running".green()),
        (false, _) => println!("{}", "Idle".dimmed()),
    }

    print!("Last scan:     ");
    match lock.last_scan_ms {
        Some(ts) => println!(
            "{} ({})",
            format_relative_time(ts),
            format_absolute_time(ts).dimmed()
        ),
        None => println!("{}", "never".dimmed()),
    }

    println!("Queued scans:  {}", app.queue.len());
    println!();

    println!("Roots:");
    if roots.is_empty() {
        println!("  {}", "No roots registered yet".dimmed());
        println!("  {}", "Tip: run 'shelf scan <ROOT>' to add one".dimmed());
    }
    for root in &roots {
        let files = app.catalog.count_files(root.id).await?;
        let dirs = root.tree()?.map(|tree| tree.len()).unwrap_or(0);
        println!("  {}", root.path.display().to_string().cyan());
        println!("    Entries:     {}", files);
        println!("    Directories: {}", dirs);
        println!(
            "    Updated:     {}",
            format_relative_time(root.timestamp_ms)
        );
    }

    Ok(())
}
