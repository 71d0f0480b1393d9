//! List registered scan roots

use anyhow::Result;
use cli_lib::util::format_absolute_time;
use cli_lib::{App, AppConfig};
use owo_colors::OwoColorize;
use shelf_catalog::CatalogGateway;

pub async fn run(config: AppConfig) -> Result<()> {
    let app = App::open(config)?;
    let roots = app.catalog.get_scan_roots().await?;

    if roots.is_empty() {
        println!("{}", "No roots registered yet".dimmed());
        return Ok(());
    }

    for root in roots {
        let files = app.catalog.count_files(root.id).await?;
        let updated = if root.directories.is_some() {
            format_absolute_time(root.timestamp_ms)
        } else {
            "never reconciled".to_string()
        };
        println!(
            "{:>4}  {}  {} entries  {}",
            root.id.to_string().yellow(),
            root.path.display(),
            files,
            updated.dimmed()
        );
    }

    Ok(())
}
