//! Configuration display command

use anyhow::Result;
use cli_lib::config::{config_file_path, example_config};
use cli_lib::AppConfig;
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration and where it came from
pub fn run_show(config: &AppConfig, explicit: Option<&Path>) -> Result<()> {
    let source = match explicit.map(Path::to_path_buf).or_else(config_file_path) {
        Some(path) if path.exists() => path.display().to_string(),
        Some(path) => format!("{} (not found, using defaults)", path.display()),
        None => "built-in defaults".to_string(),
    };

    println!("{}", "Effective Configuration".bold());
    println!("{}: {}\n", "Source".dimmed(), source.dimmed());
    println!("{}", config.to_toml()?);

    println!("{}", "Valid Ranges:".bold());
    println!("  scan.concurrency: 1-256");
    println!("  watch.debounce_ms: 10-60000");
    println!("  watch.poll_interval_ms: 10-60000");
    println!("  schedule.interval_secs: >= 60");
    println!("  schedule.stale_lock_secs: 0 = never take over");

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", example_config());
    Ok(())
}
