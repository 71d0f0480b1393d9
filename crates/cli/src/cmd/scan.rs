//! Manual, lock-guarded reconciliation

use anyhow::{bail, Result};
use cli_lib::{App, AppConfig};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use shelf_catalog::{RunOutcome, Trigger};
use std::path::PathBuf;
use std::time::Duration;

pub async fn run(config: AppConfig, roots: Vec<PathBuf>) -> Result<()> {
    let roots = super::resolve_roots(roots, &config.roots);
    if roots.is_empty() {
        bail!("No roots given and none configured (see `shelf config --example`)");
    }

    let app = App::open(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Reconciling {} root(s)...", roots.len()));

    let outcomes = app.coordinator.sweep(&roots, Trigger::Manual).await;
    spinner.finish_and_clear();
    app.close().await?;

    let mut failures = 0usize;
    for (root, outcome) in outcomes {
        println!("{}", root.display().to_string().bold());
        match outcome {
            RunOutcome::Completed(report) => {
                if report.created_root {
                    println!("  {}", "New root registered".cyan());
                }
                if report.is_noop() {
                    println!("  {} up to date", "✓".green());
                } else {
                    println!(
                        "  {} {} added, {} removed ({} with their folder)",
                        "✓".green(),
                        report.inserted,
                        report.removed_by_parent + report.removed_by_hash,
                        report.removed_by_parent
                    );
                }
                if report.resized > 0 {
                    println!("  {} artifact(s) rebuilt", report.resized);
                }
            }
            RunOutcome::Failed(reason) => {
                failures += 1;
                println!("  {} {}", "✗".red(), reason);
            }
            RunOutcome::Contended => {
                failures += 1;
                println!("  {}", "Skipped: another reconciliation is running".yellow());
            }
        }
    }

    if failures > 0 {
        bail!("{} root(s) were not reconciled", failures);
    }
    Ok(())
}
