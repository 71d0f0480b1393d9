//! shelf CLI - library scan-and-reconcile

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// shelf - keep a media library catalog in sync with the filesystem
#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/shelf/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile roots now (default: all configured roots)
    Scan {
        /// Roots to reconcile
        roots: Vec<PathBuf>,
    },
    /// Watch roots and reconcile on change until Ctrl-C
    Watch,
    /// Show run-lock state, queue depth and per-root counts
    Status,
    /// Rebuild missing artifacts of comic, EPUB and audiobook entries
    Maintain {
        /// Roots to maintain (default: all known roots)
        roots: Vec<PathBuf>,
    },
    /// List registered scan roots
    Roots,
    /// Show the effective configuration
    Config {
        /// Print an annotated example instead
        #[arg(long)]
        example: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { example: true } = cli.command {
        return cmd::config::run_example();
    }

    let config = cli_lib::config::load(cli.config.as_deref())?;

    // The daemon also keeps a rolling log file next to its database
    let log_dir = matches!(cli.command, Commands::Watch).then(|| config.data_dir.join("logs"));
    let _guard = cli_lib::logging::init(cli.verbose, log_dir.as_deref())?;

    match cli.command {
        Commands::Scan { roots } => cmd::scan::run(config, roots).await,
        Commands::Watch => cmd::watch::run(config).await,
        Commands::Status => cmd::status::run(config).await,
        Commands::Maintain { roots } => cmd::maintain::run(config, roots).await,
        Commands::Roots => cmd::roots::run(config).await,
        Commands::Config { .. } => cmd::config::run_show(&config, cli.config.as_deref()),
    }
}
