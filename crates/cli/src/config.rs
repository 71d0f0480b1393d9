//! Application configuration (TOML)
//!
//! Looked up at `--config PATH`, else `<config dir>/shelf/config.toml`. A
//! missing default file means built-in defaults; every section is optional.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use shelf_core::hash::strip_trailing_separator;
use shelf_core::ScanConfig;
use shelf_watcher::{ScheduleConfig, WatchConfig};
use std::path::{Path, PathBuf};

/// Effective configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database location (catalog, run-lock, queue)
    pub data_dir: PathBuf,
    /// Download artifacts of special folders
    pub cache_dir: PathBuf,
    /// Library roots to scan and watch
    pub roots: Vec<PathBuf>,
    pub scan: ScanConfig,
    pub watch: WatchConfig,
    pub schedule: ScheduleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join("shelf");
        Self {
            data_dir: base(dirs::data_dir()),
            cache_dir: base(dirs::cache_dir()),
            roots: vec![],
            scan: ScanConfig::default(),
            watch: WatchConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document, expanding `~/` and validating
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(text).context("Invalid configuration file")?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.data_dir = expand_home(&self.data_dir);
        self.cache_dir = expand_home(&self.cache_dir);
        for root in &mut self.roots {
            *root = strip_trailing_separator(&expand_home(root));
        }
    }

    /// Reject values outside their supported ranges
    pub fn validate(&self) -> Result<()> {
        if !(1..=256).contains(&self.scan.concurrency) {
            bail!("scan.concurrency must be between 1 and 256 (got {})", self.scan.concurrency);
        }
        if !(10..=60_000).contains(&self.watch.debounce_ms) {
            bail!("watch.debounce_ms must be between 10 and 60000 (got {})", self.watch.debounce_ms);
        }
        if !(10..=60_000).contains(&self.watch.poll_interval_ms) {
            bail!(
                "watch.poll_interval_ms must be between 10 and 60000 (got {})",
                self.watch.poll_interval_ms
            );
        }
        if self.schedule.interval_secs < 60 {
            bail!(
                "schedule.interval_secs must be at least 60 (got {})",
                self.schedule.interval_secs
            );
        }
        for root in &self.roots {
            if !root.is_absolute() {
                bail!("root must be an absolute path: {}", root.display());
            }
            // Artifacts inside a root would be cataloged as library files
            if self.cache_dir.starts_with(root) {
                bail!(
                    "cache_dir {} must not be inside root {}",
                    self.cache_dir.display(),
                    root.display()
                );
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Default config file location
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shelf").join("config.toml"))
}

/// Load configuration from `path`, or from the default location
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let (path, required) = match path {
        Some(path) => (Some(path.to_path_buf()), true),
        None => (config_file_path(), false),
    };

    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    if !path.exists() {
        if required {
            bail!("Config file not found: {}", path.display());
        }
        return Ok(AppConfig::default());
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    AppConfig::from_toml(&text).with_context(|| format!("In {}", path.display()))
}

/// Annotated example configuration
pub fn example_config() -> &'static str {
    r#"# shelf configuration

# Database (catalog, run-lock, work queue)
data_dir = "~/.local/share/shelf"

# Zip artifacts for comic, EPUB and audiobook folders; keep outside the roots
cache_dir = "~/.cache/shelf"

# Library roots to scan and watch
roots = ["/srv/books"]

[scan]
# Directory reads in flight at once (1-256)
concurrency = 8

[scan.classifier]
# Comic folders must use a single image extension
strict_comics = true

[watch]
# Quiet period before a changed root is rescanned (10-60000 ms)
debounce_ms = 1000
# Work queue poll interval (10-60000 ms)
poll_interval_ms = 1000
# Extra gitignore-style patterns whose changes never trigger a scan
ignore_patterns = ["@eaDir/", "*.nfo"]

[schedule]
# Periodic sweep of every known root
enabled = true
interval_secs = 3600
# Take over a run-lock held longer than this (0 = never)
stale_lock_secs = 86400
"#
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
