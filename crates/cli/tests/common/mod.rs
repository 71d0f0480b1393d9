//! Helpers for driving the `shelf` binary against a throwaway library

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Library root, cache and database in one temp dir, plus a config file
pub struct TestLibrary {
    _tmp: TempDir,
    pub root: PathBuf,
    pub cache: PathBuf,
    pub data: PathBuf,
    pub config: PathBuf,
}

impl TestLibrary {
    pub fn new() -> Result<Self> {
        let tmp = TempDir::new()?;
        let root = tmp.path().join("library");
        let cache = tmp.path().join("cache");
        let data = tmp.path().join("data");
        fs::create_dir_all(&root)?;

        let config = tmp.path().join("shelf.toml");
        fs::write(
            &config,
            format!(
                "data_dir = {:?}\ncache_dir = {:?}\nroots = [{:?}]\n\n[schedule]\nenabled = false\n",
                data.display().to_string(),
                cache.display().to_string(),
                root.display().to_string(),
            ),
        )?;

        Ok(Self {
            _tmp: tmp,
            root,
            cache,
            data,
            config,
        })
    }

    /// Write a file under the root, creating parent folders
    pub fn touch(&self, rel: &str, bytes: usize) -> Result<PathBuf> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, vec![b'x'; bytes])?;
        Ok(path)
    }

    /// Folder of `pages` JPEG pages under the root
    pub fn comic(&self, rel: &str, pages: usize) -> Result<PathBuf> {
        for i in 1..=pages {
            self.touch(&format!("{rel}/{i:03}.jpg"), 4096)?;
        }
        Ok(self.root.join(rel))
    }

    /// `shelf --config <config> <args>`
    pub fn shelf(&self, args: &[&str]) -> Result<CommandResult> {
        let mut full = vec!["--config", path_str(&self.config)?];
        full.extend_from_slice(args);
        run(&full)
    }
}

#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn assert_success(self) -> Result<Self> {
        if !self.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nStdout: {}\nStderr: {}",
                self.exit_code,
                self.stdout,
                self.stderr
            );
        }
        Ok(self)
    }

    pub fn assert_failure(self) -> Result<Self> {
        if self.success() {
            anyhow::bail!("Command should have failed but succeeded:\nStdout: {}", self.stdout);
        }
        Ok(self)
    }
}

/// Run the `shelf` binary with `args`
pub fn run(args: &[&str]) -> Result<CommandResult> {
    let output = Command::new(env!("CARGO_BIN_EXE_shelf"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .context("Failed to execute shelf")?;

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().context("temp path is not UTF-8")
}
