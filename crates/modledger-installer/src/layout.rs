use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const LEDGER_ROOT_ENV: &str = "MODLEDGER_ROOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLayout {
    root: PathBuf,
}

impl LedgerLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn install_log_path(&self) -> PathBuf {
        self.state_dir().join("install_log.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("ledger.toml")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.state_dir(), self.mods_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_ledger_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(LEDGER_ROOT_ENV) {
        if !root.trim().is_empty() {
            return Ok(PathBuf::from(root));
        }
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows ledger root")?;
        return Ok(PathBuf::from(app_data).join("Modledger"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve ledger root")?;
    Ok(PathBuf::from(home).join(".modledger"))
}
