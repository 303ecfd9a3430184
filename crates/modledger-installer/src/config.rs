use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LedgerLayout;

const MIN_KEY_LENGTH: usize = 6;
const MAX_KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory mod paths are stored relative to. Defaults to `<root>/mods`.
    pub mods_root: Option<PathBuf>,
    pub key_length: usize,
    pub pretty: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mods_root: None,
            key_length: 11,
            pretty: true,
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse ledger config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(layout: &LedgerLayout) -> Result<Self> {
        let path = layout.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read ledger config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid ledger config: {}", path.display()))
    }

    pub fn save(&self, layout: &LedgerLayout) -> Result<PathBuf> {
        self.validate()?;
        let path = layout.config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string(self).context("failed to serialize ledger config")?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write ledger config: {}", path.display()))?;
        Ok(path)
    }

    pub fn mods_root(&self, layout: &LedgerLayout) -> PathBuf {
        self.mods_root
            .clone()
            .unwrap_or_else(|| layout.mods_dir())
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&self.key_length) {
            bail!(
                "key_length must be between {MIN_KEY_LENGTH} and {MAX_KEY_LENGTH}, got {}",
                self.key_length
            );
        }
        Ok(())
    }
}
