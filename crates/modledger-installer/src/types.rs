use modledger_core::{ModDescriptor, ModKey};

/// A registered mod whose current version differs from the one it was installed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    pub key: ModKey,
    pub installed: ModDescriptor,
    pub current: ModDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    pub file_version: String,
    pub registered_mods: usize,
    pub visible_mods: usize,
    pub data_files: usize,
    pub ini_edits: usize,
    pub game_values: usize,
}
