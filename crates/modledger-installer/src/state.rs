use modledger_core::{
    ActiveModRegistry, DataFilePath, GameValueKey, IniEditKey, Installer, ItemLedger, ModKey,
    ReservedInstaller,
};

use crate::keys::{generate_key, random_key_candidate};

/// Committed ledger contents: what is on disk once persisted.
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    pub(crate) registry: ActiveModRegistry,
    pub(crate) data_files: ItemLedger<DataFilePath, ()>,
    pub(crate) ini_edits: ItemLedger<IniEditKey, String>,
    pub(crate) game_values: ItemLedger<GameValueKey, Vec<u8>>,
}

impl LedgerState {
    /// Registers the sentinel installers that are missing; returns whether any were.
    pub(crate) fn ensure_reserved_installers(&mut self, key_length: usize) -> bool {
        let mut added = false;
        for reserved in ReservedInstaller::ALL {
            let installer = Installer::Reserved(reserved);
            if self.registry.is_registered(&installer.id()) {
                continue;
            }
            let key = generate_key(
                || random_key_candidate(key_length),
                |candidate| self.registry.key_exists(candidate),
            );
            self.registry.register_mod(installer, key, true);
            added = true;
        }
        added
    }

    pub(crate) fn original_value_key(&self) -> Option<&ModKey> {
        self.registry
            .key_of(&Installer::ORIGINAL_VALUE.id())
    }

    pub(crate) fn item_count(&self) -> usize {
        self.data_files.len() + self.ini_edits.len() + self.game_values.len()
    }
}
