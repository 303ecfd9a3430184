use anyhow::{bail, Result};
use modledger_core::{
    DataFilePath, GameValueKey, IniEditKey, Installer, InstallerId, ModKey, OwnershipStack,
};
use tracing::debug;

use crate::buffer::{DataFiles, GameValues, IniEdits, TrackedKind};
use crate::ledger::ModInstallLedger;
use crate::transactions::TransactionId;

/// Queries and mutations over the install ledger.
///
/// Implemented by [`ModInstallLedger`], where every mutation commits and
/// persists immediately, and by [`crate::LedgerTransaction`], where mutations
/// stay buffered in the transaction and reads see them.
pub trait InstallLog {
    fn ledger(&self) -> &ModInstallLedger;

    fn transaction_id(&self) -> Option<TransactionId>;

    /// Registers `installer` as a visible mod and returns its key.
    fn register_mod(&self, installer: &Installer) -> Result<ModKey> {
        register(self.ledger(), self.transaction_id(), installer, false)
    }

    /// Registers `installer` without adding it to the visible mod list.
    fn register_hidden_mod(&self, installer: &Installer) -> Result<ModKey> {
        register(self.ledger(), self.transaction_id(), installer, true)
    }

    /// Moves the key held by `old` to `new`, carrying over every item `old` owns.
    fn replace_mod(&self, old: &Installer, new: &Installer) -> Result<ModKey> {
        let ledger = self.ledger();
        let old = ledger.canonical(old);
        let new = ledger.canonical(new);
        if old.is_reserved() || new.is_reserved() {
            bail!("sentinel installers cannot be replaced");
        }
        ledger.write(self.transaction_id(), |writer| {
            let old_id = old.id();
            let Some(key) = writer.existing_key(&old_id) else {
                return Ok(writer.key_for(&new, false));
            };
            let hidden = writer.buffer.is_hidden(writer.durable, &old_id);
            writer.buffer.register(new.clone(), key.clone(), hidden);
            debug!(old = %old_id, new = %new.id(), %key, "replaced mod");
            Ok(key)
        })
    }

    /// Uninstalls `id` from every item it owns and forgets its key.
    /// Returns `false` when the installer is not registered.
    fn remove_mod(&self, id: &InstallerId) -> Result<bool> {
        if id.is_reserved() {
            bail!("sentinel installer '{id}' cannot be removed");
        }
        let ledger = self.ledger();
        let id = ledger.canonical_id(id);
        ledger.write(self.transaction_id(), |writer| {
            let Some(key) = writer.existing_key(&id) else {
                return Ok(false);
            };
            let evicted = writer.buffer.remove_installer(writer.durable, &key);
            debug!(installer = %id, %key, evicted, "removed mod");
            Ok(true)
        })
    }

    fn mod_key(&self, id: &InstallerId) -> Option<ModKey> {
        let ledger = self.ledger();
        let id = ledger.canonical_id(id);
        ledger.read(self.transaction_id(), |buffer, durable| {
            buffer.key_of(durable, &id)
        })
    }

    fn mod_for_key(&self, key: &ModKey) -> Option<Installer> {
        let ledger = self.ledger();
        let recorded = ledger.read(self.transaction_id(), |buffer, durable| {
            buffer.installer_for(durable, key)
        })?;
        Some(ledger.resolve_live(recorded))
    }

    fn is_mod_hidden(&self, id: &InstallerId) -> bool {
        let ledger = self.ledger();
        let id = ledger.canonical_id(id);
        ledger.read(self.transaction_id(), |buffer, durable| {
            buffer.is_hidden(durable, &id)
        })
    }

    /// Every registered installer, sentinels included, ordered by key.
    fn registered_mods(&self) -> Vec<(ModKey, Installer)> {
        self.ledger().read(self.transaction_id(), |buffer, durable| {
            buffer.registered_mods(durable)
        })
    }

    fn add_data_file(&self, installer: &Installer, path: &str) -> Result<()> {
        add_item::<DataFiles>(
            self.ledger(),
            self.transaction_id(),
            installer,
            &DataFilePath::new(path),
            (),
        )
    }

    fn remove_data_file(&self, installer: &Installer, path: &str) -> Result<()> {
        remove_item::<DataFiles>(
            self.ledger(),
            self.transaction_id(),
            installer,
            &DataFilePath::new(path),
        )
    }

    /// Records that `path` existed before any mod touched it.
    fn log_original_data_file(&self, path: &str) -> Result<()> {
        log_original::<DataFiles>(
            self.ledger(),
            self.transaction_id(),
            &DataFilePath::new(path),
            (),
        )
    }

    fn current_file_owner(&self, path: &str) -> Option<Installer> {
        current_owner::<DataFiles>(self, &DataFilePath::new(path))
    }

    fn previous_file_owner(&self, path: &str) -> Option<Installer> {
        previous_owner::<DataFiles>(self, &DataFilePath::new(path))
    }

    /// Installers of `path`, oldest first.
    fn file_installers(&self, path: &str) -> Vec<Installer> {
        installers::<DataFiles>(self, &DataFilePath::new(path))
    }

    fn installed_files(&self, id: &InstallerId) -> Vec<DataFilePath> {
        owned_items::<DataFiles>(self, id)
    }

    fn add_ini_edit(&self, installer: &Installer, edit: &IniEditKey, value: &str) -> Result<()> {
        add_item::<IniEdits>(
            self.ledger(),
            self.transaction_id(),
            installer,
            edit,
            value.to_string(),
        )
    }

    /// Overwrites the value `installer` wrote for `edit` without changing
    /// its position. No-op when `installer` has no entry for `edit`.
    fn replace_ini_edit(
        &self,
        installer: &Installer,
        edit: &IniEditKey,
        value: &str,
    ) -> Result<()> {
        replace_item::<IniEdits>(
            self.ledger(),
            self.transaction_id(),
            installer,
            edit,
            value.to_string(),
        )
    }

    fn remove_ini_edit(&self, installer: &Installer, edit: &IniEditKey) -> Result<()> {
        remove_item::<IniEdits>(self.ledger(), self.transaction_id(), installer, edit)
    }

    fn log_original_ini_value(&self, edit: &IniEditKey, value: &str) -> Result<()> {
        log_original::<IniEdits>(
            self.ledger(),
            self.transaction_id(),
            edit,
            value.to_string(),
        )
    }

    fn current_ini_edit_owner(&self, edit: &IniEditKey) -> Option<Installer> {
        current_owner::<IniEdits>(self, edit)
    }

    fn previous_ini_edit_owner(&self, edit: &IniEditKey) -> Option<Installer> {
        previous_owner::<IniEdits>(self, edit)
    }

    /// Value to restore when the current owner of `edit` goes away.
    fn previous_ini_value(&self, edit: &IniEditKey) -> Option<String> {
        previous_value::<IniEdits>(self, edit)
    }

    fn ini_edit_installers(&self, edit: &IniEditKey) -> Vec<Installer> {
        installers::<IniEdits>(self, edit)
    }

    fn installed_ini_edits(&self, id: &InstallerId) -> Vec<IniEditKey> {
        owned_items::<IniEdits>(self, id)
    }

    fn add_game_value_edit(
        &self,
        installer: &Installer,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        add_item::<GameValues>(
            self.ledger(),
            self.transaction_id(),
            installer,
            &key.to_string(),
            value.to_vec(),
        )
    }

    fn replace_game_value_edit(
        &self,
        installer: &Installer,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        replace_item::<GameValues>(
            self.ledger(),
            self.transaction_id(),
            installer,
            &key.to_string(),
            value.to_vec(),
        )
    }

    fn remove_game_value_edit(&self, installer: &Installer, key: &str) -> Result<()> {
        remove_item::<GameValues>(
            self.ledger(),
            self.transaction_id(),
            installer,
            &key.to_string(),
        )
    }

    fn log_original_game_value(&self, key: &str, value: &[u8]) -> Result<()> {
        log_original::<GameValues>(
            self.ledger(),
            self.transaction_id(),
            &key.to_string(),
            value.to_vec(),
        )
    }

    fn current_game_value_owner(&self, key: &str) -> Option<Installer> {
        current_owner::<GameValues>(self, &key.to_string())
    }

    fn previous_game_value_owner(&self, key: &str) -> Option<Installer> {
        previous_owner::<GameValues>(self, &key.to_string())
    }

    fn previous_game_value(&self, key: &str) -> Option<Vec<u8>> {
        previous_value::<GameValues>(self, &key.to_string())
    }

    fn game_value_installers(&self, key: &str) -> Vec<Installer> {
        installers::<GameValues>(self, &key.to_string())
    }

    fn installed_game_values(&self, id: &InstallerId) -> Vec<GameValueKey> {
        owned_items::<GameValues>(self, id)
    }
}

fn register(
    ledger: &ModInstallLedger,
    txid: Option<TransactionId>,
    installer: &Installer,
    hidden: bool,
) -> Result<ModKey> {
    let installer = ledger.canonical(installer);
    let hidden = hidden || installer.is_reserved();
    ledger.write(txid, |writer| {
        let key = match writer.buffer.assigned_key(writer.durable, &installer.id()) {
            Some(key) => key,
            None => writer.allocate_key(),
        };
        writer.buffer.register(installer.clone(), key.clone(), hidden);
        debug!(installer = %installer.id(), %key, hidden, "registered mod");
        Ok(key)
    })
}

fn add_item<K: TrackedKind>(
    ledger: &ModInstallLedger,
    txid: Option<TransactionId>,
    installer: &Installer,
    item: &K::Item,
    value: K::Value,
) -> Result<()> {
    let installer = ledger.canonical(installer);
    ledger.write(txid, |writer| {
        let key = writer.key_for(&installer, installer.is_reserved());
        debug!(kind = K::LABEL, %item, %key, "recorded install");
        writer.buffer.add::<K>(item, key, value);
        Ok(())
    })
}

fn replace_item<K: TrackedKind>(
    ledger: &ModInstallLedger,
    txid: Option<TransactionId>,
    installer: &Installer,
    item: &K::Item,
    value: K::Value,
) -> Result<()> {
    let installer = ledger.canonical(installer);
    ledger.write(txid, |writer| {
        if let Some(key) = writer.existing_key(&installer.id()) {
            writer.buffer.replace::<K>(item, key, value);
        }
        Ok(())
    })
}

fn remove_item<K: TrackedKind>(
    ledger: &ModInstallLedger,
    txid: Option<TransactionId>,
    installer: &Installer,
    item: &K::Item,
) -> Result<()> {
    let installer = ledger.canonical(installer);
    ledger.write(txid, |writer| {
        if let Some(key) = writer.existing_key(&installer.id()) {
            debug!(kind = K::LABEL, %item, %key, "recorded uninstall");
            writer.buffer.remove::<K>(item, &key);
        }
        Ok(())
    })
}

fn log_original<K: TrackedKind>(
    ledger: &ModInstallLedger,
    txid: Option<TransactionId>,
    item: &K::Item,
    value: K::Value,
) -> Result<()> {
    ledger.write(txid, |writer| {
        if !writer.buffer.merged_stack::<K>(writer.durable, item).is_empty() {
            return Ok(());
        }
        let key = writer.key_for(&Installer::ORIGINAL_VALUE, true);
        writer.buffer.add::<K>(item, key, value);
        Ok(())
    })
}

fn stack_with_installers<K: TrackedKind>(
    log: &(impl InstallLog + ?Sized),
    item: &K::Item,
) -> (OwnershipStack<K::Value>, Vec<Option<Installer>>) {
    let ledger = log.ledger();
    let (stack, installers) = ledger.merged_stack::<K>(log.transaction_id(), item);
    let installers = installers
        .into_iter()
        .map(|installer| installer.map(|installer| ledger.resolve_live(installer)))
        .collect();
    (stack, installers)
}

fn current_owner<K: TrackedKind>(
    log: &(impl InstallLog + ?Sized),
    item: &K::Item,
) -> Option<Installer> {
    let (_, mut installers) = stack_with_installers::<K>(log, item);
    installers.pop().flatten()
}

fn previous_owner<K: TrackedKind>(
    log: &(impl InstallLog + ?Sized),
    item: &K::Item,
) -> Option<Installer> {
    let (_, mut installers) = stack_with_installers::<K>(log, item);
    installers.pop()?;
    installers.pop().flatten()
}

fn previous_value<K: TrackedKind>(
    log: &(impl InstallLog + ?Sized),
    item: &K::Item,
) -> Option<K::Value> {
    let (stack, _) = log
        .ledger()
        .merged_stack::<K>(log.transaction_id(), item);
    stack.previous().map(|entry| entry.value.clone())
}

fn installers<K: TrackedKind>(
    log: &(impl InstallLog + ?Sized),
    item: &K::Item,
) -> Vec<Installer> {
    stack_with_installers::<K>(log, item)
        .1
        .into_iter()
        .flatten()
        .collect()
}

fn owned_items<K: TrackedKind>(
    log: &(impl InstallLog + ?Sized),
    id: &InstallerId,
) -> Vec<K::Item> {
    let ledger = log.ledger();
    let id = ledger.canonical_id(id);
    ledger.read(log.transaction_id(), |buffer, durable| {
        buffer
            .key_of(durable, &id)
            .map(|key| buffer.items_owned_by::<K>(durable, &key))
            .unwrap_or_default()
    })
}
