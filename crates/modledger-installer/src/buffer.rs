use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use modledger_core::{
    ActiveModRegistry, DataFilePath, GameValueKey, IniEditKey, Installer, InstallerId,
    ItemLedger, ModKey, OwnershipStack,
};

use tracing::warn;

use crate::state::LedgerState;

/// Selects one tracked item kind in both the durable state and a buffer.
pub(crate) trait TrackedKind {
    type Item: Ord + Clone + fmt::Display;
    type Value: Clone;

    const LABEL: &'static str;

    fn durable(state: &LedgerState) -> &ItemLedger<Self::Item, Self::Value>;
    fn durable_mut(state: &mut LedgerState) -> &mut ItemLedger<Self::Item, Self::Value>;
    fn shadow(buffer: &TransactionBuffer) -> &ShadowLedger<Self::Item, Self::Value>;
    fn shadow_mut(buffer: &mut TransactionBuffer) -> &mut ShadowLedger<Self::Item, Self::Value>;
}

pub(crate) struct DataFiles;
pub(crate) struct IniEdits;
pub(crate) struct GameValues;

impl TrackedKind for DataFiles {
    type Item = DataFilePath;
    type Value = ();

    const LABEL: &'static str = "data file";

    fn durable(state: &LedgerState) -> &ItemLedger<Self::Item, Self::Value> {
        &state.data_files
    }

    fn durable_mut(state: &mut LedgerState) -> &mut ItemLedger<Self::Item, Self::Value> {
        &mut state.data_files
    }

    fn shadow(buffer: &TransactionBuffer) -> &ShadowLedger<Self::Item, Self::Value> {
        &buffer.data_files
    }

    fn shadow_mut(buffer: &mut TransactionBuffer) -> &mut ShadowLedger<Self::Item, Self::Value> {
        &mut buffer.data_files
    }
}

impl TrackedKind for IniEdits {
    type Item = IniEditKey;
    type Value = String;

    const LABEL: &'static str = "ini edit";

    fn durable(state: &LedgerState) -> &ItemLedger<Self::Item, Self::Value> {
        &state.ini_edits
    }

    fn durable_mut(state: &mut LedgerState) -> &mut ItemLedger<Self::Item, Self::Value> {
        &mut state.ini_edits
    }

    fn shadow(buffer: &TransactionBuffer) -> &ShadowLedger<Self::Item, Self::Value> {
        &buffer.ini_edits
    }

    fn shadow_mut(buffer: &mut TransactionBuffer) -> &mut ShadowLedger<Self::Item, Self::Value> {
        &mut buffer.ini_edits
    }
}

impl TrackedKind for GameValues {
    type Item = GameValueKey;
    type Value = Vec<u8>;

    const LABEL: &'static str = "game value";

    fn durable(state: &LedgerState) -> &ItemLedger<Self::Item, Self::Value> {
        &state.game_values
    }

    fn durable_mut(state: &mut LedgerState) -> &mut ItemLedger<Self::Item, Self::Value> {
        &mut state.game_values
    }

    fn shadow(buffer: &TransactionBuffer) -> &ShadowLedger<Self::Item, Self::Value> {
        &buffer.game_values
    }

    fn shadow_mut(buffer: &mut TransactionBuffer) -> &mut ShadowLedger<Self::Item, Self::Value> {
        &mut buffer.game_values
    }
}

/// Pending changes to one item kind.
#[derive(Debug)]
pub(crate) struct ShadowLedger<K, V> {
    installed: ItemLedger<K, V>,
    replaced: ItemLedger<K, V>,
    uninstalled: ItemLedger<K, ()>,
}

impl<K, V> Default for ShadowLedger<K, V> {
    fn default() -> Self {
        Self {
            installed: ItemLedger::default(),
            replaced: ItemLedger::default(),
            uninstalled: ItemLedger::default(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> ShadowLedger<K, V> {
    fn add(&mut self, item: &K, key: ModKey, value: V) {
        if let Some(stack) = self.uninstalled.get_mut(item) {
            stack.remove(&key);
        }
        if let Some(stack) = self.replaced.get_mut(item) {
            stack.remove(&key);
        }
        self.installed.get_or_create(item).push(key, value);
    }

    fn replace(&mut self, item: &K, key: ModKey, value: V) {
        if let Some(stack) = self.installed.get_mut(item) {
            if stack.overwrite(&key, value.clone()) {
                return;
            }
        }
        self.replaced.get_or_create(item).push(key, value);
    }

    fn remove(&mut self, item: &K, key: &ModKey) {
        if let Some(stack) = self.installed.get_mut(item) {
            stack.remove(key);
        }
        if let Some(stack) = self.replaced.get_mut(item) {
            stack.remove(key);
        }
        self.uninstalled.get_or_create(item).push(key.clone(), ());
    }

    /// The stack `item` would have if this buffer were committed now.
    fn merged(
        &self,
        durable: &ItemLedger<K, V>,
        item: &K,
        removed: &BTreeSet<ModKey>,
        remap: &KeyRemap,
    ) -> OwnershipStack<V> {
        let mut stack = durable.get(item).cloned().unwrap_or_default();
        for (from, to) in remap {
            stack.rekey(from, to);
        }
        if let Some(replaced) = self.replaced.get(item) {
            for entry in replaced.iter() {
                stack.overwrite(remapped(remap, &entry.key), entry.value.clone());
            }
        }
        if let Some(installed) = self.installed.get(item) {
            for entry in installed.iter() {
                stack.push(remapped(remap, &entry.key).clone(), entry.value.clone());
            }
        }
        if let Some(uninstalled) = self.uninstalled.get(item) {
            for entry in uninstalled.iter() {
                stack.remove(remapped(remap, &entry.key));
            }
        }
        stack.retain_keys(|key| !removed.contains(key));
        stack
    }

    fn items_with_key(
        &self,
        durable: &ItemLedger<K, V>,
        key: &ModKey,
        removed: &BTreeSet<ModKey>,
        remap: &KeyRemap,
    ) -> Vec<K> {
        let key = remapped(remap, key);
        let candidates = durable
            .items()
            .chain(self.installed.items())
            .cloned()
            .collect::<BTreeSet<_>>();
        candidates
            .into_iter()
            .filter(|item| self.merged(durable, item, removed, remap).contains(key))
            .collect()
    }

    /// Returns how many entries were dropped for keys `registry` does not hold.
    fn merge_into(
        &self,
        durable: &mut ItemLedger<K, V>,
        registry: &ActiveModRegistry,
        removed: &BTreeSet<ModKey>,
        remap: &KeyRemap,
        original_key: Option<&ModKey>,
    ) -> usize {
        let is_original = |key: &ModKey| original_key == Some(key);

        for (from, to) in remap {
            durable.rekey_everywhere(from, to);
        }

        for (item, stack) in self.installed.iter() {
            let nothing_to_track = stack.current().is_some_and(|top| is_original(&top.key));
            if nothing_to_track && !durable.contains(item) {
                continue;
            }
            let target = durable.get_or_create(item);
            for entry in stack.iter() {
                target.push(remapped(remap, &entry.key).clone(), entry.value.clone());
            }
        }

        for (item, stack) in self.replaced.iter() {
            if let Some(target) = durable.get_mut(item) {
                for entry in stack.iter() {
                    target.overwrite(remapped(remap, &entry.key), entry.value.clone());
                }
            }
        }

        for (item, stack) in self.uninstalled.iter() {
            if let Some(target) = durable.get_mut(item) {
                for entry in stack.iter() {
                    target.remove(remapped(remap, &entry.key));
                }
            }
        }

        for key in removed {
            durable.remove_key_everywhere(key);
        }

        let orphaned = durable.retain_entries(|key| registry.key_exists(key));

        durable.retain(|_, stack| match stack.current() {
            Some(top) => !is_original(&top.key),
            None => false,
        });
        orphaned
    }

    fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.replaced.is_empty() && self.uninstalled.is_empty()
    }
}

/// Keys a commit folds into another key, as `from -> to`.
type KeyRemap = BTreeMap<ModKey, ModKey>;

fn remapped<'k>(remap: &'k KeyRemap, key: &'k ModKey) -> &'k ModKey {
    remap.get(key).unwrap_or(key)
}

/// Write-ahead overlay for one transaction. Nothing here touches the durable
/// state until [`TransactionBuffer::merge_into`] runs.
#[derive(Debug, Default)]
pub(crate) struct TransactionBuffer {
    registry: ActiveModRegistry,
    removed_keys: BTreeSet<ModKey>,
    data_files: ShadowLedger<DataFilePath, ()>,
    ini_edits: ShadowLedger<IniEditKey, String>,
    game_values: ShadowLedger<GameValueKey, Vec<u8>>,
}

impl TransactionBuffer {
    pub(crate) fn is_empty(&self) -> bool {
        self.registry.is_empty()
            && self.removed_keys.is_empty()
            && self.data_files.is_empty()
            && self.ini_edits.is_empty()
            && self.game_values.is_empty()
    }

    pub(crate) fn key_taken(&self, key: &ModKey) -> bool {
        self.registry.key_exists(key)
    }

    /// Key the installer holds in the merged view, including one marked for removal.
    pub(crate) fn assigned_key(&self, durable: &LedgerState, id: &InstallerId) -> Option<ModKey> {
        if let Some(key) = self.registry.key_of(id) {
            return Some(key.clone());
        }
        let key = durable.registry.key_of(id)?;
        match self.registry.mod_of(key) {
            Some(holder) if &holder.id() != id => None,
            _ => Some(key.clone()),
        }
    }

    pub(crate) fn key_of(&self, durable: &LedgerState, id: &InstallerId) -> Option<ModKey> {
        self.assigned_key(durable, id)
            .filter(|key| !self.removed_keys.contains(key))
    }

    pub(crate) fn installer_for(&self, durable: &LedgerState, key: &ModKey) -> Option<Installer> {
        if self.removed_keys.contains(key) {
            return None;
        }
        self.registry
            .mod_of(key)
            .or_else(|| durable.registry.mod_of(key))
            .cloned()
    }

    pub(crate) fn is_hidden(&self, durable: &LedgerState, id: &InstallerId) -> bool {
        if self.registry.is_registered(id) {
            return self.registry.is_mod_hidden(id);
        }
        self.key_of(durable, id).is_some() && durable.registry.is_mod_hidden(id)
    }

    pub(crate) fn registered_mods(&self, durable: &LedgerState) -> Vec<(ModKey, Installer)> {
        let mut merged = BTreeMap::new();
        for (key, installer) in durable.registry.iter() {
            if self.registry.is_registered(&installer.id()) {
                continue;
            }
            merged.insert(key.clone(), installer.clone());
        }
        for (key, installer) in self.registry.iter() {
            merged.insert(key.clone(), installer.clone());
        }
        merged
            .into_iter()
            .filter(|(key, _)| !self.removed_keys.contains(key))
            .collect()
    }

    /// Keys this buffer's registrations supersede in `durable`.
    ///
    /// An installer given a fresh key here while `durable` already holds it
    /// under another key keeps the durable key. An installer moved onto a key
    /// `durable` already knows brings its previous durable key along.
    fn key_remap(&self, durable: &LedgerState) -> KeyRemap {
        let mut remap = KeyRemap::new();
        for (key, installer) in self.registry.iter() {
            let Some(durable_key) = durable.registry.key_of(&installer.id()) else {
                continue;
            };
            if durable_key == key || self.removed_keys.contains(durable_key) {
                continue;
            }
            if durable.registry.key_exists(key) {
                remap.insert(durable_key.clone(), key.clone());
            } else {
                remap.insert(key.clone(), durable_key.clone());
            }
        }
        remap
    }

    pub(crate) fn register(&mut self, installer: Installer, key: ModKey, hidden: bool) {
        self.removed_keys.remove(&key);
        self.registry.register_mod(installer, key, hidden);
    }

    pub(crate) fn add<K: TrackedKind>(&mut self, item: &K::Item, key: ModKey, value: K::Value) {
        K::shadow_mut(self).add(item, key, value);
    }

    pub(crate) fn replace<K: TrackedKind>(
        &mut self,
        item: &K::Item,
        key: ModKey,
        value: K::Value,
    ) {
        K::shadow_mut(self).replace(item, key, value);
    }

    pub(crate) fn remove<K: TrackedKind>(&mut self, item: &K::Item, key: &ModKey) {
        K::shadow_mut(self).remove(item, key);
    }

    pub(crate) fn merged_stack<K: TrackedKind>(
        &self,
        durable: &LedgerState,
        item: &K::Item,
    ) -> OwnershipStack<K::Value> {
        let remap = self.key_remap(durable);
        K::shadow(self).merged(K::durable(durable), item, &self.removed_keys, &remap)
    }

    pub(crate) fn items_owned_by<K: TrackedKind>(
        &self,
        durable: &LedgerState,
        key: &ModKey,
    ) -> Vec<K::Item> {
        if self.removed_keys.contains(key) {
            return Vec::new();
        }
        let remap = self.key_remap(durable);
        K::shadow(self).items_with_key(K::durable(durable), key, &self.removed_keys, &remap)
    }

    /// Marks `key` for removal and evicts it from every item it owns.
    pub(crate) fn remove_installer(&mut self, durable: &LedgerState, key: &ModKey) -> usize {
        let files = self.items_owned_by::<DataFiles>(durable, key);
        let edits = self.items_owned_by::<IniEdits>(durable, key);
        let values = self.items_owned_by::<GameValues>(durable, key);
        let evicted = files.len() + edits.len() + values.len();

        for item in &files {
            self.remove::<DataFiles>(item, key);
        }
        for item in &edits {
            self.remove::<IniEdits>(item, key);
        }
        for item in &values {
            self.remove::<GameValues>(item, key);
        }

        self.registry.deregister_key(key);
        self.removed_keys.insert(key.clone());
        evicted
    }

    /// Applies every pending change to `durable`. Registrations go first and
    /// removals last so a key can be reused within one transaction.
    pub(crate) fn merge_into(&self, durable: &mut LedgerState) {
        let remap = self.key_remap(durable);
        for (key, installer) in self.registry.iter() {
            let hidden = self.registry.is_mod_hidden(&installer.id());
            let key = remapped(&remap, key);
            durable
                .registry
                .register_mod(installer.clone(), key.clone(), hidden);
        }

        let original_key = durable.original_value_key().cloned();
        let orphaned = self.data_files.merge_into(
            &mut durable.data_files,
            &durable.registry,
            &self.removed_keys,
            &remap,
            original_key.as_ref(),
        ) + self.ini_edits.merge_into(
            &mut durable.ini_edits,
            &durable.registry,
            &self.removed_keys,
            &remap,
            original_key.as_ref(),
        ) + self.game_values.merge_into(
            &mut durable.game_values,
            &durable.registry,
            &self.removed_keys,
            &remap,
            original_key.as_ref(),
        );
        if orphaned > 0 {
            warn!(orphaned, "dropped ownership entries for unregistered mod keys");
        }

        for key in &self.removed_keys {
            durable.registry.deregister_key(key);
        }
    }
}
