use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::identity::{Installer, InstallerId, ModKey};

/// Ordered list of mods presented as active, shared with presentation layers.
///
/// Clones observe the same list. `revision` moves forward on every change so
/// a poller can tell whether its copy is stale.
#[derive(Debug, Clone, Default)]
pub struct VisibleModsView {
    inner: Arc<VisibleModsInner>,
}

#[derive(Debug, Default)]
struct VisibleModsInner {
    mods: RwLock<Vec<Installer>>,
    revision: AtomicU64,
}

impl VisibleModsView {
    pub fn snapshot(&self) -> Vec<Installer> {
        self.inner.mods.read().clone()
    }

    /// Snapshot together with the revision it was taken at.
    pub fn snapshot_with_revision(&self) -> (u64, Vec<Installer>) {
        let mods = self.inner.mods.read();
        (self.inner.revision.load(Ordering::Acquire), mods.clone())
    }

    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    pub fn contains(&self, id: &InstallerId) -> bool {
        self.inner.mods.read().iter().any(|installer| &installer.id() == id)
    }

    pub fn len(&self) -> usize {
        self.inner.mods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.mods.read().is_empty()
    }

    fn upsert(&self, installer: Installer) {
        let mut mods = self.inner.mods.write();
        let id = installer.id();
        match mods.iter_mut().find(|existing| existing.id() == id) {
            Some(existing) => *existing = installer,
            None => mods.push(installer),
        }
        self.inner.revision.fetch_add(1, Ordering::AcqRel);
    }

    fn remove(&self, id: &InstallerId) -> bool {
        let mut mods = self.inner.mods.write();
        let before = mods.len();
        mods.retain(|installer| &installer.id() != id);
        let removed = mods.len() != before;
        if removed {
            self.inner.revision.fetch_add(1, Ordering::AcqRel);
        }
        removed
    }
}

/// Two-way map between installers and their keys, plus which installers are visible.
#[derive(Debug, Default)]
pub struct ActiveModRegistry {
    keys: HashMap<InstallerId, ModKey>,
    mods: BTreeMap<ModKey, Installer>,
    visible: VisibleModsView,
}

impl ActiveModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `installer` with `key`.
    ///
    /// A different installer already holding `key` is deregistered first, and
    /// any other key the installer held is released.
    pub fn register_mod(&mut self, installer: Installer, key: ModKey, hidden: bool) {
        let id = installer.id();
        let taken_by_other = self
            .mods
            .get(&key)
            .is_some_and(|existing| existing.id() != id);
        if taken_by_other {
            self.deregister_key(&key);
        }

        if let Some(old_key) = self.keys.get(&id) {
            if old_key != &key {
                self.mods.remove(old_key);
            }
        }

        self.keys.insert(id.clone(), key.clone());
        self.mods.insert(key, installer.clone());
        if hidden {
            self.visible.remove(&id);
        } else {
            self.visible.upsert(installer);
        }
    }

    pub fn deregister_mod(&mut self, id: &InstallerId) -> Option<ModKey> {
        let key = self.keys.remove(id)?;
        self.mods.remove(&key);
        self.visible.remove(id);
        Some(key)
    }

    pub fn deregister_key(&mut self, key: &ModKey) -> Option<Installer> {
        let installer = self.mods.remove(key)?;
        let id = installer.id();
        self.keys.remove(&id);
        self.visible.remove(&id);
        Some(installer)
    }

    pub fn key_of(&self, id: &InstallerId) -> Option<&ModKey> {
        self.keys.get(id)
    }

    pub fn mod_of(&self, key: &ModKey) -> Option<&Installer> {
        self.mods.get(key)
    }

    pub fn key_exists(&self, key: &ModKey) -> bool {
        self.mods.contains_key(key)
    }

    pub fn is_registered(&self, id: &InstallerId) -> bool {
        self.keys.contains_key(id)
    }

    pub fn is_mod_hidden(&self, id: &InstallerId) -> bool {
        self.is_registered(id) && !self.visible.contains(id)
    }

    /// Registered installers ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = (&ModKey, &Installer)> {
        self.mods.iter()
    }

    pub fn visible_mods(&self) -> VisibleModsView {
        self.visible.clone()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}
