use anyhow::{anyhow, Result};

use crate::identity::ModKey;

#[derive(Debug, Clone)]
pub struct OwnershipEntry<V> {
    pub key: ModKey,
    pub value: V,
}

impl<V> OwnershipEntry<V> {
    pub fn new(key: ModKey, value: V) -> Self {
        Self { key, value }
    }
}

// Entries are the same entry when they belong to the same installer.
impl<V> PartialEq for OwnershipEntry<V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<V> Eq for OwnershipEntry<V> {}

/// Installers that touched one item, in install order. The last entry is the
/// current owner; every installer appears at most once.
#[derive(Debug, Clone)]
pub struct OwnershipStack<V> {
    entries: Vec<OwnershipEntry<V>>,
}

impl<V> Default for OwnershipStack<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OwnershipStack<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `key` to the top with `value`, dropping any older entry for it.
    pub fn push(&mut self, key: ModKey, value: V) {
        self.remove(&key);
        self.entries.push(OwnershipEntry::new(key, value));
    }

    pub fn pop(&mut self) -> Result<OwnershipEntry<V>> {
        self.entries
            .pop()
            .ok_or_else(|| anyhow!("cannot pop from an empty ownership stack"))
    }

    pub fn peek(&self) -> Result<&OwnershipEntry<V>> {
        self.entries
            .last()
            .ok_or_else(|| anyhow!("cannot peek into an empty ownership stack"))
    }

    pub fn remove(&mut self, key: &ModKey) -> bool {
        match self.index_of(key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replaces the value held by `key` without moving it.
    pub fn overwrite(&mut self, key: &ModKey, value: V) -> bool {
        match self.entries.iter_mut().rev().find(|entry| &entry.key == key) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &ModKey) -> bool {
        self.index_of(key).is_some()
    }

    /// Position counted from the bottom, found by scanning from the top.
    pub fn index_of(&self, key: &ModKey) -> Option<usize> {
        self.entries.iter().rposition(|entry| &entry.key == key)
    }

    pub fn current(&self) -> Option<&OwnershipEntry<V>> {
        self.entries.last()
    }

    pub fn previous(&self) -> Option<&OwnershipEntry<V>> {
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        self.entries.get(len - 2)
    }

    pub fn retain_keys(&mut self, mut keep: impl FnMut(&ModKey) -> bool) {
        self.entries.retain(|entry| keep(&entry.key));
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &OwnershipEntry<V>> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &ModKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hands the entry held by `from` to `to`. When both are present only the
    /// higher of the two survives, under `to`.
    pub fn rekey(&mut self, from: &ModKey, to: &ModKey) -> bool {
        let Some(from_index) = self.index_of(from) else {
            return false;
        };
        if let Some(to_index) = self.index_of(to) {
            if to_index > from_index {
                self.entries.remove(from_index);
                return true;
            }
            self.entries.remove(to_index);
        }
        if let Some(entry) = self.entries.iter_mut().find(|entry| &entry.key == from) {
            entry.key = to.clone();
        }
        true
    }
}
