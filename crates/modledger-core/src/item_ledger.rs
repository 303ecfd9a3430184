use std::collections::BTreeMap;

use crate::identity::ModKey;
use crate::stack::OwnershipStack;

/// Ownership stacks for every tracked item of one kind.
#[derive(Debug, Clone)]
pub struct ItemLedger<K, V> {
    stacks: BTreeMap<K, OwnershipStack<V>>,
}

impl<K, V> Default for ItemLedger<K, V> {
    fn default() -> Self {
        Self {
            stacks: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V> ItemLedger<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stack for `item`, creating an empty one if it is untracked.
    pub fn get_or_create(&mut self, item: &K) -> &mut OwnershipStack<V> {
        self.stacks.entry(item.clone()).or_default()
    }

    pub fn get(&self, item: &K) -> Option<&OwnershipStack<V>> {
        self.stacks.get(item)
    }

    pub fn get_mut(&mut self, item: &K) -> Option<&mut OwnershipStack<V>> {
        self.stacks.get_mut(item)
    }

    pub fn remove(&mut self, item: &K) -> Option<OwnershipStack<V>> {
        self.stacks.remove(item)
    }

    pub fn contains(&self, item: &K) -> bool {
        self.stacks.contains_key(item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &OwnershipStack<V>)> {
        self.stacks.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = &K> {
        self.stacks.keys()
    }

    pub fn items_owned_by(&self, key: &ModKey) -> Vec<&K> {
        self.stacks
            .iter()
            .filter(|(_, stack)| stack.contains(key))
            .map(|(item, _)| item)
            .collect()
    }

    /// Drops every entry for `key`; returns how many stacks lost one.
    pub fn remove_key_everywhere(&mut self, key: &ModKey) -> usize {
        self.stacks
            .values_mut()
            .map(|stack| stack.remove(key))
            .filter(|removed| *removed)
            .count()
    }

    /// Moves every entry held by `from` over to `to`.
    pub fn rekey_everywhere(&mut self, from: &ModKey, to: &ModKey) -> usize {
        self.stacks
            .values_mut()
            .map(|stack| stack.rekey(from, to))
            .filter(|moved| *moved)
            .count()
    }

    /// Drops entries whose key fails `keep`, and any stack left empty.
    pub fn retain_entries(&mut self, mut keep: impl FnMut(&ModKey) -> bool) -> usize {
        let mut dropped = 0;
        self.stacks.retain(|_, stack| {
            let before = stack.len();
            stack.retain_keys(&mut keep);
            dropped += before - stack.len();
            !stack.is_empty()
        });
        dropped
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K, &OwnershipStack<V>) -> bool) {
        self.stacks.retain(|item, stack| keep(item, stack));
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}
