use crate::tx::{ContainerId, Transaction};
use std::collections::BTreeSet;

///
/// SetChanges
///
/// Diff layer for a transactional set. `created` and `removed` are kept
/// disjoint, and `removed` only ever holds keys present in the base, so
/// `len` stays a pure arithmetic combination.
///

#[derive(Debug)]
pub struct SetChanges<K> {
    created: BTreeSet<K>,
    removed: BTreeSet<K>,
}

impl<K> Default for SetChanges<K> {
    fn default() -> Self {
        Self {
            created: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }
}

///
/// TransactionalSet
///
/// Behaves as an ordinary ordered set to callers, but all writes made inside
/// a transaction land in that transaction's diff layer and stay invisible to
/// readers holding no layer. Outside a transaction writes mutate the base
/// directly and are then not safe for concurrent multi-writer use.
///

#[derive(Debug)]
pub struct TransactionalSet<K: Ord + Clone + 'static> {
    id: ContainerId,
    base: BTreeSet<K>,
}

impl<K: Ord + Clone + 'static> Default for TransactionalSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + 'static> TransactionalSet<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ContainerId::next(),
            base: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn of(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            id: ContainerId::next(),
            base: keys.into_iter().collect(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    #[must_use]
    pub fn contains(&self, txn: Option<&Transaction>, key: &K) -> bool {
        match txn.and_then(|t| t.layer_if_exists::<SetChanges<K>>(self.id)) {
            None => self.base.contains(key),
            Some(layer) => {
                layer.created.contains(key)
                    || (self.base.contains(key) && !layer.removed.contains(key))
            }
        }
    }

    #[must_use]
    pub fn len(&self, txn: Option<&Transaction>) -> usize {
        match txn.and_then(|t| t.layer_if_exists::<SetChanges<K>>(self.id)) {
            None => self.base.len(),
            Some(layer) => self.base.len() - layer.removed.len() + layer.created.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.len(txn) == 0
    }

    /// Keys visible to the given transaction, in ascending order.
    #[must_use]
    pub fn keys(&self, txn: Option<&Transaction>) -> Vec<K> {
        match txn.and_then(|t| t.layer_if_exists::<SetChanges<K>>(self.id)) {
            None => self.base.iter().cloned().collect(),
            Some(layer) => {
                let mut keys: BTreeSet<K> = self
                    .base
                    .iter()
                    .filter(|key| !layer.removed.contains(*key))
                    .cloned()
                    .collect();
                keys.extend(layer.created.iter().cloned());
                keys.into_iter().collect()
            }
        }
    }

    /// Insert a key; returns true when it was not visible before.
    pub fn insert(&mut self, txn: Option<&mut Transaction>, key: K) -> bool {
        match txn {
            None => self.base.insert(key),
            Some(txn) => {
                let in_base = self.base.contains(&key);
                let layer = txn.get_or_create_layer::<SetChanges<K>>(self.id);
                if layer.created.contains(&key) {
                    return false;
                }
                if in_base && !layer.removed.contains(&key) {
                    return false;
                }
                if in_base {
                    // resurrect a key removed earlier in this transaction
                    layer.removed.remove(&key);
                } else {
                    layer.created.insert(key);
                }
                true
            }
        }
    }

    /// Remove a key; returns true when it was visible. Removing an already
    /// removed key is an idempotent no-op, not an error.
    pub fn remove(&mut self, txn: Option<&mut Transaction>, key: &K) -> bool {
        match txn {
            None => self.base.remove(key),
            Some(txn) => {
                let in_base = self.base.contains(key);
                let layer = txn.get_or_create_layer::<SetChanges<K>>(self.id);
                if layer.created.remove(key) {
                    return true;
                }
                if in_base && !layer.removed.contains(key) {
                    layer.removed.insert(key.clone());
                    return true;
                }
                false
            }
        }
    }

    /// Merge this container's layer into a new base. A transaction without a
    /// layer for this container leaves the base untouched.
    pub fn commit(&mut self, txn: &mut Transaction) {
        if let Some(layer) = txn.remove_layer::<SetChanges<K>>(self.id) {
            for key in &layer.removed {
                self.base.remove(key);
            }
            self.base.extend(layer.created);
        }
    }
}
