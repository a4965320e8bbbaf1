use crate::tx::{ContainerId, Transaction};
use std::collections::{BTreeMap, BTreeSet};

///
/// MapChanges
///
/// Diff layer for a transactional map. `upserted` shadows the base for both
/// inserts and updates; `removed` only holds base keys and is disjoint from
/// `upserted`.
///

#[derive(Debug)]
pub struct MapChanges<K, V> {
    upserted: BTreeMap<K, V>,
    removed: BTreeSet<K>,
}

impl<K, V> Default for MapChanges<K, V> {
    fn default() -> Self {
        Self {
            upserted: BTreeMap::new(),
            removed: BTreeSet::new(),
        }
    }
}

///
/// TransactionalMap
///
/// Map counterpart of [`crate::tx::TransactionalSet`]. Values stored in the
/// base may themselves be transactional producers; composite owners resolve
/// those inner layers during their own commit, after this map's layer has
/// been merged.
///

#[derive(Debug)]
pub struct TransactionalMap<K: Ord + Clone + 'static, V: 'static> {
    id: ContainerId,
    base: BTreeMap<K, V>,
}

impl<K: Ord + Clone + 'static, V: 'static> Default for TransactionalMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + 'static, V: 'static> TransactionalMap<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ContainerId::next(),
            base: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    #[must_use]
    pub fn contains_key(&self, txn: Option<&Transaction>, key: &K) -> bool {
        match txn.and_then(|t| t.layer_if_exists::<MapChanges<K, V>>(self.id)) {
            None => self.base.contains_key(key),
            Some(layer) => {
                layer.upserted.contains_key(key)
                    || (self.base.contains_key(key) && !layer.removed.contains(key))
            }
        }
    }

    #[must_use]
    pub fn get<'a>(&'a self, txn: Option<&'a Transaction>, key: &K) -> Option<&'a V> {
        match txn.and_then(|t| t.layer_if_exists::<MapChanges<K, V>>(self.id)) {
            None => self.base.get(key),
            Some(layer) => {
                if let Some(value) = layer.upserted.get(key) {
                    return Some(value);
                }
                if layer.removed.contains(key) {
                    return None;
                }
                self.base.get(key)
            }
        }
    }

    #[must_use]
    pub fn len(&self, txn: Option<&Transaction>) -> usize {
        match txn.and_then(|t| t.layer_if_exists::<MapChanges<K, V>>(self.id)) {
            None => self.base.len(),
            Some(layer) => {
                let created = layer
                    .upserted
                    .keys()
                    .filter(|key| !self.base.contains_key(*key))
                    .count();
                self.base.len() - layer.removed.len() + created
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.len(txn) == 0
    }

    /// Keys visible to the given transaction, in ascending order.
    #[must_use]
    pub fn keys(&self, txn: Option<&Transaction>) -> Vec<K> {
        match txn.and_then(|t| t.layer_if_exists::<MapChanges<K, V>>(self.id)) {
            None => self.base.keys().cloned().collect(),
            Some(layer) => {
                let mut keys: BTreeSet<K> = self
                    .base
                    .keys()
                    .filter(|key| !layer.removed.contains(*key))
                    .cloned()
                    .collect();
                keys.extend(layer.upserted.keys().cloned());
                keys.into_iter().collect()
            }
        }
    }

    /// Upsert a value; returns true when the key was not visible before.
    pub fn insert(&mut self, txn: Option<&mut Transaction>, key: K, value: V) -> bool {
        match txn {
            None => self.base.insert(key, value).is_none(),
            Some(txn) => {
                let in_base = self.base.contains_key(&key);
                let layer = txn.get_or_create_layer::<MapChanges<K, V>>(self.id);
                let was_visible = layer.upserted.contains_key(&key)
                    || (in_base && !layer.removed.contains(&key));
                layer.removed.remove(&key);
                layer.upserted.insert(key, value);
                !was_visible
            }
        }
    }

    /// Remove a key; returns true when it was visible.
    pub fn remove(&mut self, txn: Option<&mut Transaction>, key: &K) -> bool {
        match txn {
            None => self.base.remove(key).is_some(),
            Some(txn) => {
                let in_base = self.base.contains_key(key);
                let layer = txn.get_or_create_layer::<MapChanges<K, V>>(self.id);
                let shadowed = layer.upserted.remove(key).is_some();
                if in_base && !layer.removed.contains(key) {
                    layer.removed.insert(key.clone());
                    return true;
                }
                shadowed
            }
        }
    }

    /// Direct access to a base-resident value, bypassing any layer.
    ///
    /// Composite containers use this to reach inner transactional producers:
    /// mutating such a value "inside" a transaction only writes the inner
    /// producer's own diff, so handing out the base reference is safe.
    #[must_use]
    pub fn base_get(&self, key: &K) -> Option<&V> {
        self.base.get(key)
    }

    /// Mutable variant of [`Self::base_get`].
    pub fn base_get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.base.get_mut(key)
    }

    /// Base entry, inserted if missing. Only valid outside a transaction.
    pub fn base_entry_or_insert(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        self.base.entry(key).or_insert_with(make)
    }

    /// True when the key resolves to the base (present there, neither
    /// shadowed nor removed by the transaction's layer).
    #[must_use]
    pub fn is_base_visible(&self, txn: &Transaction, key: &K) -> bool {
        if !self.base.contains_key(key) {
            return false;
        }
        match txn.layer_if_exists::<MapChanges<K, V>>(self.id) {
            None => true,
            Some(layer) => !layer.upserted.contains_key(key) && !layer.removed.contains(key),
        }
    }

    /// Mutable access to a value upserted by this transaction. Such values
    /// were created inside the transaction and are private to it.
    pub fn layer_upserted_mut<'t>(
        &self,
        txn: &'t mut Transaction,
        key: &K,
    ) -> Option<&'t mut V> {
        txn.layer_mut_if_exists::<MapChanges<K, V>>(self.id)
            .and_then(|layer| layer.upserted.get_mut(key))
    }

    /// Iterate base values mutably; used by composite owners to commit inner
    /// producers after this map's own layer has been merged.
    pub fn base_values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.base.values_mut()
    }

    /// Visible entries with cloned values, in ascending key order.
    #[must_use]
    pub fn entries(&self, txn: Option<&Transaction>) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.keys(txn)
            .into_iter()
            .filter_map(|key| self.get(txn, &key).cloned().map(|value| (key, value)))
            .collect()
    }

    /// Merge this container's layer into a new base.
    pub fn commit(&mut self, txn: &mut Transaction) {
        if let Some(layer) = txn.remove_layer::<MapChanges<K, V>>(self.id) {
            for key in &layer.removed {
                self.base.remove(key);
            }
            self.base.extend(layer.upserted);
        }
    }
}
