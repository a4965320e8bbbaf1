use crate::{
    index::Bitmap,
    tx::{ContainerId, Transaction},
};

///
/// BitmapChanges
///
/// Diff layer for a transactional bitmap. `added` is disjoint from the base,
/// `removed` is a subset of it.
///

#[derive(Debug, Default)]
pub struct BitmapChanges {
    added: Bitmap,
    removed: Bitmap,
}

///
/// TransactionalBitmap
///
/// Snapshot-isolated set of entity primary keys. The workhorse of the entity
/// indices: record membership, reverse reference maps and hierarchy children
/// are all stored this way.
///

#[derive(Debug)]
pub struct TransactionalBitmap {
    id: ContainerId,
    base: Bitmap,
}

impl Default for TransactionalBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionalBitmap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ContainerId::next(),
            base: Bitmap::new(),
        }
    }

    #[must_use]
    pub fn of(keys: impl IntoIterator<Item = u32>) -> Self {
        Self {
            id: ContainerId::next(),
            base: Bitmap::of(keys),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    #[must_use]
    pub fn contains(&self, txn: Option<&Transaction>, key: u32) -> bool {
        match txn.and_then(|t| t.layer_if_exists::<BitmapChanges>(self.id)) {
            None => self.base.contains(key),
            Some(layer) => {
                layer.added.contains(key)
                    || (self.base.contains(key) && !layer.removed.contains(key))
            }
        }
    }

    #[must_use]
    pub fn len(&self, txn: Option<&Transaction>) -> u64 {
        match txn.and_then(|t| t.layer_if_exists::<BitmapChanges>(self.id)) {
            None => self.base.len(),
            Some(layer) => self.base.len() - layer.removed.len() + layer.added.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.len(txn) == 0
    }

    /// The visible key set as a plain bitmap.
    #[must_use]
    pub fn materialize(&self, txn: Option<&Transaction>) -> Bitmap {
        match txn.and_then(|t| t.layer_if_exists::<BitmapChanges>(self.id)) {
            None => self.base.clone(),
            Some(layer) => &(&self.base - &layer.removed) | &layer.added,
        }
    }

    /// Insert a key; returns true when it was not visible before.
    pub fn insert(&mut self, txn: Option<&mut Transaction>, key: u32) -> bool {
        match txn {
            None => self.insert_direct(key),
            Some(txn) => self.insert_tx(txn, key),
        }
    }

    /// Remove a key; returns true when it was visible.
    pub fn remove(&mut self, txn: Option<&mut Transaction>, key: u32) -> bool {
        match txn {
            None => self.remove_direct(key),
            Some(txn) => self.remove_tx(txn, key),
        }
    }

    /// Base-direct insert for use outside transactions, or on bitmaps that
    /// were created inside the current transaction and are private to it.
    pub fn insert_direct(&mut self, key: u32) -> bool {
        self.base.insert(key)
    }

    /// Base-direct remove; see [`Self::insert_direct`].
    pub fn remove_direct(&mut self, key: u32) -> bool {
        self.base.remove(key)
    }

    /// Insert through the transaction's diff layer without touching the base.
    pub fn insert_tx(&self, txn: &mut Transaction, key: u32) -> bool {
        let in_base = self.base.contains(key);
        let layer = txn.get_or_create_layer::<BitmapChanges>(self.id);
        if layer.added.contains(key) {
            return false;
        }
        if in_base {
            // visible unless removed earlier in this transaction
            layer.removed.remove(key)
        } else {
            layer.added.insert(key)
        }
    }

    /// Remove through the transaction's diff layer without touching the base.
    pub fn remove_tx(&self, txn: &mut Transaction, key: u32) -> bool {
        let in_base = self.base.contains(key);
        let layer = txn.get_or_create_layer::<BitmapChanges>(self.id);
        if layer.added.remove(key) {
            return true;
        }
        if in_base && !layer.removed.contains(key) {
            layer.removed.insert(key);
            return true;
        }
        false
    }

    /// Merge this container's layer into a new base.
    pub fn commit(&mut self, txn: &mut Transaction) {
        if let Some(layer) = txn.remove_layer::<BitmapChanges>(self.id) {
            self.base -= &layer.removed;
            self.base |= &layer.added;
        }
    }
}
