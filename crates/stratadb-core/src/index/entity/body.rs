use crate::{
    index::{Bitmap, attribute::AttributeIndex, entity::key::EntityIndexKey},
    query::algebra::Formula,
    tx::{Transaction, TransactionalBitmap, TransactionalFlag},
};
use stratadb_query::Value;

///
/// EntityIndex
///
/// Common body of every index variant: the superset bitmap of indexed
/// records, the attribute filter indexes built over them, and the dirty
/// flag gating storage-part production. Variants wrap this body and add
/// their own structures.
///

#[derive(Debug)]
pub struct EntityIndex {
    primary_key: u32,
    key: EntityIndexKey,
    version: u32,
    entity_ids: TransactionalBitmap,
    attributes: AttributeIndex,
    dirty: TransactionalFlag,
}

impl EntityIndex {
    #[must_use]
    pub fn new(primary_key: u32, key: EntityIndexKey) -> Self {
        Self {
            primary_key,
            key,
            version: 1,
            entity_ids: TransactionalBitmap::new(),
            attributes: AttributeIndex::new(),
            dirty: TransactionalFlag::new(false),
        }
    }

    #[must_use]
    pub const fn primary_key(&self) -> u32 {
        self.primary_key
    }

    #[must_use]
    pub const fn key(&self) -> &EntityIndexKey {
        &self.key
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Register a record; returns true when it was not indexed yet.
    pub fn insert_record(&mut self, mut txn: Option<&mut Transaction>, primary_key: u32) -> bool {
        let inserted = self.entity_ids.insert(txn.as_deref_mut(), primary_key);
        if inserted {
            self.dirty.set(txn, true);
        }
        inserted
    }

    /// Unregister a record; returns true when it was indexed.
    pub fn remove_record(&mut self, mut txn: Option<&mut Transaction>, primary_key: u32) -> bool {
        let removed = self.entity_ids.remove(txn.as_deref_mut(), primary_key);
        if removed {
            self.dirty.set(txn, true);
        }
        removed
    }

    #[must_use]
    pub fn contains_record(&self, txn: Option<&Transaction>, primary_key: u32) -> bool {
        self.entity_ids.contains(txn, primary_key)
    }

    /// Superset of all record primary keys known to this index.
    #[must_use]
    pub fn all_primary_keys(&self, txn: Option<&Transaction>) -> Bitmap {
        self.entity_ids.materialize(txn)
    }

    /// Formula yielding every record in this index; `Empty` when none.
    #[must_use]
    pub fn all_primary_keys_formula(&self, txn: Option<&Transaction>) -> Formula<'static> {
        Formula::constant(self.all_primary_keys(txn))
    }

    /// Index one attribute value of a record.
    pub fn insert_attribute(
        &mut self,
        mut txn: Option<&mut Transaction>,
        attribute: &str,
        value: Value,
        primary_key: u32,
    ) {
        self.attributes
            .insert_value(txn.as_deref_mut(), attribute, value, primary_key);
        self.dirty.set(txn, true);
    }

    /// Drop one attribute value of a record.
    pub fn remove_attribute(
        &mut self,
        mut txn: Option<&mut Transaction>,
        attribute: &str,
        value: &Value,
        primary_key: u32,
    ) {
        self.attributes
            .remove_value(txn.as_deref_mut(), attribute, value, primary_key);
        self.dirty.set(txn, true);
    }

    #[must_use]
    pub const fn attributes(&self) -> &AttributeIndex {
        &self.attributes
    }

    /// True when nothing is indexed; the owner destroys such indices.
    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.entity_ids.is_empty(txn) && self.attributes.is_empty(txn)
    }

    #[must_use]
    pub fn is_dirty(&self, txn: Option<&Transaction>) -> bool {
        self.dirty.get(txn)
    }

    pub fn mark_dirty(&mut self, txn: Option<&mut Transaction>) {
        self.dirty.set(txn, true);
    }

    /// Clear the dirty flag after a successful persist cycle. Persisting
    /// happens between transactions, so this touches the base directly.
    pub fn reset_dirty(&mut self) {
        self.dirty.set(None, false);
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        let changed = self.dirty.has_layer(txn);
        self.entity_ids.commit(txn);
        self.attributes.commit(txn);
        self.dirty.commit(txn);
        if changed {
            self.version += 1;
        }
    }
}
