use crate::{
    error::InternalError,
    tx::{Transaction, TransactionalMap},
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

///
/// CardinalityKey
///
/// One occurrence slot: a record carrying a value. Multi-valued relations
/// produce the same slot repeatedly; the index counts those occurrences so
/// the underlying structure is touched only on the first add and the last
/// remove.
///

#[derive(Clone, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CardinalityKey<K> {
    pub record_id: u32,
    pub value: K,
}

///
/// CardinalityIndex
///
/// Counts occurrences of `(record, value)` pairs. A key with count zero must
/// not exist in the map; it is purged eagerly on the removal that drains it.
///

#[derive(Debug)]
pub struct CardinalityIndex<K: Ord + Clone + Debug + 'static> {
    cardinalities: TransactionalMap<CardinalityKey<K>, u32>,
}

impl<K: Ord + Clone + Debug + 'static> Default for CardinalityIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + Debug + 'static> CardinalityIndex<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cardinalities: TransactionalMap::new(),
        }
    }

    /// Record one occurrence. Returns true iff this was the first (the count
    /// went 0 → 1) and the caller should materialize the underlying entry.
    pub fn add_record(&mut self, mut txn: Option<&mut Transaction>, value: K, record_id: u32) -> bool {
        let key = CardinalityKey { record_id, value };
        let current = self
            .cardinalities
            .get(txn.as_deref(), &key)
            .copied()
            .unwrap_or(0);
        self.cardinalities
            .insert(txn.as_deref_mut(), key, current + 1);
        current == 0
    }

    /// Drop one occurrence. Returns true iff the count reached zero, in
    /// which case the key is purged and the caller should drop the
    /// underlying entry. A missing count signals index/data
    /// desynchronization and is fatal.
    pub fn remove_record(
        &mut self,
        mut txn: Option<&mut Transaction>,
        value: K,
        record_id: u32,
    ) -> Result<bool, InternalError> {
        let key = CardinalityKey { record_id, value };
        let current = self
            .cardinalities
            .get(txn.as_deref(), &key)
            .copied()
            .ok_or_else(|| {
                InternalError::index_invariant(format!(
                    "cardinality for record {record_id} and value {:?} was expected but missing",
                    key.value
                ))
            })?;
        if current == 1 {
            self.cardinalities.remove(txn.as_deref_mut(), &key);
            Ok(true)
        } else {
            self.cardinalities.insert(txn.as_deref_mut(), key, current - 1);
            Ok(false)
        }
    }

    /// Current count for a slot; zero when absent.
    #[must_use]
    pub fn cardinality(&self, txn: Option<&Transaction>, value: &K, record_id: u32) -> u32 {
        let key = CardinalityKey {
            record_id,
            value: value.clone(),
        };
        self.cardinalities.get(txn, &key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.cardinalities.is_empty(txn)
    }

    /// Visible slots and counts for persistence, in key order.
    #[must_use]
    pub fn entries(&self, txn: Option<&Transaction>) -> Vec<(CardinalityKey<K>, u32)> {
        self.cardinalities.entries(txn)
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.cardinalities.commit(txn);
    }
}
