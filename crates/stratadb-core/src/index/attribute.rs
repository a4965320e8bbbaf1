use crate::{
    index::filter_index::FilterIndex,
    tx::{Transaction, TransactionalMap},
};
use stratadb_query::Value;

///
/// AttributeIndex
///
/// Per-attribute-name registry of filter indexes. Filter indexes are created
/// on the first value for an attribute and pruned when the last record
/// leaves, so `is_empty` doubles as a liveness check for the owning entity
/// index.
///

#[derive(Debug, Default)]
pub struct AttributeIndex {
    filter_indexes: TransactionalMap<String, FilterIndex>,
}

impl AttributeIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter_indexes: TransactionalMap::new(),
        }
    }

    #[must_use]
    pub fn filter_index<'a>(
        &'a self,
        txn: Option<&'a Transaction>,
        attribute: &str,
    ) -> Option<&'a FilterIndex> {
        self.filter_indexes.get(txn, &attribute.to_string())
    }

    #[must_use]
    pub fn attribute_names(&self, txn: Option<&Transaction>) -> Vec<String> {
        self.filter_indexes.keys(txn)
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.filter_indexes.is_empty(txn)
    }

    /// Index one attribute value of a record.
    pub fn insert_value(
        &mut self,
        txn: Option<&mut Transaction>,
        attribute: &str,
        value: Value,
        record_id: u32,
    ) -> bool {
        let name = attribute.to_string();
        match txn {
            None => self
                .filter_indexes
                .base_entry_or_insert(name, FilterIndex::new)
                .add_record(None, value, record_id),
            Some(txn) => {
                // an index upserted by this transaction is private to it
                if let Some(index) = self.filter_indexes.layer_upserted_mut(txn, &name) {
                    return index.add_record(None, value, record_id);
                }
                if self.filter_indexes.is_base_visible(txn, &name) {
                    let index = self
                        .filter_indexes
                        .base_get_mut(&name)
                        .unwrap_or_else(|| unreachable!("base visibility checked above"));
                    return index.add_record(Some(txn), value, record_id);
                }
                let mut index = FilterIndex::new();
                index.add_record(None, value, record_id);
                self.filter_indexes.insert(Some(txn), name, index);
                true
            }
        }
    }

    /// Drop one attribute value of a record, pruning a drained filter index.
    pub fn remove_value(
        &mut self,
        txn: Option<&mut Transaction>,
        attribute: &str,
        value: &Value,
        record_id: u32,
    ) -> bool {
        let name = attribute.to_string();
        match txn {
            None => {
                let Some(index) = self.filter_indexes.base_get_mut(&name) else {
                    return false;
                };
                let removed = index.remove_record(None, value, record_id);
                if removed && index.is_empty(None) {
                    self.filter_indexes.remove(None, &name);
                }
                removed
            }
            Some(txn) => {
                let mut private = None;
                if let Some(index) = self.filter_indexes.layer_upserted_mut(txn, &name) {
                    let removed = index.remove_record(None, value, record_id);
                    private = Some((removed, index.is_empty(None)));
                }
                if let Some((removed, drained)) = private {
                    if removed && drained {
                        self.filter_indexes.remove(Some(txn), &name);
                    }
                    return removed;
                }
                if self.filter_indexes.is_base_visible(txn, &name) {
                    let removed;
                    let drained;
                    {
                        let index = self
                            .filter_indexes
                            .base_get_mut(&name)
                            .unwrap_or_else(|| unreachable!("base visibility checked above"));
                        removed = index.remove_record(Some(&mut *txn), value, record_id);
                        drained = index.is_empty(Some(&*txn));
                    }
                    if removed && drained {
                        self.filter_indexes.remove(Some(txn), &name);
                    }
                    return removed;
                }
                false
            }
        }
    }

    /// Merge the registry's layer, then the surviving filter indexes'.
    pub fn commit(&mut self, txn: &mut Transaction) {
        self.filter_indexes.commit(txn);
        for index in self.filter_indexes.base_values_mut() {
            index.commit(txn);
        }
    }
}
