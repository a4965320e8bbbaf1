use crate::{
    index::{Bitmap, bitmap_map::BitmapMap},
    tx::Transaction,
};
use stratadb_query::Value;

///
/// FilterIndex
///
/// Inverted index from attribute value to the records carrying it, in
/// ascending value order. Serves equality/containment formulas for filtering
/// and ordered value iteration for sorting. Value buckets are pruned as soon
/// as they drain.
///

#[derive(Debug, Default)]
pub struct FilterIndex {
    values: BitmapMap<Value>,
}

impl FilterIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: BitmapMap::new(),
        }
    }

    /// Returns true when the record did not yet carry the value.
    pub fn add_record(
        &mut self,
        txn: Option<&mut Transaction>,
        value: Value,
        record_id: u32,
    ) -> bool {
        self.values.add(txn, value, record_id)
    }

    /// Returns true when the record carried the value.
    pub fn remove_record(
        &mut self,
        txn: Option<&mut Transaction>,
        value: &Value,
        record_id: u32,
    ) -> bool {
        self.values.remove(txn, value, record_id, true)
    }

    /// Records whose attribute equals the value; empty when the bucket is
    /// missing.
    #[must_use]
    pub fn records_equal_to(&self, txn: Option<&Transaction>, value: &Value) -> Bitmap {
        self.values.bucket(txn, value).unwrap_or_default()
    }

    /// Every record carrying any value of this attribute.
    #[must_use]
    pub fn all_records(&self, txn: Option<&Transaction>) -> Bitmap {
        let mut result = Bitmap::new();
        for value in self.values.keys(txn) {
            if let Some(bucket) = self.values.bucket(txn, &value) {
                result |= &bucket;
            }
        }
        result
    }

    /// `(value, records)` runs in ascending value order, for sorters.
    #[must_use]
    pub fn sorted_buckets(&self, txn: Option<&Transaction>) -> Vec<(Value, Bitmap)> {
        self.values.snapshot(txn)
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.values.is_empty(txn)
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.values.commit(txn);
    }
}
