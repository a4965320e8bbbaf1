use crate::{
    index::Bitmap,
    tx::{Transaction, TransactionalBitmap, TransactionalMap},
};

///
/// BitmapMap
///
/// Transactional map from a key to a transactional bitmap of primary keys.
/// Buckets created inside a transaction live in that transaction's layer and
/// are mutated directly; buckets resident in the base are mutated through
/// their own diff layers. Owners choose whether empty buckets are pruned
/// (attribute value buckets) or left in place (reverse reference bitmaps).
///

#[derive(Debug)]
pub struct BitmapMap<K: Ord + Clone + 'static> {
    map: TransactionalMap<K, TransactionalBitmap>,
}

impl<K: Ord + Clone + 'static> Default for BitmapMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + 'static> BitmapMap<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: TransactionalMap::new(),
        }
    }

    #[must_use]
    pub fn contains_key(&self, txn: Option<&Transaction>, key: &K) -> bool {
        self.map.contains_key(txn, key)
    }

    #[must_use]
    pub fn keys(&self, txn: Option<&Transaction>) -> Vec<K> {
        self.map.keys(txn)
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.map.is_empty(txn)
    }

    /// The visible key set of one bucket, or `None` when the bucket is
    /// absent. Callers must treat an empty bucket like a missing one when
    /// the owner does not prune.
    #[must_use]
    pub fn bucket(&self, txn: Option<&Transaction>, key: &K) -> Option<Bitmap> {
        self.map.get(txn, key).map(|bucket| bucket.materialize(txn))
    }

    #[must_use]
    pub fn bucket_is_empty(&self, txn: Option<&Transaction>, key: &K) -> bool {
        self.map
            .get(txn, key)
            .is_none_or(|bucket| bucket.is_empty(txn))
    }

    /// Add a primary key to the bucket, creating the bucket on first use.
    /// Returns true when the key was not present.
    pub fn add(&mut self, txn: Option<&mut Transaction>, key: K, primary_key: u32) -> bool {
        match txn {
            None => self
                .map
                .base_entry_or_insert(key, TransactionalBitmap::new)
                .insert_direct(primary_key),
            Some(txn) => {
                if let Some(bucket) = self.map.layer_upserted_mut(txn, &key) {
                    // bucket created by this transaction; private to it
                    return bucket.insert_direct(primary_key);
                }
                if self.map.is_base_visible(txn, &key) {
                    let bucket = self
                        .map
                        .base_get(&key)
                        .unwrap_or_else(|| unreachable!("base visibility checked above"));
                    return bucket.insert_tx(txn, primary_key);
                }
                let mut bucket = TransactionalBitmap::new();
                bucket.insert_direct(primary_key);
                self.map.insert(Some(txn), key, bucket);
                true
            }
        }
    }

    /// Remove a primary key from the bucket. Returns true when it was
    /// present. With `prune`, a bucket that becomes empty is removed from
    /// the map.
    pub fn remove(
        &mut self,
        txn: Option<&mut Transaction>,
        key: &K,
        primary_key: u32,
        prune: bool,
    ) -> bool {
        match txn {
            None => {
                let Some(bucket) = self.map.base_get_mut(key) else {
                    return false;
                };
                let removed = bucket.remove_direct(primary_key);
                if prune && removed && bucket.is_empty(None) {
                    self.map.remove(None, key);
                }
                removed
            }
            Some(txn) => {
                if let Some(bucket) = self.map.layer_upserted_mut(txn, key) {
                    let removed = bucket.remove_direct(primary_key);
                    let now_empty = bucket.is_empty(None);
                    if prune && removed && now_empty {
                        self.map.remove(Some(txn), key);
                    }
                    return removed;
                }
                if self.map.is_base_visible(txn, key) {
                    let bucket = self
                        .map
                        .base_get(key)
                        .unwrap_or_else(|| unreachable!("base visibility checked above"));
                    let removed = bucket.remove_tx(txn, primary_key);
                    let now_empty = bucket.is_empty(Some(&*txn));
                    if prune && removed && now_empty {
                        self.map.remove(Some(txn), key);
                    }
                    return removed;
                }
                false
            }
        }
    }

    /// Visible buckets materialized for persistence, in ascending key order.
    #[must_use]
    pub fn snapshot(&self, txn: Option<&Transaction>) -> Vec<(K, Bitmap)> {
        self.keys(txn)
            .into_iter()
            .filter_map(|key| self.bucket(txn, &key).map(|bitmap| (key, bitmap)))
            .collect()
    }

    /// Merge the map's own layer, then the surviving buckets' layers.
    pub fn commit(&mut self, txn: &mut Transaction) {
        self.map.commit(txn);
        for bucket in self.map.base_values_mut() {
            bucket.commit(txn);
        }
    }
}
