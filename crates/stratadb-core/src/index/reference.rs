use crate::{
    error::InternalError,
    index::{Bitmap, bitmap_map::BitmapMap},
    tx::{Transaction, TransactionalMap},
};
use std::cell::RefCell;

/// Sentinel referenced primary key that addresses an index identifier's
/// total occurrence count.
const INDEX_TOTAL: u32 = 0;

const fn compose(index_pk: u32, referenced_pk: u32) -> u64 {
    (index_pk as u64) << 32 | referenced_pk as u64
}

const fn referenced_part(key: u64) -> u32 {
    key as u32
}

const fn index_part(key: u64) -> u32 {
    (key >> 32) as u32
}

///
/// RemovedReference
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RemovedReference {
    /// The pair's last occurrence disappeared; the reverse bitmap entry was
    /// dropped.
    pub last_of_pair: bool,
    /// The index identifier's last occurrence disappeared; the owner should
    /// consider the index for destruction.
    pub last_of_index: bool,
}

///
/// ReferenceCardinalityIndex
///
/// Cardinality tracking for a two-level relation: per index identifier
/// (composed key with the sentinel referenced PK) and per (index identifier,
/// referenced entity PK) pair. A reverse map from referenced PK to the set
/// of index identifiers containing it powers nested-query translation back
/// into the referencing space. Reverse bitmaps are created lazily and never
/// eagerly deleted, even when empty; callers must check emptiness.
///

#[derive(Debug, Default)]
pub struct ReferenceCardinalityIndex {
    cardinalities: TransactionalMap<u64, u32>,
    index_pks_by_referenced: BitmapMap<u32>,
    /// All referenced PKs present as keys; valid only between transactions.
    referenced_memo: RefCell<Option<Bitmap>>,
}

impl ReferenceCardinalityIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cardinalities: TransactionalMap::new(),
            index_pks_by_referenced: BitmapMap::new(),
            referenced_memo: RefCell::new(None),
        }
    }

    /// Record one occurrence of `referenced_pk` inside the index identified
    /// by `index_pk`. Returns true iff this was the pair's first occurrence.
    pub fn add_reference(
        &mut self,
        mut txn: Option<&mut Transaction>,
        index_pk: u32,
        referenced_pk: u32,
    ) -> Result<bool, InternalError> {
        if referenced_pk == INDEX_TOTAL {
            return Err(InternalError::index_invariant(format!(
                "referenced primary key {INDEX_TOTAL} collides with the index-total sentinel"
            )));
        }
        self.invalidate_memo();

        self.increment(txn.as_deref_mut(), compose(index_pk, INDEX_TOTAL));
        let first_of_pair = self.increment(txn.as_deref_mut(), compose(index_pk, referenced_pk));
        if first_of_pair {
            self.index_pks_by_referenced
                .add(txn, referenced_pk, index_pk);
        }
        Ok(first_of_pair)
    }

    /// Drop one occurrence of the pair. On the pair's last occurrence the
    /// index identifier leaves the reverse bitmap; the bitmap itself stays.
    pub fn remove_reference(
        &mut self,
        mut txn: Option<&mut Transaction>,
        index_pk: u32,
        referenced_pk: u32,
    ) -> Result<RemovedReference, InternalError> {
        self.invalidate_memo();

        let last_of_index = self.decrement(txn.as_deref_mut(), compose(index_pk, INDEX_TOTAL))?;
        let last_of_pair =
            self.decrement(txn.as_deref_mut(), compose(index_pk, referenced_pk))?;
        if last_of_pair {
            self.index_pks_by_referenced
                .remove(txn, &referenced_pk, index_pk, false);
        }
        Ok(RemovedReference {
            last_of_pair,
            last_of_index,
        })
    }

    /// Referenced entity PKs that currently occur in at least one index.
    ///
    /// Memoized between transactions (the key set is immutable there) and
    /// recomputed on every call inside one, where uncommitted changes are
    /// visible only to the calling transaction.
    #[must_use]
    pub fn referenced_primary_keys(&self, txn: Option<&Transaction>) -> Bitmap {
        if txn.is_some() {
            return self.collect_referenced(txn);
        }
        let mut memo = self.referenced_memo.borrow_mut();
        memo.get_or_insert_with(|| self.collect_referenced(None))
            .clone()
    }

    /// Index identifiers containing any of the requested referenced PKs:
    /// the request is first narrowed to the PKs actually present, then the
    /// matching reverse bitmaps are unioned.
    #[must_use]
    pub fn index_primary_keys(&self, txn: Option<&Transaction>, referenced: &Bitmap) -> Bitmap {
        let present = &self.referenced_primary_keys(txn) & referenced;
        let mut result = Bitmap::new();
        for referenced_pk in present.iter() {
            if let Some(bucket) = self.index_pks_by_referenced.bucket(txn, &referenced_pk) {
                result |= &bucket;
            }
        }
        result
    }

    /// True when any index still contains the referenced PK. Reverse
    /// bitmaps outlive their last member, so emptiness is checked here
    /// rather than by bucket existence.
    #[must_use]
    pub fn referenced_is_present(&self, txn: Option<&Transaction>, referenced_pk: u32) -> bool {
        !self
            .index_pks_by_referenced
            .bucket_is_empty(txn, &referenced_pk)
    }

    /// Every index identifier with a nonzero total.
    #[must_use]
    pub fn all_index_primary_keys(&self, txn: Option<&Transaction>) -> Bitmap {
        self.cardinalities
            .keys(txn)
            .into_iter()
            .filter(|key| referenced_part(*key) == INDEX_TOTAL)
            .map(index_part)
            .collect()
    }

    /// Total occurrence count of one index identifier.
    #[must_use]
    pub fn index_total(&self, txn: Option<&Transaction>, index_pk: u32) -> u32 {
        self.cardinalities
            .get(txn, &compose(index_pk, INDEX_TOTAL))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        self.cardinalities.is_empty(txn)
    }

    /// Visible composed keys and counts for persistence.
    #[must_use]
    pub fn entries(&self, txn: Option<&Transaction>) -> Vec<(u64, u32)> {
        self.cardinalities.entries(txn)
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.invalidate_memo();
        self.cardinalities.commit(txn);
        self.index_pks_by_referenced.commit(txn);
    }

    fn collect_referenced(&self, txn: Option<&Transaction>) -> Bitmap {
        self.cardinalities
            .keys(txn)
            .into_iter()
            .filter(|key| referenced_part(*key) != INDEX_TOTAL)
            .map(referenced_part)
            .collect()
    }

    fn increment(&mut self, txn: Option<&mut Transaction>, key: u64) -> bool {
        let current = self.cardinalities.get(txn.as_deref(), &key).copied();
        match current {
            None => {
                self.cardinalities.insert(txn, key, 1);
                true
            }
            Some(count) => {
                self.cardinalities.insert(txn, key, count + 1);
                false
            }
        }
    }

    fn decrement(&mut self, txn: Option<&mut Transaction>, key: u64) -> Result<bool, InternalError> {
        let current = self
            .cardinalities
            .get(txn.as_deref(), &key)
            .copied()
            .ok_or_else(|| {
                InternalError::index_invariant(format!(
                    "reference cardinality for index {} and referenced key {} was expected but missing",
                    index_part(key),
                    referenced_part(key)
                ))
            })?;
        if current == 1 {
            self.cardinalities.remove(txn, &key);
            Ok(true)
        } else {
            self.cardinalities.insert(txn, key, current - 1);
            Ok(false)
        }
    }

    fn invalidate_memo(&self) {
        self.referenced_memo.borrow_mut().take();
    }
}
