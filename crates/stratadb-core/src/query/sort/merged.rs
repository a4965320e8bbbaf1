use crate::{
    error::{Error, QueryError},
    index::Bitmap,
    query::{context::QueryPlanningContext, sort::Sorter},
};
use std::collections::BTreeMap;
use stratadb_query::{OrderDirection, Value};

///
/// MergedSortedRecordsSorter
///
/// Orders records by pre-sorted value runs merged across the active scopes'
/// indices. Each run holds the records carrying one attribute value; runs
/// follow value order (reversed for descending), records inside a run follow
/// ascending primary key. Records without a value for the attribute are left
/// to the rest of the chain.
///

#[derive(Debug)]
pub struct MergedSortedRecordsSorter {
    runs: Vec<Bitmap>,
}

impl MergedSortedRecordsSorter {
    #[must_use]
    pub const fn new(runs: Vec<Bitmap>) -> Self {
        Self { runs }
    }

    /// Merge per-index sorted buckets into one run sequence. Buckets with
    /// the same value union across indices; run order follows value order.
    #[must_use]
    pub fn merge(buckets: impl IntoIterator<Item = (Value, Bitmap)>, direction: OrderDirection) -> Self {
        let mut merged: BTreeMap<Value, Bitmap> = BTreeMap::new();
        for (value, bitmap) in buckets {
            match merged.get_mut(&value) {
                Some(existing) => *existing |= &bitmap,
                None => {
                    merged.insert(value, bitmap);
                }
            }
        }
        let mut runs: Vec<Bitmap> = merged.into_values().collect();
        if matches!(direction, OrderDirection::Desc) {
            runs.reverse();
        }
        Self::new(runs)
    }
}

impl Sorter for MergedSortedRecordsSorter {
    fn sort_into(&self, input: &Bitmap, out: &mut Vec<u32>, emitted: &mut Bitmap) {
        for run in &self.runs {
            let members = &(run & input) - &*emitted;
            out.extend(members.iter());
            *emitted |= &members;
        }
    }
}

/// Build the sorter for a top-level `attributeNatural` ordering.
pub(super) fn translate_attribute_natural<'a>(
    name: &str,
    direction: OrderDirection,
    ctx: &QueryPlanningContext<'a>,
) -> Result<MergedSortedRecordsSorter, Error> {
    let sortable = ctx
        .collection
        .schema()
        .attribute(name)
        .is_some_and(|attribute| attribute.sortable);
    if !sortable {
        return Err(Error::Query(QueryError::AttributeNotSortable {
            attribute_name: name.to_string(),
            target: format!("entity type '{}'", ctx.collection.entity_type()),
        }));
    }

    let mut buckets = Vec::new();
    for body in ctx.current_index_bodies() {
        if let Some(filter_index) = body.attributes().filter_index(ctx.txn, name) {
            buckets.extend(filter_index.sorted_buckets(ctx.txn));
        }
    }
    Ok(MergedSortedRecordsSorter::merge(buckets, direction))
}
