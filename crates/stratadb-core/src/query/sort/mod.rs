mod merged;
mod nested;
mod reference;
mod sequential;

#[cfg(test)]
mod tests;

use crate::{
    error::Error,
    index::Bitmap,
    query::context::QueryPlanningContext,
};
use stratadb_query::{OrderBy, OrderConstraint, OrderDirection};

pub use merged::MergedSortedRecordsSorter;
pub use nested::NestedContextSorter;
pub use reference::translate_reference_property;
pub use sequential::{AtomicBlock, MergeMode, SequentialSorter, WithinBlockOrder};

///
/// Sorter
///
/// One link of the ordering chain: appends the records it knows how to
/// order, skipping records already emitted by earlier links. Records no
/// link claims are appended in ascending primary-key order at the end.
///

pub trait Sorter {
    fn sort_into(&self, input: &Bitmap, out: &mut Vec<u32>, emitted: &mut Bitmap);
}

///
/// PrimaryKeySorter
///

#[derive(Debug)]
pub struct PrimaryKeySorter {
    direction: OrderDirection,
}

impl PrimaryKeySorter {
    #[must_use]
    pub const fn new(direction: OrderDirection) -> Self {
        Self { direction }
    }
}

impl Sorter for PrimaryKeySorter {
    fn sort_into(&self, input: &Bitmap, out: &mut Vec<u32>, emitted: &mut Bitmap) {
        let pending = input - &*emitted;
        match self.direction {
            OrderDirection::Asc => out.extend(pending.iter()),
            OrderDirection::Desc => {
                let mut keys = pending.to_vec();
                keys.reverse();
                out.extend(keys);
            }
        }
        *emitted |= &pending;
    }
}

/// Run the sorter chain over a computed result and append the unsorted
/// remainder in ascending primary-key order.
#[must_use]
pub fn apply_sorters(sorters: &[Box<dyn Sorter + '_>], input: &Bitmap) -> Vec<u32> {
    let mut out = Vec::with_capacity(usize::try_from(input.len()).unwrap_or(usize::MAX));
    let mut emitted = Bitmap::new();
    for sorter in sorters {
        sorter.sort_into(input, &mut out, &mut emitted);
    }
    out.extend((input - &emitted).iter());
    out
}

/// Translate the order container into a sorter chain.
pub fn translate_order_by<'a>(
    order_by: &OrderBy,
    ctx: &QueryPlanningContext<'a>,
) -> Result<Vec<Box<dyn Sorter + 'a>>, Error> {
    let mut sorters: Vec<Box<dyn Sorter + 'a>> = Vec::with_capacity(order_by.children().len());
    for constraint in order_by.children() {
        match constraint {
            OrderConstraint::EntityPrimaryKeyNatural(direction) => {
                sorters.push(Box::new(PrimaryKeySorter::new(*direction)));
            }
            OrderConstraint::AttributeNatural { name, direction } => {
                sorters.push(Box::new(merged::translate_attribute_natural(
                    name, *direction, ctx,
                )?));
            }
            OrderConstraint::ReferenceProperty {
                reference_name,
                specification,
                children,
            } => {
                if let Some(sorter) = translate_reference_property(
                    reference_name,
                    specification.as_ref(),
                    children,
                    ctx,
                )? {
                    sorters.push(Box::new(sorter));
                }
            }
        }
    }
    Ok(sorters)
}
