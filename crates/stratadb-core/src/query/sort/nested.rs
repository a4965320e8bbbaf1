use crate::{
    collection::EntityCollection,
    error::{Error, QueryError},
    index::Bitmap,
    tx::Transaction,
};
use std::collections::BTreeMap;
use stratadb_query::{OrderConstraint, OrderDirection, Scope, Value};

///
/// NestedContextSorter
///
/// Orders referenced-entity primary keys inside a nested context: by natural
/// primary key, or by an attribute of the referenced collection resolved
/// through its global indices. Keys the ordering does not cover keep their
/// ascending primary-key order at the tail.
///

#[derive(Debug)]
pub struct NestedContextSorter {
    order: NestedOrder,
}

#[derive(Debug)]
enum NestedOrder {
    PkNatural(OrderDirection),
    AttributeRuns { runs: Vec<Bitmap> },
}

impl NestedContextSorter {
    /// Natural primary-key order; needs no collection access.
    #[must_use]
    pub const fn pk_natural(direction: OrderDirection) -> Self {
        Self {
            order: NestedOrder::PkNatural(direction),
        }
    }

    /// Configure the sorter from the ordering constraints of a reference
    /// specification. Only the first constraint drives the order; ties keep
    /// ascending primary keys.
    pub fn build(
        children: &[OrderConstraint],
        collection: &EntityCollection,
        scopes: &[Scope],
        txn: Option<&Transaction>,
    ) -> Result<Self, Error> {
        match children.first() {
            None => Ok(Self {
                order: NestedOrder::PkNatural(OrderDirection::Asc),
            }),
            Some(OrderConstraint::EntityPrimaryKeyNatural(direction)) => Ok(Self {
                order: NestedOrder::PkNatural(*direction),
            }),
            Some(OrderConstraint::AttributeNatural { name, direction }) => {
                let sortable = collection
                    .schema()
                    .attribute(name)
                    .is_some_and(|attribute| attribute.sortable);
                if !sortable {
                    return Err(Error::Query(QueryError::AttributeNotSortable {
                        attribute_name: name.clone(),
                        target: format!("entity type '{}'", collection.entity_type()),
                    }));
                }
                let mut merged: BTreeMap<Value, Bitmap> = BTreeMap::new();
                for scope in scopes {
                    let Some(global) = collection.global_index(txn, *scope) else {
                        continue;
                    };
                    if let Some(filter_index) = global.attributes().filter_index(txn, name) {
                        for (value, bitmap) in filter_index.sorted_buckets(txn) {
                            match merged.get_mut(&value) {
                                Some(existing) => *existing |= &bitmap,
                                None => {
                                    merged.insert(value, bitmap);
                                }
                            }
                        }
                    }
                }
                let mut runs: Vec<Bitmap> = merged.into_values().collect();
                if matches!(direction, OrderDirection::Desc) {
                    runs.reverse();
                }
                Ok(Self {
                    order: NestedOrder::AttributeRuns { runs },
                })
            }
            Some(OrderConstraint::ReferenceProperty { .. }) => {
                Err(Error::Query(QueryError::NestedReferenceContext))
            }
        }
    }

    /// Order the given keys according to the configured constraint.
    #[must_use]
    pub fn sort_pks(&self, input: &Bitmap) -> Vec<u32> {
        match &self.order {
            NestedOrder::PkNatural(OrderDirection::Asc) => input.to_vec(),
            NestedOrder::PkNatural(OrderDirection::Desc) => {
                let mut keys = input.to_vec();
                keys.reverse();
                keys
            }
            NestedOrder::AttributeRuns { runs } => {
                let mut out = Vec::with_capacity(usize::try_from(input.len()).unwrap_or(0));
                let mut covered = Bitmap::new();
                for run in runs {
                    let members = &(run & input) - &covered;
                    out.extend(members.iter());
                    covered |= &members;
                }
                out.extend((input - &covered).iter());
                out
            }
        }
    }
}
