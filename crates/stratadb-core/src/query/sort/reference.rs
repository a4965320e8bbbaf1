use crate::{
    collection::EntityCollection,
    error::{Error, InternalError, QueryError},
    index::{Bitmap, ReducedEntityIndex, ReferenceKey},
    model::ReferenceSchema,
    obs::sink::{self, MetricsEvent, SelectionKind},
    query::{
        context::QueryPlanningContext,
        sort::{
            nested::NestedContextSorter,
            sequential::{AtomicBlock, MergeMode, SequentialSorter, WithinBlockOrder},
        },
    },
};
use std::collections::BTreeMap;
use stratadb_query::{
    OrderConstraint, OrderDirection, ReferenceOrderingSpecification, TraversalMode,
    entity_primary_key_natural,
};

/// Translate a `referenceProperty` ordering into a sequential sorter over
/// atomic blocks. Returns `None` when no reduced index exists for the
/// reference, in which case the constraint contributes nothing to the chain.
pub fn translate_reference_property<'a>(
    reference_name: &str,
    specification: Option<&ReferenceOrderingSpecification>,
    children: &[OrderConstraint],
    ctx: &QueryPlanningContext<'a>,
) -> Result<Option<SequentialSorter>, Error> {
    let schema = ctx
        .collection
        .schema()
        .reference(reference_name)
        .ok_or_else(|| QueryError::ReferenceNotFound {
            reference_name: reference_name.to_string(),
            entity_type: ctx.collection.entity_type().to_string(),
        })?;
    for scope in &ctx.scopes {
        if !schema.is_indexed_in(*scope) {
            return Err(Error::Query(QueryError::ReferenceNotIndexed {
                reference_name: reference_name.to_string(),
                entity_type: ctx.collection.entity_type().to_string(),
                scope: *scope,
            }));
        }
    }

    let referenced_collection = if schema.managed {
        ctx.catalog.collection(&schema.referenced_entity_type)
    } else {
        None
    };
    let referenced_hierarchical =
        referenced_collection.is_some_and(|collection| collection.schema().with_hierarchy);

    // hierarchical targets traverse by default, flat targets pick first
    let default_specification = if referenced_hierarchical {
        ReferenceOrderingSpecification::TraverseBy {
            children: vec![entity_primary_key_natural(OrderDirection::Asc)],
            mode: TraversalMode::DepthFirst,
        }
    } else {
        ReferenceOrderingSpecification::PickFirstBy {
            children: vec![entity_primary_key_natural(OrderDirection::Asc)],
        }
    };
    let specification = specification.unwrap_or(&default_specification);

    let reduced_indexes = select_reduced_indexes(reference_name, ctx);
    if reduced_indexes.is_empty() {
        return Ok(None);
    }

    // group reduced indices by the referenced entity they are scoped to
    let mut groups: BTreeMap<u32, (ReferenceKey, Vec<&ReducedEntityIndex>)> = BTreeMap::new();
    let mut referenced_ids = Bitmap::new();
    for reduced in &reduced_indexes {
        let reference_key = reduced.reference_key()?.clone();
        let referenced_pk = reference_key.primary_key;
        referenced_ids.insert(referenced_pk);
        groups
            .entry(referenced_pk)
            .or_insert_with(|| (reference_key, Vec::new()))
            .1
            .push(*reduced);
    }

    let (mode, ordering_children) = match specification {
        ReferenceOrderingSpecification::TraverseBy { children, .. } => {
            (MergeMode::AppendAll, children.as_slice())
        }
        ReferenceOrderingSpecification::PickFirstBy { children } => {
            (MergeMode::AppendFirst, children.as_slice())
        }
    };

    let mut sorted_referenced_pks = match specification {
        ReferenceOrderingSpecification::TraverseBy { children, mode }
            if referenced_hierarchical =>
        {
            traverse_hierarchy(children, *mode, schema, ctx)?
        }
        _ => build_nested_sorter(ordering_children, schema, referenced_collection, ctx)?
            .sort_pks(&referenced_ids),
    };
    // entities the traversal did not reach keep ascending order at the tail
    sorted_referenced_pks.retain(|pk| groups.contains_key(pk));
    let covered: Bitmap = Bitmap::of(sorted_referenced_pks.iter().copied());
    sorted_referenced_pks.extend((&referenced_ids - &covered).iter());

    // partition into atomic blocks, one per distinct reference key
    let expected_blocks = groups.len();
    let mut blocks = Vec::with_capacity(expected_blocks);
    for referenced_pk in sorted_referenced_pks {
        let Some((reference_key, members)) = groups.get(&referenced_pk) else {
            continue;
        };
        let mut entity_ids = Bitmap::new();
        for reduced in members {
            entity_ids |= &reduced.all_primary_keys(ctx.txn);
        }
        blocks.push(AtomicBlock {
            reference_key: reference_key.clone(),
            entity_ids,
        });
    }
    if blocks.len() != expected_blocks {
        return Err(InternalError::sort_invariant(format!(
            "unexpected number of atomic blocks: {} instead of {expected_blocks}",
            blocks.len()
        ))
        .into());
    }

    let within = match children.iter().find_map(|child| match child {
        OrderConstraint::EntityPrimaryKeyNatural(direction) => Some(*direction),
        _ => None,
    }) {
        Some(OrderDirection::Desc) => WithinBlockOrder::PkDesc,
        _ => WithinBlockOrder::PkAsc,
    };

    Ok(Some(SequentialSorter::new(blocks, mode, within)))
}

/// Two-tier reduced-index selection: candidates narrowed by a prior
/// index-selection pass win; otherwise the full referenced-type index is
/// scanned to enumerate every reduced index of the reference.
fn select_reduced_indexes<'a>(
    reference_name: &str,
    ctx: &QueryPlanningContext<'a>,
) -> Vec<&'a ReducedEntityIndex> {
    if let Some(target) = ctx.narrowed_target_indexes(reference_name) {
        let narrowed: Vec<&'a ReducedEntityIndex> = target
            .reduced_index_pks
            .iter()
            .filter_map(|pk| ctx.collection.reduced_index_by_pk(ctx.txn, *pk))
            .collect();
        if !narrowed.is_empty() {
            sink::emit(MetricsEvent::ReducedIndexesSelected {
                kind: SelectionKind::Narrowed,
                count: narrowed.len() as u64,
            });
            return narrowed;
        }
    }

    let mut result = Vec::new();
    for scope in &ctx.scopes {
        if let Some(referenced_type) =
            ctx.collection
                .referenced_type_index(ctx.txn, *scope, reference_name)
        {
            for index_pk in referenced_type
                .cardinality()
                .all_index_primary_keys(ctx.txn)
                .iter()
            {
                if let Some(reduced) = ctx.collection.reduced_index_by_pk(ctx.txn, index_pk) {
                    result.push(reduced);
                }
            }
        }
    }
    sink::emit(MetricsEvent::ReducedIndexesSelected {
        kind: SelectionKind::FullScan,
        count: result.len() as u64,
    });
    result
}

/// Nested sorter for the referenced entity's primary keys. Attribute
/// orderings need the referenced collection; unmanaged targets only support
/// natural primary-key order.
fn build_nested_sorter(
    children: &[OrderConstraint],
    schema: &ReferenceSchema,
    referenced_collection: Option<&EntityCollection>,
    ctx: &QueryPlanningContext<'_>,
) -> Result<NestedContextSorter, Error> {
    let needs_collection = matches!(
        children.first(),
        Some(OrderConstraint::AttributeNatural { .. })
    );
    match referenced_collection {
        Some(collection) => {
            NestedContextSorter::build(children, collection, &ctx.scopes, ctx.txn)
        }
        None if needs_collection => Err(Error::Query(QueryError::UnmanagedReferencedType {
            reference_name: schema.name.clone(),
            referenced_type: schema.referenced_entity_type.clone(),
        })),
        None => {
            let direction = match children.first() {
                Some(OrderConstraint::EntityPrimaryKeyNatural(direction)) => *direction,
                _ => OrderDirection::Asc,
            };
            Ok(NestedContextSorter::pk_natural(direction))
        }
    }
}

/// Hierarchy traversal order of the referenced entities, concatenated over
/// the active scopes, with per-level ordering from the traversal children.
fn traverse_hierarchy(
    children: &[OrderConstraint],
    mode: TraversalMode,
    schema: &ReferenceSchema,
    ctx: &QueryPlanningContext<'_>,
) -> Result<Vec<u32>, Error> {
    let referenced_collection = ctx
        .catalog
        .collection_or_err(&schema.referenced_entity_type)?;

    let level_sorter: Box<dyn Fn(Vec<u32>) -> Vec<u32>> = match children.first() {
        None | Some(OrderConstraint::EntityPrimaryKeyNatural(OrderDirection::Asc)) => {
            Box::new(|nodes| nodes)
        }
        Some(OrderConstraint::EntityPrimaryKeyNatural(OrderDirection::Desc)) => {
            Box::new(|mut nodes: Vec<u32>| {
                nodes.reverse();
                nodes
            })
        }
        _ => {
            let sorter =
                NestedContextSorter::build(children, referenced_collection, &ctx.scopes, ctx.txn)?;
            Box::new(move |nodes: Vec<u32>| sorter.sort_pks(&Bitmap::of(nodes)))
        }
    };

    let mut result = Vec::new();
    for scope in &ctx.scopes {
        if let Some(global) = referenced_collection.global_index(ctx.txn, *scope) {
            result.extend(
                global
                    .hierarchy()
                    .list_nodes_from_root(ctx.txn, mode, &*level_sorter),
            );
        }
    }
    Ok(result)
}
