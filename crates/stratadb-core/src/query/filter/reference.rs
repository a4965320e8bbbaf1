use crate::{
    error::{Error, QueryError},
    hash::{constraint_fingerprint, constraints_fingerprint, hash_parts, hash_str, scope_tag},
    index::{Bitmap, EntityIndex},
    obs::sink::{self, MetricsEvent},
    query::{
        algebra::{Formula, QueryExecutionContext},
        context::{QueryPlanningContext, TargetIndexes},
        filter::translate_constraint,
    },
};
use stratadb_query::{FilterBy, FilterConstraint};

const FP_REFERENCE_HOP: u8 = 0x11;
const FP_NESTED_ENTITY: u8 = 0x12;

/// Translate `referenceHaving`: evaluate the children in the reference
/// context against the per-scope referenced-type indices, then hop the
/// referenced-PK result back into the referencing entity's own primary-key
/// space through the reference cardinality index, one hop per relation
/// rather than per referenced entity.
pub(super) fn translate_reference_having<'a>(
    reference_name: &str,
    children: &[FilterConstraint],
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    if ctx.reference_schema.is_some() {
        return Err(Error::Query(QueryError::NestedReferenceContext));
    }
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

    let mut per_scope = Vec::with_capacity(ctx.scopes.len());
    for scope in &ctx.scopes {
        let Some(referenced_type) =
            ctx.collection
                .referenced_type_index(ctx.txn, *scope, reference_name)
        else {
            // no relation instance ever landed in this scope
            per_scope.push(Formula::empty());
            continue;
        };
        let body: &EntityIndex = referenced_type;
        let reference_ctx = ctx.with_reference(schema, vec![body]);

        let referenced_formula = if children.is_empty() {
            Formula::constant(body.all_primary_keys(ctx.txn))
        } else {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(translate_constraint(child, &reference_ctx)?);
            }
            Formula::and(parts)
        };

        let context_fingerprint = hash_parts(
            FP_REFERENCE_HOP,
            &[
                hash_str(ctx.collection.entity_type()),
                hash_str(reference_name),
                u64::from(scope_tag(*scope)),
                u64::from(body.primary_key()),
                constraints_fingerprint(children),
            ],
        );

        let collection = ctx.collection;
        let cardinality = referenced_type.cardinality();
        let txn = ctx.txn;
        per_scope.push(Formula::mapping(
            context_fingerprint,
            referenced_formula,
            move |referenced: &Bitmap| {
                let index_pks = cardinality.index_primary_keys(txn, referenced);
                let mut out = Bitmap::new();
                for index_pk in index_pks.iter() {
                    if let Some(reduced) = collection.reduced_index_by_pk(txn, index_pk) {
                        out |= &reduced.all_primary_keys(txn);
                    }
                }
                out
            },
        ));
    }
    Ok(Formula::or(per_scope))
}

/// Translate `entityHaving`: re-enter the whole pipeline against the
/// referenced entity's collection, once per active scope. A scope without a
/// global index contributes the zero element; results join with OR. The
/// nested computation is wrapped in a deferred formula so it runs only when
/// an enclosing node demands it, and exactly once.
pub(super) fn translate_entity_having<'a>(
    child: &FilterConstraint,
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    let Some(reference) = ctx.reference_schema else {
        return Err(Error::Query(QueryError::EntityHavingOutsideReference));
    };
    if !reference.managed {
        return Err(Error::Query(QueryError::UnmanagedReferencedType {
            reference_name: reference.name.clone(),
            referenced_type: reference.referenced_entity_type.clone(),
        }));
    }
    let referenced_collection = ctx
        .catalog
        .collection_or_err(&reference.referenced_entity_type)?;

    let mut per_scope = Vec::with_capacity(ctx.scopes.len());
    for scope in &ctx.scopes {
        let Some(global) = referenced_collection.global_index(ctx.txn, *scope) else {
            per_scope.push(Formula::empty());
            continue;
        };

        let nested_ctx = ctx.for_collection(referenced_collection, vec![*scope]);
        let mut inner = Formula::and(vec![
            translate_constraint(child, &nested_ctx)?,
            global.all_primary_keys_formula(ctx.txn),
        ]);
        if let Some(enricher) = ctx.enricher {
            inner = enricher.enrich(inner, referenced_collection.schema());
        }

        let context_fingerprint = hash_parts(
            FP_NESTED_ENTITY,
            &[
                hash_str(&reference.referenced_entity_type),
                hash_str(&reference.name),
                u64::from(scope_tag(*scope)),
                u64::from(global.primary_key()),
                constraint_fingerprint(child),
            ],
        );
        sink::emit(MetricsEvent::NestedQueryPlanned);

        per_scope.push(Formula::deferred(context_fingerprint, move || {
            let mut exec = QueryExecutionContext::new();
            inner.compute(&mut exec)
        }));
    }
    Ok(Formula::or(per_scope))
}

/// Index-selection pre-pass: referenceHaving constraints whose nested
/// filter pins the referenced entities by explicit primary keys narrow the
/// candidate reduced indices up front, sparing the sorter a full
/// referenced-type scan.
#[must_use]
pub fn collect_target_indexes(
    filter: &FilterBy,
    ctx: &QueryPlanningContext<'_>,
) -> Vec<TargetIndexes> {
    let mut targets = Vec::new();
    collect_from_children(filter.children(), ctx, &mut targets);
    targets
}

fn collect_from_children(
    children: &[FilterConstraint],
    ctx: &QueryPlanningContext<'_>,
    targets: &mut Vec<TargetIndexes>,
) {
    for child in children {
        match child {
            FilterConstraint::And(grandchildren) => {
                collect_from_children(grandchildren, ctx, targets);
            }
            FilterConstraint::ReferenceHaving {
                reference_name,
                children: reference_children,
            } => {
                if let Some(referenced_pks) = pinned_referenced_pks(reference_children) {
                    let mut reduced_index_pks = Vec::new();
                    for scope in &ctx.scopes {
                        if let Some(referenced_type) =
                            ctx.collection
                                .referenced_type_index(ctx.txn, *scope, reference_name)
                        {
                            reduced_index_pks.extend(
                                referenced_type
                                    .cardinality()
                                    .index_primary_keys(ctx.txn, &referenced_pks)
                                    .iter(),
                            );
                        }
                    }
                    targets.push(TargetIndexes {
                        reference_name: reference_name.clone(),
                        reduced_index_pks,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Referenced PKs when the reference filter is exactly an explicit
/// primary-key pin.
fn pinned_referenced_pks(children: &[FilterConstraint]) -> Option<Bitmap> {
    match children {
        [FilterConstraint::EntityHaving(inner)] => match inner.as_ref() {
            FilterConstraint::EntityPrimaryKeyInSet(pks) => {
                Some(Bitmap::of(pks.iter().copied()))
            }
            _ => None,
        },
        _ => None,
    }
}
