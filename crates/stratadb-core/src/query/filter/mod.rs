mod attribute;
mod reference;

#[cfg(test)]
mod tests;

use crate::{
    error::{Error, QueryError},
    index::Bitmap,
    query::{algebra::Formula, context::QueryPlanningContext},
};
use stratadb_query::{FilterBy, FilterConstraint};

pub use reference::collect_target_indexes;

/// Translate a filter container into a formula over the context's record
/// space. Children combine with AND.
pub fn translate_filter_by<'a>(
    filter: &FilterBy,
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    let mut parts = Vec::with_capacity(filter.children().len());
    for child in filter.children() {
        // scope selection is consumed during planning setup
        if matches!(child, FilterConstraint::ScopeIn(_)) {
            continue;
        }
        parts.push(translate_constraint(child, ctx)?);
    }
    if parts.is_empty() {
        return Ok(ctx.superset_formula());
    }
    Ok(Formula::and(parts))
}

/// Recursive-descent translation of one constraint node.
pub fn translate_constraint<'a>(
    constraint: &FilterConstraint,
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    match constraint {
        FilterConstraint::And(children) => {
            let parts = children
                .iter()
                .map(|child| translate_constraint(child, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Formula::and(parts))
        }
        FilterConstraint::Or(children) => {
            let parts = children
                .iter()
                .map(|child| translate_constraint(child, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Formula::or(parts))
        }
        FilterConstraint::Not(child) => {
            let subtracted = translate_constraint(child, ctx)?;
            Ok(Formula::not(subtracted, ctx.superset_formula()))
        }
        FilterConstraint::AttributeEquals { name, value } => {
            attribute::translate_attribute_equals(name, value, ctx)
        }
        FilterConstraint::AttributeInSet { name, values } => {
            attribute::translate_attribute_in_set(name, values, ctx)
        }
        FilterConstraint::AttributeIs { name, present } => {
            attribute::translate_attribute_is(name, *present, ctx)
        }
        FilterConstraint::EntityPrimaryKeyInSet(keys) => {
            // constrain the explicit keys to records the index set knows
            Ok(Formula::and(vec![
                Formula::constant(Bitmap::of(keys.iter().copied())),
                ctx.superset_formula(),
            ]))
        }
        FilterConstraint::ReferenceHaving {
            reference_name,
            children,
        } => reference::translate_reference_having(reference_name, children, ctx),
        FilterConstraint::EntityHaving(child) => {
            reference::translate_entity_having(child, ctx)
        }
        FilterConstraint::ScopeIn(_) => Err(Error::Query(QueryError::ScopeInNotTopLevel)),
    }
}
