use crate::{
    error::{Error, QueryError},
    model::AttributeSchema,
    query::{algebra::Formula, context::QueryPlanningContext},
};
use stratadb_query::Value;

/// Attribute schema in the current context: the active reference's when
/// descending through a reference constraint, the entity's otherwise.
/// Non-filterable attributes are a usage error identifying the target.
fn filterable_attribute<'a>(
    name: &str,
    ctx: &QueryPlanningContext<'a>,
) -> Result<&'a AttributeSchema, Error> {
    let (schema, target) = match ctx.reference_schema {
        Some(reference) => (
            reference.attribute(name),
            format!("reference '{}'", reference.name),
        ),
        None => (
            ctx.collection.schema().attribute(name),
            format!("entity type '{}'", ctx.collection.entity_type()),
        ),
    };
    match schema {
        Some(attribute) if attribute.filterable => Ok(attribute),
        _ => Err(Error::Query(QueryError::AttributeNotFilterable {
            attribute_name: name.to_string(),
            target,
        })),
    }
}

pub(super) fn translate_attribute_equals<'a>(
    name: &str,
    value: &Value,
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    filterable_attribute(name, ctx)?;
    let parts = ctx
        .current_index_bodies()
        .into_iter()
        .map(|body| {
            body.attributes()
                .filter_index(ctx.txn, name)
                .map_or_else(Formula::empty, |index| {
                    Formula::constant(index.records_equal_to(ctx.txn, value))
                })
        })
        .collect();
    Ok(Formula::or(parts))
}

pub(super) fn translate_attribute_in_set<'a>(
    name: &str,
    values: &[Value],
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    filterable_attribute(name, ctx)?;
    let mut parts = Vec::with_capacity(values.len());
    for value in values {
        parts.push(translate_attribute_equals(name, value, ctx)?);
    }
    Ok(Formula::or(parts))
}

pub(super) fn translate_attribute_is<'a>(
    name: &str,
    present: bool,
    ctx: &QueryPlanningContext<'a>,
) -> Result<Formula<'a>, Error> {
    filterable_attribute(name, ctx)?;
    let with_value = Formula::or(
        ctx.current_index_bodies()
            .into_iter()
            .map(|body| {
                body.attributes()
                    .filter_index(ctx.txn, name)
                    .map_or_else(Formula::empty, |index| {
                        Formula::constant(index.all_records(ctx.txn))
                    })
            })
            .collect(),
    );
    if present {
        Ok(with_value)
    } else {
        Ok(Formula::not(with_value, ctx.superset_formula()))
    }
}
