pub mod algebra;
pub mod context;
pub mod filter;
pub mod sort;

use crate::{
    catalog::Catalog,
    error::Error,
    obs::sink::{self, MetricsEvent},
    query::{
        algebra::QueryExecutionContext,
        context::{NestedFormulaEnricher, QueryPlanningContext},
    },
    tx::Transaction,
};
use stratadb_query::{FilterConstraint, Query, Scope};

/// Evaluate a query: set up the planning context, run the index-selection
/// pre-pass, translate the filter into a formula, compute it once, then
/// order the resulting primary keys.
pub(crate) fn execute(
    catalog: &Catalog,
    txn: Option<&Transaction>,
    entity_type: &str,
    request: &Query,
    enricher: Option<&dyn NestedFormulaEnricher>,
) -> Result<Vec<u32>, Error> {
    let collection = catalog.collection_or_err(entity_type)?;
    let scopes = effective_scopes(request);

    let mut ctx = QueryPlanningContext::new(
        catalog,
        collection,
        scopes,
        request.locale.as_ref(),
        txn,
    );
    if let Some(enricher) = enricher {
        ctx = ctx.with_enricher(enricher);
    }

    let formula = match &request.filter_by {
        Some(filter) => {
            ctx.target_indexes = filter::collect_target_indexes(filter, &ctx);
            filter::translate_filter_by(filter, &ctx)?
        }
        None => ctx.superset_formula(),
    };

    sink::emit(MetricsEvent::FormulaComputed {
        nodes: formula.node_count(),
    });
    let mut exec = QueryExecutionContext::new();
    let matches = formula.compute(&mut exec);

    match &request.order_by {
        Some(order_by) => {
            let sorters = sort::translate_order_by(order_by, &ctx)?;
            Ok(sort::apply_sorters(&sorters, &matches))
        }
        None => Ok(matches.to_vec()),
    }
}

/// Scope set of the request, refined by top-level `scopeIn` constraints.
fn effective_scopes(request: &Query) -> Vec<Scope> {
    let mut scopes = request.effective_scopes();
    if let Some(filter) = &request.filter_by {
        for child in filter.children() {
            if let FilterConstraint::ScopeIn(selected) = child {
                scopes.retain(|scope| selected.contains(scope));
            }
        }
    }
    scopes
}
