//! Ephemeral, in-memory counters for engine operations.
//!
//! State is thread-local: each engine thread aggregates its own counters and
//! exposes them via [`snapshot`]. Nothing here persists.

use crate::obs::sink::{MetricsEvent, SelectionKind};
use std::cell::RefCell;

thread_local! {
    static STATE: RefCell<MetricsState> = RefCell::new(MetricsState::default());
}

///
/// MetricsState
///

#[derive(Clone, Debug, Default)]
pub struct MetricsState {
    pub formula_computations: u64,
    pub formula_nodes_evaluated: u64,
    pub formula_cache_hits: u64,
    pub formula_cache_misses: u64,
    pub nested_queries_planned: u64,
    pub reduced_indexes_narrowed: u64,
    pub reduced_indexes_full_scans: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub storage_parts_created: u64,
}

pub(crate) fn record(event: MetricsEvent) {
    STATE.with_borrow_mut(|state| match event {
        MetricsEvent::FormulaComputed { nodes } => {
            state.formula_computations += 1;
            state.formula_nodes_evaluated += nodes;
        }
        MetricsEvent::FormulaCacheHit => state.formula_cache_hits += 1,
        MetricsEvent::FormulaCacheMiss => state.formula_cache_misses += 1,
        MetricsEvent::NestedQueryPlanned => state.nested_queries_planned += 1,
        MetricsEvent::ReducedIndexesSelected { kind, count } => match kind {
            SelectionKind::Narrowed => state.reduced_indexes_narrowed += count,
            SelectionKind::FullScan => state.reduced_indexes_full_scans += count,
        },
        MetricsEvent::TransactionCommitted { .. } => state.transactions_committed += 1,
        MetricsEvent::TransactionRolledBack { .. } => state.transactions_rolled_back += 1,
        MetricsEvent::StoragePartCreated => state.storage_parts_created += 1,
    });
}

/// Copy of the current thread's counters.
#[must_use]
pub fn snapshot() -> MetricsState {
    STATE.with_borrow(Clone::clone)
}

/// Reset the current thread's counters to zero.
pub fn reset() {
    STATE.with_borrow_mut(|state| *state = MetricsState::default());
}
