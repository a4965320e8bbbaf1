//! Metrics sink boundary.
//!
//! Core engine logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between index/query logic and the
//! global metrics state.
use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = const { RefCell::new(None) };
}

///
/// SelectionKind
///

#[derive(Clone, Copy, Debug)]
pub enum SelectionKind {
    /// Candidates already narrowed by a prior index-selection pass.
    Narrowed,
    /// Full referenced-type scan fallback.
    FullScan,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    FormulaComputed { nodes: u64 },
    FormulaCacheHit,
    FormulaCacheMiss,
    NestedQueryPlanned,
    ReducedIndexesSelected { kind: SelectionKind, count: u64 },
    TransactionCommitted { layers: u64 },
    TransactionRolledBack { layers: u64 },
    StoragePartCreated,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// Emit an event to the active sink (test override or the global state).
pub(crate) fn emit(event: MetricsEvent) {
    SINK_OVERRIDE.with_borrow(|sink| match sink {
        // Pointer is only ever installed by with_sink, which keeps the
        // referent alive for the duration of the closure.
        Some(ptr) => unsafe { &**ptr }.record(event),
        None => metrics::record(event),
    });
}

/// Run `f` with all metrics events routed to `sink`.
///
/// Test-only escape hatch; nesting replaces the previous override.
pub fn with_sink<R>(sink: &dyn MetricsSink, f: impl FnOnce() -> R) -> R {
    // The thread-local stores `*const dyn MetricsSink`, whose pointee carries a
    // `'static` bound, so the borrowed `sink` lifetime must be erased. This is
    // sound because the pointer is removed again before `with_sink` returns,
    // keeping the referent alive for every dereference in `emit`.
    let ptr: *const dyn MetricsSink =
        unsafe { std::mem::transmute(std::ptr::from_ref(sink)) };
    let prev = SINK_OVERRIDE.with_borrow_mut(|slot| slot.replace(ptr));
    let result = f();
    SINK_OVERRIDE.with_borrow_mut(|slot| {
        *slot = prev;
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder {
        events: RefCell<Vec<MetricsEvent>>,
    }

    impl MetricsSink for Recorder {
        fn record(&self, event: MetricsEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    #[test]
    fn override_captures_events_and_is_restored() {
        let recorder = Recorder {
            events: RefCell::new(Vec::new()),
        };

        metrics::reset();
        with_sink(&recorder, || {
            emit(MetricsEvent::FormulaCacheHit);
            emit(MetricsEvent::NestedQueryPlanned);
        });

        assert_eq!(recorder.events.borrow().len(), 2);
        // overridden events never reach the thread-local state
        assert_eq!(metrics::snapshot().formula_cache_hits, 0);

        emit(MetricsEvent::FormulaCacheHit);
        assert_eq!(metrics::snapshot().formula_cache_hits, 1);
    }
}
