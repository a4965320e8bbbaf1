use crate::{
    error::InternalError,
    obs::sink::{self, MetricsEvent},
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static CONTAINER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

///
/// ContainerId
///
/// Identity of a transactional container, drawn from a process-wide
/// sequence. The transactional layer keys diff lookup by it; destroying the
/// owning container simply orphans its entry.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ContainerId(u64);

impl ContainerId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn next() -> Self {
        Self(CONTAINER_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }
}

///
/// Transaction
///
/// Explicit per-transaction handle associating each container identity with
/// its copy-on-write diff layer. Reads consult the layer if present; writes
/// create it on first access and mutate only it. Dropping the handle is a
/// rollback: bases are untouched, so both commit and rollback cost O(diff).
///
/// A transaction is bound to one thread for its duration. Concurrent
/// transactions hold distinct handles and therefore never observe each
/// other's uncommitted layers.
///

#[derive(Default)]
pub struct Transaction {
    layers: HashMap<ContainerId, Box<dyn Any>>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl Transaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers with an active diff layer.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// The calling container's diff layer, created on first access.
    pub fn get_or_create_layer<L: Default + 'static>(&mut self, container: ContainerId) -> &mut L {
        self.layers
            .entry(container)
            .or_insert_with(|| Box::new(L::default()))
            .downcast_mut::<L>()
            .unwrap_or_else(|| panic!("transactional layer type mismatch for {container:?}"))
    }

    /// Non-creating read lookup.
    #[must_use]
    pub fn layer_if_exists<L: 'static>(&self, container: ContainerId) -> Option<&L> {
        self.layers
            .get(&container)
            .map(|layer| layer.downcast_ref::<L>().unwrap_or_else(|| {
                panic!("transactional layer type mismatch for {container:?}")
            }))
    }

    /// Non-creating mutable lookup.
    pub fn layer_mut_if_exists<L: 'static>(&mut self, container: ContainerId) -> Option<&mut L> {
        self.layers
            .get_mut(&container)
            .map(|layer| layer.downcast_mut::<L>().unwrap_or_else(|| {
                panic!("transactional layer type mismatch for {container:?}")
            }))
    }

    /// Detach the container's layer without merging it. Used during
    /// cascading cleanup when an owning structure is destroyed mid-flight.
    pub fn remove_layer<L: 'static>(&mut self, container: ContainerId) -> Option<L> {
        self.layers.remove(&container).map(|layer| {
            *layer.downcast::<L>().unwrap_or_else(|_| {
                panic!("transactional layer type mismatch for {container:?}")
            })
        })
    }

    /// Detach a layer the caller knows must exist. Absence signals an index
    /// bookkeeping bug, not a recoverable condition.
    pub fn take_layer<L: 'static>(&mut self, container: ContainerId) -> Result<L, InternalError> {
        self.remove_layer(container).ok_or_else(|| {
            InternalError::transaction_invariant(format!(
                "no transactional layer registered for {container:?} at merge time"
            ))
        })
    }

    /// Record a commit of this transaction for observability. The actual
    /// merge is performed container by container by the owning structures.
    pub fn committed(&self) {
        sink::emit(MetricsEvent::TransactionCommitted {
            layers: self.layers.len() as u64,
        });
    }

    /// Record a rollback of this transaction for observability.
    pub fn rolled_back(&self) {
        sink::emit(MetricsEvent::TransactionRolledBack {
            layers: self.layers.len() as u64,
        });
    }
}
