use crate::tx::{ContainerId, Transaction};

///
/// FlagChanges
///

#[derive(Debug, Default)]
pub struct FlagChanges {
    value: Option<bool>,
}

///
/// TransactionalFlag
///
/// Transactional boolean. Tracks per-index dirtiness: set on every mutation,
/// cleared after a successful persist cycle.
///

#[derive(Debug)]
pub struct TransactionalFlag {
    id: ContainerId,
    base: bool,
}

impl Default for TransactionalFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

impl TransactionalFlag {
    #[must_use]
    pub fn new(value: bool) -> Self {
        Self {
            id: ContainerId::next(),
            base: value,
        }
    }

    #[must_use]
    pub fn get(&self, txn: Option<&Transaction>) -> bool {
        txn.and_then(|t| t.layer_if_exists::<FlagChanges>(self.id))
            .and_then(|layer| layer.value)
            .unwrap_or(self.base)
    }

    /// True when the given transaction has touched this flag.
    #[must_use]
    pub fn has_layer(&self, txn: &Transaction) -> bool {
        txn.layer_if_exists::<FlagChanges>(self.id).is_some()
    }

    pub fn set(&mut self, txn: Option<&mut Transaction>, value: bool) {
        match txn {
            None => self.base = value,
            Some(txn) => {
                txn.get_or_create_layer::<FlagChanges>(self.id).value = Some(value);
            }
        }
    }

    /// Merge this container's layer into the base value.
    pub fn commit(&mut self, txn: &mut Transaction) {
        if let Some(layer) = txn.remove_layer::<FlagChanges>(self.id)
            && let Some(value) = layer.value
        {
            self.base = value;
        }
    }
}
