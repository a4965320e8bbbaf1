use crate::{
    error::InternalError,
    index::{
        EntityIndexKey, EntityIndexVariant, GlobalEntityIndex, ReducedEntityIndex, ReferenceKey,
        ReferencedTypeEntityIndex, StoragePart,
    },
    model::EntitySchema,
    tx::{Transaction, TransactionalMap},
};
use std::collections::BTreeMap;
use stratadb_query::Scope;

///
/// EntityCollection
///
/// All index slices of one entity type. The registry from index key to index
/// primary key is transactional, so indices created or destroyed inside a
/// transaction stay invisible to concurrent readers; the index bodies
/// themselves live in a primary-key arena that is pruned when the registry
/// entry disappears.
///

#[derive(Debug)]
pub struct EntityCollection {
    schema: EntitySchema,
    next_index_pk: u32,
    registry: TransactionalMap<EntityIndexKey, u32>,
    indexes: BTreeMap<u32, EntityIndexVariant>,
}

impl EntityCollection {
    #[must_use]
    pub fn new(schema: EntitySchema) -> Self {
        Self {
            schema,
            next_index_pk: 1,
            registry: TransactionalMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.schema.entity_type
    }

    #[must_use]
    pub const fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    #[must_use]
    pub fn index_pk(&self, txn: Option<&Transaction>, key: &EntityIndexKey) -> Option<u32> {
        self.registry.get(txn, key).copied()
    }

    #[must_use]
    pub fn index(
        &self,
        txn: Option<&Transaction>,
        key: &EntityIndexKey,
    ) -> Option<&EntityIndexVariant> {
        self.index_pk(txn, key)
            .and_then(|pk| self.indexes.get(&pk))
    }

    /// Resolve an index by its primary key, honoring registry visibility.
    #[must_use]
    pub fn index_by_pk(&self, txn: Option<&Transaction>, pk: u32) -> Option<&EntityIndexVariant> {
        let index = self.indexes.get(&pk)?;
        (self.index_pk(txn, index.body().key()) == Some(pk)).then_some(index)
    }

    #[must_use]
    pub fn global_index(
        &self,
        txn: Option<&Transaction>,
        scope: Scope,
    ) -> Option<&GlobalEntityIndex> {
        self.index(txn, &EntityIndexKey::global(scope))
            .and_then(EntityIndexVariant::as_global)
    }

    #[must_use]
    pub fn referenced_type_index(
        &self,
        txn: Option<&Transaction>,
        scope: Scope,
        reference_name: &str,
    ) -> Option<&ReferencedTypeEntityIndex> {
        self.index(txn, &EntityIndexKey::referenced_type(scope, reference_name))
            .and_then(EntityIndexVariant::as_referenced_type)
    }

    #[must_use]
    pub fn reduced_index(
        &self,
        txn: Option<&Transaction>,
        scope: Scope,
        reference_key: &ReferenceKey,
    ) -> Option<&ReducedEntityIndex> {
        self.index(txn, &EntityIndexKey::reduced(scope, reference_key.clone()))
            .and_then(EntityIndexVariant::as_reduced)
    }

    #[must_use]
    pub fn reduced_index_by_pk(
        &self,
        txn: Option<&Transaction>,
        pk: u32,
    ) -> Option<&ReducedEntityIndex> {
        self.index_by_pk(txn, pk)
            .and_then(EntityIndexVariant::as_reduced)
    }

    /// Index keys visible to the transaction.
    #[must_use]
    pub fn index_keys(&self, txn: Option<&Transaction>) -> Vec<EntityIndexKey> {
        self.registry.keys(txn)
    }

    pub fn get_or_create_global(
        &mut self,
        txn: Option<&mut Transaction>,
        scope: Scope,
    ) -> Result<&mut GlobalEntityIndex, InternalError> {
        let key = EntityIndexKey::global(scope);
        let pk = self.resolve_or_create(txn, &key, |pk, key| {
            EntityIndexVariant::Global(GlobalEntityIndex::new(pk, key))
        });
        match self.indexes.get_mut(&pk) {
            Some(EntityIndexVariant::Global(index)) => Ok(index),
            _ => Err(variant_mismatch(&key, pk)),
        }
    }

    pub fn get_or_create_reduced(
        &mut self,
        txn: Option<&mut Transaction>,
        scope: Scope,
        reference_key: ReferenceKey,
    ) -> Result<&mut ReducedEntityIndex, InternalError> {
        let key = EntityIndexKey::reduced(scope, reference_key);
        let pk = self.resolve_or_create(txn, &key, |pk, key| {
            EntityIndexVariant::Reduced(ReducedEntityIndex::new(pk, key))
        });
        match self.indexes.get_mut(&pk) {
            Some(EntityIndexVariant::Reduced(index)) => Ok(index),
            _ => Err(variant_mismatch(&key, pk)),
        }
    }

    pub fn get_or_create_referenced_type(
        &mut self,
        txn: Option<&mut Transaction>,
        scope: Scope,
        reference_name: &str,
    ) -> Result<&mut ReferencedTypeEntityIndex, InternalError> {
        let key = EntityIndexKey::referenced_type(scope, reference_name);
        let pk = self.resolve_or_create(txn, &key, |pk, key| {
            EntityIndexVariant::ReferencedType(ReferencedTypeEntityIndex::new(pk, key))
        });
        match self.indexes.get_mut(&pk) {
            Some(EntityIndexVariant::ReferencedType(index)) => Ok(index),
            _ => Err(variant_mismatch(&key, pk)),
        }
    }

    /// Mutable access to a visible index body by registry key.
    pub fn index_mut(
        &mut self,
        txn: Option<&Transaction>,
        key: &EntityIndexKey,
    ) -> Option<&mut EntityIndexVariant> {
        let pk = self.index_pk(txn, key)?;
        self.indexes.get_mut(&pk)
    }

    /// Drop an index from the registry. The arena entry survives until the
    /// transaction resolves, so concurrent readers keep a consistent view.
    pub fn remove_index(&mut self, txn: Option<&mut Transaction>, key: &EntityIndexKey) -> bool {
        self.registry.remove(txn, key)
    }

    /// Storage parts of every visible dirty index.
    #[must_use]
    pub fn dirty_storage_parts(&self, txn: Option<&Transaction>) -> Vec<StoragePart> {
        self.index_keys(txn)
            .into_iter()
            .filter_map(|key| self.index(txn, &key))
            .filter_map(|index| index.create_storage_part(txn))
            .collect()
    }

    /// Clear dirty flags after the storage collaborator persisted the parts.
    pub fn reset_dirty(&mut self) {
        for index in self.indexes.values_mut() {
            index.reset_dirty();
        }
    }

    /// Merge the transaction's layers into the collection: registry first,
    /// then the surviving indices; arena entries orphaned by the merge are
    /// dropped.
    pub fn commit(&mut self, txn: &mut Transaction) {
        self.registry.commit(txn);
        self.prune_unregistered();
        for index in self.indexes.values_mut() {
            index.commit(txn);
        }
    }

    /// Drop arena entries no longer reachable through the committed
    /// registry; also used after rollback to discard indices created by the
    /// discarded transaction.
    pub fn prune_unregistered(&mut self) {
        let registered: std::collections::BTreeSet<u32> = self
            .registry
            .keys(None)
            .into_iter()
            .filter_map(|key| self.registry.get(None, &key).copied())
            .collect();
        self.indexes.retain(|pk, _| registered.contains(pk));
    }

    fn resolve_or_create(
        &mut self,
        txn: Option<&mut Transaction>,
        key: &EntityIndexKey,
        make: impl FnOnce(u32, EntityIndexKey) -> EntityIndexVariant,
    ) -> u32 {
        if let Some(pk) = self.registry.get(txn.as_deref(), key).copied() {
            return pk;
        }
        let pk = self.next_index_pk;
        self.next_index_pk += 1;
        self.indexes.insert(pk, make(pk, key.clone()));
        self.registry.insert(txn, key.clone(), pk);
        pk
    }
}

fn variant_mismatch(key: &EntityIndexKey, pk: u32) -> InternalError {
    InternalError::index_invariant(format!(
        "index {pk} registered under {key:?} has an unexpected variant"
    ))
}
