use crate::{
    collection::EntityCollection,
    error::{Error, QueryError},
    model::EntitySchema,
    query::{self, context::NestedFormulaEnricher},
    tx::Transaction,
};
use std::collections::BTreeMap;
use stratadb_query::Query;

///
/// Catalog
///
/// Entity collections by type. The entry point for query evaluation and the
/// coordinating merge step at commit: each collection resolves its own
/// transactional layers, in registration order, against the single consumed
/// transaction handle.
///

#[derive(Debug, Default)]
pub struct Catalog {
    collections: BTreeMap<String, EntityCollection>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection for the schema's entity type. Collection
    /// bootstrap happens between transactions.
    pub fn create_collection(&mut self, schema: EntitySchema) -> &mut EntityCollection {
        let entity_type = schema.entity_type.clone();
        self.collections
            .entry(entity_type)
            .or_insert_with(|| EntityCollection::new(schema))
    }

    #[must_use]
    pub fn collection(&self, entity_type: &str) -> Option<&EntityCollection> {
        self.collections.get(entity_type)
    }

    pub fn collection_mut(&mut self, entity_type: &str) -> Option<&mut EntityCollection> {
        self.collections.get_mut(entity_type)
    }

    /// Collection lookup that reports a usage error for unknown types.
    pub fn collection_or_err(&self, entity_type: &str) -> Result<&EntityCollection, Error> {
        self.collection(entity_type).ok_or_else(|| {
            Error::Query(QueryError::EntityTypeNotFound {
                entity_type: entity_type.to_string(),
            })
        })
    }

    /// Evaluate a query against one collection: translate the filter into a
    /// formula, compute it, order the result.
    pub fn query(
        &self,
        txn: Option<&Transaction>,
        entity_type: &str,
        request: &Query,
    ) -> Result<Vec<u32>, Error> {
        query::execute(self, txn, entity_type, request, None)
    }

    /// [`Self::query`] with an enricher injecting ambient filters
    /// (visibility, tenancy) into every nested sub-query.
    pub fn query_with_enricher(
        &self,
        txn: Option<&Transaction>,
        entity_type: &str,
        request: &Query,
        enricher: &dyn NestedFormulaEnricher,
    ) -> Result<Vec<u32>, Error> {
        query::execute(self, txn, entity_type, request, Some(enricher))
    }

    /// Merge every collection's transactional layers and consume the
    /// transaction.
    pub fn commit(&mut self, mut txn: Transaction) {
        for collection in self.collections.values_mut() {
            collection.commit(&mut txn);
        }
        txn.committed();
    }

    /// Discard the transaction's layers; bases are untouched. Indices the
    /// transaction created but never committed are pruned from the arenas.
    pub fn rollback(&mut self, txn: Transaction) {
        txn.rolled_back();
        drop(txn);
        for collection in self.collections.values_mut() {
            collection.prune_unregistered();
        }
    }
}
