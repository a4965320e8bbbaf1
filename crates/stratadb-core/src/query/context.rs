use crate::{
    catalog::Catalog,
    collection::EntityCollection,
    index::{EntityIndex, GlobalEntityIndex},
    model::{EntitySchema, ReferenceSchema},
    query::algebra::Formula,
    tx::Transaction,
};
use stratadb_query::{Locale, Scope};

///
/// NestedFormulaEnricher
///
/// Hook injecting ambient filters (visibility, tenancy) into nested
/// sub-queries; the enricher sees the nested formula before it is wrapped
/// for deferral.
///

pub trait NestedFormulaEnricher {
    fn enrich<'f>(&self, formula: Formula<'f>, schema: &EntitySchema) -> Formula<'f>;
}

///
/// TargetIndexes
///
/// Reduced-index candidates narrowed by a prior index-selection pass.
/// Sorters consume them when they match the requested reference, instead of
/// re-scanning the full referenced-type index.
///

#[derive(Clone, Debug)]
pub struct TargetIndexes {
    pub reference_name: String,
    pub reduced_index_pks: Vec<u32>,
}

///
/// IndexSet
///
/// The indices a constraint translates against: the scopes' global indices
/// by default, or an explicitly pinned set while descending into a
/// reference.
///

#[derive(Clone, Debug)]
pub enum IndexSet<'a> {
    Globals,
    Pinned(Vec<&'a EntityIndex>),
}

///
/// QueryPlanningContext
///
/// Everything a translator needs, threaded explicitly: the catalog for
/// nested planning, the target collection and scopes, the active reference
/// schema when inside a reference constraint, narrowed index candidates,
/// the optional enricher and the calling transaction.
///

pub struct QueryPlanningContext<'a> {
    pub catalog: &'a Catalog,
    pub collection: &'a EntityCollection,
    pub scopes: Vec<Scope>,
    pub locale: Option<&'a Locale>,
    pub reference_schema: Option<&'a ReferenceSchema>,
    pub index_set: IndexSet<'a>,
    pub target_indexes: Vec<TargetIndexes>,
    pub enricher: Option<&'a dyn NestedFormulaEnricher>,
    pub txn: Option<&'a Transaction>,
}

impl<'a> QueryPlanningContext<'a> {
    #[must_use]
    pub fn new(
        catalog: &'a Catalog,
        collection: &'a EntityCollection,
        scopes: Vec<Scope>,
        locale: Option<&'a Locale>,
        txn: Option<&'a Transaction>,
    ) -> Self {
        Self {
            catalog,
            collection,
            scopes,
            locale,
            reference_schema: None,
            index_set: IndexSet::Globals,
            target_indexes: Vec::new(),
            enricher: None,
            txn,
        }
    }

    #[must_use]
    pub fn with_enricher(mut self, enricher: &'a dyn NestedFormulaEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Child context descending into a reference constraint, pinned to the
    /// given index bodies.
    #[must_use]
    pub fn with_reference(
        &self,
        reference_schema: &'a ReferenceSchema,
        pinned: Vec<&'a EntityIndex>,
    ) -> Self {
        Self {
            catalog: self.catalog,
            collection: self.collection,
            scopes: self.scopes.clone(),
            locale: self.locale,
            reference_schema: Some(reference_schema),
            index_set: IndexSet::Pinned(pinned),
            target_indexes: self.target_indexes.clone(),
            enricher: self.enricher,
            txn: self.txn,
        }
    }

    /// Child context re-entering the pipeline against another collection
    /// (nested query planning).
    #[must_use]
    pub fn for_collection(&self, collection: &'a EntityCollection, scopes: Vec<Scope>) -> Self {
        Self {
            catalog: self.catalog,
            collection,
            scopes,
            locale: self.locale,
            reference_schema: None,
            index_set: IndexSet::Globals,
            target_indexes: Vec::new(),
            enricher: self.enricher,
            txn: self.txn,
        }
    }

    /// Global indices of the active scopes that exist.
    #[must_use]
    pub fn global_indexes(&self) -> Vec<&'a GlobalEntityIndex> {
        self.scopes
            .iter()
            .filter_map(|scope| self.collection.global_index(self.txn, *scope))
            .collect()
    }

    /// Index bodies the current constraint translates against.
    #[must_use]
    pub fn current_index_bodies(&self) -> Vec<&'a EntityIndex> {
        match &self.index_set {
            IndexSet::Globals => self
                .global_indexes()
                .into_iter()
                .map(|index| &**index)
                .collect(),
            IndexSet::Pinned(bodies) => bodies.clone(),
        }
    }

    /// Formula of every record reachable through the current index set;
    /// superset operand for negations.
    #[must_use]
    pub fn superset_formula(&self) -> Formula<'a> {
        Formula::or(
            self.current_index_bodies()
                .into_iter()
                .map(|body| body.all_primary_keys_formula(self.txn))
                .collect(),
        )
    }

    /// Narrowed reduced-index candidates for a reference, when the prior
    /// index-selection pass produced some.
    #[must_use]
    pub fn narrowed_target_indexes(&self, reference_name: &str) -> Option<&TargetIndexes> {
        self.target_indexes
            .iter()
            .find(|target| target.reference_name == reference_name)
    }
}
