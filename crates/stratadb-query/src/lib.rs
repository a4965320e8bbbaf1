//! Declarative constraint AST consumed by the stratadb query core.
//!
//! This crate is pure data: no schema validation, no index logic, no
//! execution semantics. All interpretation occurs in later passes inside
//! `stratadb-core`:
//!
//! - schema-aware validation
//! - index selection
//! - formula translation
//! - sorting

pub mod filter;
pub mod order;
pub mod value;

pub use filter::{
    FilterBy, FilterConstraint, and, attribute_equals, attribute_in_set, attribute_is,
    entity_having, entity_primary_key_in_set, not, or, reference_having, scope_in,
};
pub use order::{
    OrderBy, OrderConstraint, OrderDirection, ReferenceOrderingSpecification, TraversalMode,
    attribute_natural, entity_primary_key_natural, pick_first_by_entity_property,
    reference_property, traverse_by_entity_property,
};
pub use value::Value;

use serde::{Deserialize, Serialize};

///
/// Scope
///
/// Partition of the index space. Every index lives in exactly one scope and
/// queries fan out over the set of scopes they target.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Scope {
    Live,
    Archived,
}

impl Scope {
    pub const ALL: [Self; 2] = [Self::Live, Self::Archived];

    /// Default scope set for queries that do not constrain scopes.
    pub const DEFAULT: [Self; 1] = [Self::Live];
}

///
/// Locale
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Locale(pub String);

impl Locale {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.0
    }
}

///
/// Query
///
/// A complete query request: what to match, how to order, which scopes to
/// search and which locale to resolve localized data in.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Query {
    pub filter_by: Option<FilterBy>,
    pub order_by: Option<OrderBy>,
    pub scopes: Vec<Scope>,
    pub locale: Option<Locale>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter_by(mut self, filter: FilterBy) -> Self {
        self.filter_by = Some(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    #[must_use]
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Scope set the query targets, falling back to [`Scope::DEFAULT`].
    #[must_use]
    pub fn effective_scopes(&self) -> Vec<Scope> {
        if self.scopes.is_empty() {
            Scope::DEFAULT.to_vec()
        } else {
            self.scopes.clone()
        }
    }
}
