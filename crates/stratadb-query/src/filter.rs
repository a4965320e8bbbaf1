use crate::{Scope, value::Value};
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr};

///
/// FilterConstraint
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilterConstraint {
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    AttributeEquals {
        name: String,
        value: Value,
    },
    AttributeInSet {
        name: String,
        values: Vec<Value>,
    },
    /// Matches records that have (or lack) any value for the attribute.
    AttributeIs {
        name: String,
        present: bool,
    },
    EntityPrimaryKeyInSet(Vec<u32>),
    /// Descends into a reference; children are evaluated in the context of
    /// the relation (reference attributes plus `EntityHaving`).
    ReferenceHaving {
        reference_name: String,
        children: Vec<Self>,
    },
    /// Valid only inside `ReferenceHaving`; targets the referenced entity
    /// collection with a nested filter.
    EntityHaving(Box<Self>),
    ScopeIn(Vec<Scope>),
}

impl FilterConstraint {
    #[must_use]
    pub const fn and(children: Vec<Self>) -> Self {
        Self::And(children)
    }

    #[must_use]
    pub const fn or(children: Vec<Self>) -> Self {
        Self::Or(children)
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(child: Self) -> Self {
        Self::Not(Box::new(child))
    }
}

impl BitAnd for FilterConstraint {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::And(vec![self, rhs])
    }
}

impl BitOr for FilterConstraint {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::Or(vec![self, rhs])
    }
}

///
/// FilterBy
///
/// Top-level filter container; children combine with AND.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilterBy(pub Vec<FilterConstraint>);

impl FilterBy {
    #[must_use]
    pub fn new(children: impl IntoIterator<Item = FilterConstraint>) -> Self {
        Self(children.into_iter().collect())
    }

    #[must_use]
    pub fn children(&self) -> &[FilterConstraint] {
        &self.0
    }
}

// constructor functions mirroring the query grammar

#[must_use]
pub fn and(children: impl IntoIterator<Item = FilterConstraint>) -> FilterConstraint {
    FilterConstraint::And(children.into_iter().collect())
}

#[must_use]
pub fn or(children: impl IntoIterator<Item = FilterConstraint>) -> FilterConstraint {
    FilterConstraint::Or(children.into_iter().collect())
}

#[must_use]
pub fn not(child: FilterConstraint) -> FilterConstraint {
    FilterConstraint::Not(Box::new(child))
}

#[must_use]
pub fn attribute_equals(name: impl Into<String>, value: impl Into<Value>) -> FilterConstraint {
    FilterConstraint::AttributeEquals {
        name: name.into(),
        value: value.into(),
    }
}

#[must_use]
pub fn attribute_in_set(
    name: impl Into<String>,
    values: impl IntoIterator<Item = Value>,
) -> FilterConstraint {
    FilterConstraint::AttributeInSet {
        name: name.into(),
        values: values.into_iter().collect(),
    }
}

#[must_use]
pub fn attribute_is(name: impl Into<String>, present: bool) -> FilterConstraint {
    FilterConstraint::AttributeIs {
        name: name.into(),
        present,
    }
}

#[must_use]
pub fn entity_primary_key_in_set(keys: impl IntoIterator<Item = u32>) -> FilterConstraint {
    FilterConstraint::EntityPrimaryKeyInSet(keys.into_iter().collect())
}

#[must_use]
pub fn reference_having(
    reference_name: impl Into<String>,
    children: impl IntoIterator<Item = FilterConstraint>,
) -> FilterConstraint {
    FilterConstraint::ReferenceHaving {
        reference_name: reference_name.into(),
        children: children.into_iter().collect(),
    }
}

#[must_use]
pub fn entity_having(child: FilterConstraint) -> FilterConstraint {
    FilterConstraint::EntityHaving(Box::new(child))
}

#[must_use]
pub fn scope_in(scopes: impl IntoIterator<Item = Scope>) -> FilterConstraint {
    FilterConstraint::ScopeIn(scopes.into_iter().collect())
}
