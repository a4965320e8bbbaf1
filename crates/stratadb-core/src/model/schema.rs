use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stratadb_query::Scope;

///
/// Schema contracts
///
/// Read-only metadata the translators consult: whether an attribute may be
/// filtered or sorted, whether a reference is indexed in a scope, whether the
/// referenced entity type is managed by this engine. Schema definition and
/// evolution live in an external collaborator; nothing here mutates.
///

///
/// AttributeSchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AttributeSchema {
    pub name: String,
    pub filterable: bool,
    pub sortable: bool,
}

impl AttributeSchema {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filterable: false,
            sortable: false,
        }
    }

    #[must_use]
    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    #[must_use]
    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

///
/// ReferenceCardinality
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ReferenceCardinality {
    ZeroOrOne,
    ExactlyOne,
    ZeroOrMore,
    OneOrMore,
}

impl ReferenceCardinality {
    /// True when a single entity may carry more than one relation instance.
    #[must_use]
    pub const fn is_multiple(self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }
}

///
/// ReferenceSchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReferenceSchema {
    pub name: String,
    pub referenced_entity_type: String,
    /// Whether the referenced type is an entity collection managed by this
    /// engine (nested queries require it) or an external identifier.
    pub managed: bool,
    pub cardinality: ReferenceCardinality,
    pub indexed_scopes: Vec<Scope>,
    pub attributes: BTreeMap<String, AttributeSchema>,
}

impl ReferenceSchema {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        referenced_entity_type: impl Into<String>,
        cardinality: ReferenceCardinality,
    ) -> Self {
        Self {
            name: name.into(),
            referenced_entity_type: referenced_entity_type.into(),
            managed: false,
            cardinality,
            indexed_scopes: vec![Scope::Live],
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    #[must_use]
    pub fn indexed_in(mut self, scopes: impl IntoIterator<Item = Scope>) -> Self {
        self.indexed_scopes = scopes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    #[must_use]
    pub fn is_indexed_in(&self, scope: Scope) -> bool {
        self.indexed_scopes.contains(&scope)
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }
}

///
/// EntitySchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntitySchema {
    pub entity_type: String,
    pub with_hierarchy: bool,
    pub attributes: BTreeMap<String, AttributeSchema>,
    pub references: BTreeMap<String, ReferenceSchema>,
}

impl EntitySchema {
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            with_hierarchy: false,
            attributes: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn with_hierarchy(mut self) -> Self {
        self.with_hierarchy = true;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceSchema) -> Self {
        self.references.insert(reference.name.clone(), reference);
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn reference(&self, name: &str) -> Option<&ReferenceSchema> {
        self.references.get(name)
    }
}
