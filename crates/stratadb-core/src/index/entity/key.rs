use serde::{Deserialize, Serialize};
use stratadb_query::Scope;

///
/// ReferenceKey
///
/// Identifies one relation instance: the reference name plus the referenced
/// entity's primary key. Discriminator of reduced indices.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ReferenceKey {
    pub reference_name: String,
    pub primary_key: u32,
}

impl ReferenceKey {
    #[must_use]
    pub fn new(reference_name: impl Into<String>, primary_key: u32) -> Self {
        Self {
            reference_name: reference_name.into(),
            primary_key,
        }
    }
}

///
/// EntityIndexType
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum EntityIndexType {
    /// All entities of the collection in one scope.
    Global,
    /// Entities carrying one particular relation instance.
    Reduced,
    /// All relation instances of one reference name, keyed by the referenced
    /// entity's primary keys.
    ReferencedEntityType,
}

///
/// IndexDiscriminator
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IndexDiscriminator {
    ReferenceName(String),
    ReferenceKey(ReferenceKey),
}

///
/// EntityIndexKey
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EntityIndexKey {
    pub index_type: EntityIndexType,
    pub scope: Scope,
    pub discriminator: Option<IndexDiscriminator>,
}

impl EntityIndexKey {
    #[must_use]
    pub const fn global(scope: Scope) -> Self {
        Self {
            index_type: EntityIndexType::Global,
            scope,
            discriminator: None,
        }
    }

    #[must_use]
    pub const fn reduced(scope: Scope, reference_key: ReferenceKey) -> Self {
        Self {
            index_type: EntityIndexType::Reduced,
            scope,
            discriminator: Some(IndexDiscriminator::ReferenceKey(reference_key)),
        }
    }

    #[must_use]
    pub fn referenced_type(scope: Scope, reference_name: impl Into<String>) -> Self {
        Self {
            index_type: EntityIndexType::ReferencedEntityType,
            scope,
            discriminator: Some(IndexDiscriminator::ReferenceName(reference_name.into())),
        }
    }

    /// The relation instance a reduced index is scoped to.
    #[must_use]
    pub const fn reference_key(&self) -> Option<&ReferenceKey> {
        match &self.discriminator {
            Some(IndexDiscriminator::ReferenceKey(key)) => Some(key),
            _ => None,
        }
    }

    /// The reference name a referenced-type index is scoped to.
    #[must_use]
    pub fn reference_name(&self) -> Option<&str> {
        match &self.discriminator {
            Some(IndexDiscriminator::ReferenceName(name)) => Some(name),
            Some(IndexDiscriminator::ReferenceKey(key)) => Some(&key.reference_name),
            None => None,
        }
    }
}
