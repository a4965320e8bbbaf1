mod body;
mod key;

use crate::{
    error::InternalError,
    index::{
        cardinality::CardinalityIndex,
        hierarchy::HierarchyIndex,
        reference::ReferenceCardinalityIndex,
        storage::{
            AttributeBucketsPart, EntityIndexStoragePart, ReferencedTypeIndexStoragePart,
            StoragePart,
        },
    },
    obs::sink::{self, MetricsEvent},
    tx::Transaction,
};
use derive_more::{Deref, DerefMut};
use stratadb_query::Value;

pub use body::EntityIndex;
pub use key::{EntityIndexKey, EntityIndexType, IndexDiscriminator, ReferenceKey};

/// Attribute occurrence slot of a referenced-type index: one reference
/// instance carrying `(attribute, value)` for a referenced entity.
pub(crate) type AttributeValueKey = (String, Value);

///
/// GlobalEntityIndex
///
/// One per collection and scope; the superset every other index slices.
/// Carries the hierarchy placement used by traversal ordering.
///

#[derive(Debug, Deref, DerefMut)]
pub struct GlobalEntityIndex {
    #[deref]
    #[deref_mut]
    body: EntityIndex,
    hierarchy: HierarchyIndex,
}

impl GlobalEntityIndex {
    #[must_use]
    pub fn new(primary_key: u32, key: EntityIndexKey) -> Self {
        Self {
            body: EntityIndex::new(primary_key, key),
            hierarchy: HierarchyIndex::new(),
        }
    }

    #[must_use]
    pub const fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    pub fn set_parent(&mut self, mut txn: Option<&mut Transaction>, node: u32, parent: Option<u32>) {
        self.hierarchy.set_parent(txn.as_deref_mut(), node, parent);
        self.body.mark_dirty(txn);
    }

    pub fn remove_node(&mut self, mut txn: Option<&mut Transaction>, node: u32) {
        self.hierarchy.remove_node(txn.as_deref_mut(), node);
        self.body.mark_dirty(txn);
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.body.commit(txn);
        self.hierarchy.commit(txn);
    }

    #[must_use]
    pub fn create_storage_part(&self, txn: Option<&Transaction>) -> Option<StoragePart> {
        entity_index_part(&self.body, txn).map(StoragePart::EntityIndex)
    }
}

///
/// ReducedEntityIndex
///
/// Slice of the collection scoped to a single relation instance.
///

#[derive(Debug, Deref, DerefMut)]
pub struct ReducedEntityIndex {
    body: EntityIndex,
}

impl ReducedEntityIndex {
    #[must_use]
    pub fn new(primary_key: u32, key: EntityIndexKey) -> Self {
        Self {
            body: EntityIndex::new(primary_key, key),
        }
    }

    /// The relation instance this index is scoped to.
    #[must_use]
    pub fn reference_key(&self) -> Result<&ReferenceKey, InternalError> {
        self.body.key().reference_key().ok_or_else(|| {
            InternalError::index_invariant(format!(
                "reduced index {} lacks a reference key discriminator",
                self.body.primary_key()
            ))
        })
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.body.commit(txn);
    }

    #[must_use]
    pub fn create_storage_part(&self, txn: Option<&Transaction>) -> Option<StoragePart> {
        entity_index_part(&self.body, txn).map(StoragePart::EntityIndex)
    }
}

///
/// ReferencedTypeEntityIndex
///
/// One per reference name and scope. Its record bitmap holds *referenced*
/// entity primary keys; the reference cardinality index maps them back to
/// the reduced indices containing them, and reference attribute values are
/// indexed under cardinality protection so shared values survive partial
/// removal.
///

#[derive(Debug, Deref, DerefMut)]
pub struct ReferencedTypeEntityIndex {
    #[deref]
    #[deref_mut]
    body: EntityIndex,
    cardinality: ReferenceCardinalityIndex,
    attribute_cardinality: CardinalityIndex<AttributeValueKey>,
}

impl ReferencedTypeEntityIndex {
    #[must_use]
    pub fn new(primary_key: u32, key: EntityIndexKey) -> Self {
        Self {
            body: EntityIndex::new(primary_key, key),
            cardinality: ReferenceCardinalityIndex::new(),
            attribute_cardinality: CardinalityIndex::new(),
        }
    }

    #[must_use]
    pub const fn cardinality(&self) -> &ReferenceCardinalityIndex {
        &self.cardinality
    }

    /// Record a relation instance landing in the reduced index `index_pk`.
    pub fn add_reference(
        &mut self,
        mut txn: Option<&mut Transaction>,
        index_pk: u32,
        referenced_pk: u32,
    ) -> Result<(), InternalError> {
        self.cardinality
            .add_reference(txn.as_deref_mut(), index_pk, referenced_pk)?;
        self.body.insert_record(txn, referenced_pk);
        Ok(())
    }

    /// Drop a relation instance; the referenced entity leaves the record
    /// bitmap once no reduced index contains it any more.
    pub fn remove_reference(
        &mut self,
        mut txn: Option<&mut Transaction>,
        index_pk: u32,
        referenced_pk: u32,
    ) -> Result<(), InternalError> {
        let removed =
            self.cardinality
                .remove_reference(txn.as_deref_mut(), index_pk, referenced_pk)?;
        if removed.last_of_pair
            && !self
                .cardinality
                .referenced_is_present(txn.as_deref(), referenced_pk)
        {
            self.body.remove_record(txn, referenced_pk);
        } else {
            self.body.mark_dirty(txn);
        }
        Ok(())
    }

    /// Index a reference attribute value for a referenced entity. The value
    /// lands in the filter index only on its first occurrence.
    pub fn add_reference_attribute(
        &mut self,
        mut txn: Option<&mut Transaction>,
        referenced_pk: u32,
        attribute: &str,
        value: Value,
    ) {
        let first = self.attribute_cardinality.add_record(
            txn.as_deref_mut(),
            (attribute.to_string(), value.clone()),
            referenced_pk,
        );
        if first {
            self.body
                .insert_attribute(txn, attribute, value, referenced_pk);
        } else {
            self.body.mark_dirty(txn);
        }
    }

    /// Drop a reference attribute value; it leaves the filter index only on
    /// its last occurrence.
    pub fn remove_reference_attribute(
        &mut self,
        mut txn: Option<&mut Transaction>,
        referenced_pk: u32,
        attribute: &str,
        value: &Value,
    ) -> Result<(), InternalError> {
        let last = self.attribute_cardinality.remove_record(
            txn.as_deref_mut(),
            (attribute.to_string(), value.clone()),
            referenced_pk,
        )?;
        if last {
            self.body
                .remove_attribute(txn, attribute, value, referenced_pk);
        } else {
            self.body.mark_dirty(txn);
        }
        Ok(())
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        self.body.commit(txn);
        self.cardinality.commit(txn);
        self.attribute_cardinality.commit(txn);
    }

    #[must_use]
    pub fn create_storage_part(&self, txn: Option<&Transaction>) -> Option<StoragePart> {
        let body = entity_index_part(&self.body, txn)?;
        Some(StoragePart::ReferencedTypeIndex(
            ReferencedTypeIndexStoragePart {
                body,
                reference_cardinalities: self.cardinality.entries(txn),
                attribute_cardinalities: self
                    .attribute_cardinality
                    .entries(txn)
                    .into_iter()
                    .map(|(key, count)| (key.record_id, key.value, count))
                    .collect(),
            },
        ))
    }
}

///
/// EntityIndexVariant
///

#[derive(Debug)]
pub enum EntityIndexVariant {
    Global(GlobalEntityIndex),
    Reduced(ReducedEntityIndex),
    ReferencedType(ReferencedTypeEntityIndex),
}

impl EntityIndexVariant {
    #[must_use]
    pub const fn body(&self) -> &EntityIndex {
        match self {
            Self::Global(index) => &index.body,
            Self::Reduced(index) => &index.body,
            Self::ReferencedType(index) => &index.body,
        }
    }

    pub const fn body_mut(&mut self) -> &mut EntityIndex {
        match self {
            Self::Global(index) => &mut index.body,
            Self::Reduced(index) => &mut index.body,
            Self::ReferencedType(index) => &mut index.body,
        }
    }

    #[must_use]
    pub const fn as_global(&self) -> Option<&GlobalEntityIndex> {
        match self {
            Self::Global(index) => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_reduced(&self) -> Option<&ReducedEntityIndex> {
        match self {
            Self::Reduced(index) => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_referenced_type(&self) -> Option<&ReferencedTypeEntityIndex> {
        match self {
            Self::ReferencedType(index) => Some(index),
            _ => None,
        }
    }

    /// True when the variant indexes nothing and should be destroyed.
    #[must_use]
    pub fn is_empty(&self, txn: Option<&Transaction>) -> bool {
        match self {
            Self::Global(index) => index.is_empty(txn),
            Self::Reduced(index) => index.is_empty(txn),
            Self::ReferencedType(index) => {
                index.is_empty(txn) && index.cardinality.is_empty(txn)
            }
        }
    }

    pub fn commit(&mut self, txn: &mut Transaction) {
        match self {
            Self::Global(index) => index.commit(txn),
            Self::Reduced(index) => index.commit(txn),
            Self::ReferencedType(index) => index.commit(txn),
        }
    }

    /// Persistable snapshot, produced only when the index is dirty.
    #[must_use]
    pub fn create_storage_part(&self, txn: Option<&Transaction>) -> Option<StoragePart> {
        match self {
            Self::Global(index) => index.create_storage_part(txn),
            Self::Reduced(index) => index.create_storage_part(txn),
            Self::ReferencedType(index) => index.create_storage_part(txn),
        }
    }

    pub fn reset_dirty(&mut self) {
        self.body_mut().reset_dirty();
    }
}

fn entity_index_part(
    body: &EntityIndex,
    txn: Option<&Transaction>,
) -> Option<EntityIndexStoragePart> {
    if !body.is_dirty(txn) {
        return None;
    }
    let attributes = body
        .attributes()
        .attribute_names(txn)
        .into_iter()
        .filter_map(|name| {
            body.attributes().filter_index(txn, &name).map(|index| {
                AttributeBucketsPart {
                    buckets: index.sorted_buckets(txn),
                    name,
                }
            })
        })
        .collect();
    sink::emit(MetricsEvent::StoragePartCreated);
    Some(EntityIndexStoragePart {
        index_primary_key: body.primary_key(),
        index_key: body.key().clone(),
        version: body.version(),
        entity_ids: body.all_primary_keys(txn),
        attributes,
    })
}
