use crate::{
    collection::EntityCollection,
    error::{Error, InternalError, QueryError},
    index::entity::{EntityIndexKey, EntityIndexVariant, ReferenceKey},
    tx::Transaction,
};
use stratadb_query::{Scope, Value};

///
/// ReferenceAssignment
///

#[derive(Clone, Debug)]
pub struct ReferenceAssignment {
    pub reference_name: String,
    pub referenced_primary_key: u32,
    pub attributes: Vec<(String, Value)>,
}

impl ReferenceAssignment {
    #[must_use]
    pub fn new(reference_name: impl Into<String>, referenced_primary_key: u32) -> Self {
        Self {
            reference_name: reference_name.into(),
            referenced_primary_key,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

///
/// EntityUpsert
///
/// The index-relevant projection of an entity record. Updates are modeled
/// as remove-then-upsert with the record's previous projection; the indices
/// never store the record body and cannot diff it themselves.
///

#[derive(Clone, Debug)]
pub struct EntityUpsert {
    pub primary_key: u32,
    pub scope: Scope,
    pub parent: Option<u32>,
    pub attributes: Vec<(String, Value)>,
    pub references: Vec<ReferenceAssignment>,
}

impl EntityUpsert {
    #[must_use]
    pub const fn new(primary_key: u32, scope: Scope) -> Self {
        Self {
            primary_key,
            scope,
            parent: None,
            attributes: Vec::new(),
            references: Vec::new(),
        }
    }

    #[must_use]
    pub const fn parent(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceAssignment) -> Self {
        self.references.push(reference);
        self
    }
}

/// Fan an entity upsert out across the collection's indices: the scope's
/// global index, one reduced index per relation instance and one
/// referenced-type index per reference name. Indices are created on first
/// use.
pub fn upsert_entity(
    collection: &mut EntityCollection,
    mut txn: Option<&mut Transaction>,
    entity: &EntityUpsert,
) -> Result<(), Error> {
    let primary_key = entity.primary_key;
    let with_hierarchy = collection.schema().with_hierarchy;

    {
        let global = collection.get_or_create_global(txn.as_deref_mut(), entity.scope)?;
        global.insert_record(txn.as_deref_mut(), primary_key);
        for (name, value) in &entity.attributes {
            global.insert_attribute(txn.as_deref_mut(), name, value.clone(), primary_key);
        }
        if with_hierarchy {
            global.set_parent(txn.as_deref_mut(), primary_key, entity.parent);
        }
    }

    for reference in &entity.references {
        let indexed = collection
            .schema()
            .reference(&reference.reference_name)
            .ok_or_else(|| QueryError::ReferenceNotFound {
                reference_name: reference.reference_name.clone(),
                entity_type: collection.entity_type().to_string(),
            })?
            .is_indexed_in(entity.scope);
        if !indexed {
            continue;
        }

        let reference_key =
            ReferenceKey::new(&reference.reference_name, reference.referenced_primary_key);

        let reduced_pk = {
            let reduced = collection.get_or_create_reduced(
                txn.as_deref_mut(),
                entity.scope,
                reference_key,
            )?;
            reduced.insert_record(txn.as_deref_mut(), primary_key);
            for (name, value) in &entity.attributes {
                reduced.insert_attribute(txn.as_deref_mut(), name, value.clone(), primary_key);
            }
            reduced.primary_key()
        };

        let referenced_type = collection.get_or_create_referenced_type(
            txn.as_deref_mut(),
            entity.scope,
            &reference.reference_name,
        )?;
        referenced_type.add_reference(
            txn.as_deref_mut(),
            reduced_pk,
            reference.referenced_primary_key,
        )?;
        for (name, value) in &reference.attributes {
            referenced_type.add_reference_attribute(
                txn.as_deref_mut(),
                reference.referenced_primary_key,
                name,
                value.clone(),
            );
        }
    }

    Ok(())
}

/// Reverse of [`upsert_entity`], fed with the record's indexed projection.
/// Reduced and referenced-type indices drained by the removal are destroyed.
pub fn remove_entity(
    collection: &mut EntityCollection,
    mut txn: Option<&mut Transaction>,
    entity: &EntityUpsert,
) -> Result<(), Error> {
    let primary_key = entity.primary_key;

    for reference in &entity.references {
        let Some(reference_schema) = collection.schema().reference(&reference.reference_name)
        else {
            continue;
        };
        if !reference_schema.is_indexed_in(entity.scope) {
            continue;
        }

        let reference_key =
            ReferenceKey::new(&reference.reference_name, reference.referenced_primary_key);
        let reduced_key = EntityIndexKey::reduced(entity.scope, reference_key);

        let reduced_pk = collection
            .index_pk(txn.as_deref(), &reduced_key)
            .ok_or_else(|| {
                InternalError::index_invariant(format!(
                    "reduced index for {reduced_key:?} missing while removing record {primary_key}"
                ))
            })?;

        let reduced_drained = {
            let Some(reduced) = collection
                .index_mut(txn.as_deref(), &reduced_key)
                .and_then(|variant| match variant {
                    EntityIndexVariant::Reduced(index) => Some(index),
                    _ => None,
                })
            else {
                return Err(InternalError::index_invariant(format!(
                    "index {reduced_pk} is not a reduced index"
                ))
                .into());
            };
            reduced.remove_record(txn.as_deref_mut(), primary_key);
            for (name, value) in &entity.attributes {
                reduced.remove_attribute(txn.as_deref_mut(), name, value, primary_key);
            }
            reduced.is_empty(txn.as_deref())
        };
        if reduced_drained {
            collection.remove_index(txn.as_deref_mut(), &reduced_key);
        }

        let referenced_type_key =
            EntityIndexKey::referenced_type(entity.scope, &reference.reference_name);
        let referenced_type_drained = {
            let Some(referenced_type) = collection
                .index_mut(txn.as_deref(), &referenced_type_key)
                .and_then(|variant| match variant {
                    EntityIndexVariant::ReferencedType(index) => Some(index),
                    _ => None,
                })
            else {
                return Err(InternalError::index_invariant(format!(
                    "referenced-type index for {referenced_type_key:?} missing while removing record {primary_key}"
                ))
                .into());
            };
            referenced_type.remove_reference(
                txn.as_deref_mut(),
                reduced_pk,
                reference.referenced_primary_key,
            )?;
            for (name, value) in &reference.attributes {
                referenced_type.remove_reference_attribute(
                    txn.as_deref_mut(),
                    reference.referenced_primary_key,
                    name,
                    value,
                )?;
            }
            referenced_type.is_empty(txn.as_deref())
                && referenced_type.cardinality().is_empty(txn.as_deref())
        };
        if referenced_type_drained {
            collection.remove_index(txn.as_deref_mut(), &referenced_type_key);
        }
    }

    let with_hierarchy = collection.schema().with_hierarchy;
    let global = collection.get_or_create_global(txn.as_deref_mut(), entity.scope)?;
    for (name, value) in &entity.attributes {
        global.remove_attribute(txn.as_deref_mut(), name, value, primary_key);
    }
    if with_hierarchy {
        global.remove_node(txn.as_deref_mut(), primary_key);
    }
    global.remove_record(txn.as_deref_mut(), primary_key);

    Ok(())
}
