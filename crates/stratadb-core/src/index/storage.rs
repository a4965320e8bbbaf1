use crate::{
    error::InternalError,
    index::{Bitmap, entity::EntityIndexKey},
    serialize,
};
use serde::{Deserialize, Serialize};
use stratadb_query::Value;

///
/// Storage parts
///
/// Opaque persistable snapshots handed to the storage collaborator. A part
/// is produced only while its index is dirty; the collaborator persists it,
/// then calls `reset_dirty` on the index, so unchanged indices are never
/// rewritten. The byte encoding is the engine's CBOR boundary; nothing else
/// about the on-disk format is decided here.
///

///
/// AttributeBucketsPart
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AttributeBucketsPart {
    pub name: String,
    pub buckets: Vec<(Value, Bitmap)>,
}

///
/// EntityIndexStoragePart
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EntityIndexStoragePart {
    pub index_primary_key: u32,
    pub index_key: EntityIndexKey,
    pub version: u32,
    pub entity_ids: Bitmap,
    pub attributes: Vec<AttributeBucketsPart>,
}

///
/// ReferencedTypeIndexStoragePart
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReferencedTypeIndexStoragePart {
    pub body: EntityIndexStoragePart,
    /// Composed `(index PK << 32 | referenced PK)` keys and their counts.
    pub reference_cardinalities: Vec<(u64, u32)>,
    /// `(referenced PK, attribute, value)` occurrence counts.
    pub attribute_cardinalities: Vec<(u32, (String, Value), u32)>,
}

///
/// StoragePart
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum StoragePart {
    EntityIndex(EntityIndexStoragePart),
    ReferencedTypeIndex(ReferencedTypeIndexStoragePart),
}

impl StoragePart {
    #[must_use]
    pub const fn index_primary_key(&self) -> u32 {
        match self {
            Self::EntityIndex(part) => part.index_primary_key,
            Self::ReferencedTypeIndex(part) => part.body.index_primary_key,
        }
    }

    /// Serialize into the opaque byte form the storage collaborator stores.
    pub fn to_bytes(&self) -> Result<Vec<u8>, InternalError> {
        serialize::serialize(self).map_err(Into::into)
    }

    /// Decode a previously serialized part.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InternalError> {
        serialize::deserialize(bytes).map_err(Into::into)
    }
}
