mod attribute;
mod bitmap;
mod bitmap_map;
mod cardinality;
mod entity;
mod filter_index;
mod hierarchy;
mod mutation;
mod reference;
mod storage;

#[cfg(test)]
mod tests;

pub use attribute::AttributeIndex;
pub use bitmap::Bitmap;
pub use bitmap_map::BitmapMap;
pub use cardinality::{CardinalityIndex, CardinalityKey};
pub use entity::{
    EntityIndex, EntityIndexKey, EntityIndexType, EntityIndexVariant, GlobalEntityIndex,
    IndexDiscriminator, ReducedEntityIndex, ReferenceKey, ReferencedTypeEntityIndex,
};
pub use filter_index::FilterIndex;
pub use hierarchy::HierarchyIndex;
pub use mutation::{EntityUpsert, ReferenceAssignment, remove_entity, upsert_entity};
pub use reference::{ReferenceCardinalityIndex, RemovedReference};
pub use storage::{
    AttributeBucketsPart, EntityIndexStoragePart, ReferencedTypeIndexStoragePart, StoragePart,
};
