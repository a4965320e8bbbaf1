//! Transactional indexing and query-evaluation core: copy-on-write
//! transactional containers, cardinality-tracking indices over entity
//! records, and a lazy memoized formula algebra compiled from declarative
//! constraints.
#![warn(unreachable_pub)]

pub mod catalog;
pub mod collection;
pub mod error;
pub mod hash;
pub mod index;
pub mod model;
pub mod obs;
pub mod query;
pub mod serialize;
pub mod tx;

#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Upper bound on serialized storage-part payloads.
///
/// Parts above this size indicate a runaway index snapshot; the storage
/// collaborator splits its own payloads and never expects more.
pub const MAX_STORAGE_PART_BYTES: u32 = 8 * 1024 * 1024;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, translators, stores, serializers, or helpers are re-exported
/// here.
///

pub mod prelude {
    pub use crate::{
        catalog::Catalog,
        collection::EntityCollection,
        index::{Bitmap, EntityIndexKey, ReferenceKey},
        model::{AttributeSchema, EntitySchema, ReferenceSchema},
        tx::Transaction,
    };
    pub use stratadb_query::{Locale, Query, Scope, Value};
}
