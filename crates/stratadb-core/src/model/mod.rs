mod schema;

pub use schema::{AttributeSchema, EntitySchema, ReferenceCardinality, ReferenceSchema};
