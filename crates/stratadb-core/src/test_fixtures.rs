use crate::{
    catalog::Catalog,
    index::{EntityUpsert, ReferenceAssignment, upsert_entity},
    model::{AttributeSchema, EntitySchema, ReferenceCardinality, ReferenceSchema},
    tx::Transaction,
};
use stratadb_query::Scope;

/// Catalog with a Product collection referencing managed Brand (0..1) and
/// hierarchical Tag (0..N) collections.
pub(crate) fn product_catalog() -> Catalog {
    let mut catalog = Catalog::new();

    catalog.create_collection(
        EntitySchema::new("Brand")
            .with_attribute(AttributeSchema::new("name").filterable().sortable()),
    );

    catalog.create_collection(
        EntitySchema::new("Tag")
            .with_hierarchy()
            .with_attribute(AttributeSchema::new("label").filterable().sortable()),
    );

    catalog.create_collection(
        EntitySchema::new("Product")
            .with_attribute(AttributeSchema::new("code").filterable().sortable())
            .with_attribute(AttributeSchema::new("internal"))
            .with_reference(
                ReferenceSchema::new("brand", "Brand", ReferenceCardinality::ZeroOrOne)
                    .managed()
                    .indexed_in([Scope::Live, Scope::Archived])
                    .with_attribute(AttributeSchema::new("priority").filterable()),
            )
            .with_reference(
                ReferenceSchema::new("tags", "Tag", ReferenceCardinality::ZeroOrMore)
                    .managed()
                    .indexed_in([Scope::Live]),
            )
            .with_reference(
                ReferenceSchema::new("vendor", "Vendor", ReferenceCardinality::ZeroOrOne)
                    .indexed_in([Scope::Live]),
            ),
    );

    catalog
}

pub(crate) fn upsert_brand(
    catalog: &mut Catalog,
    txn: Option<&mut Transaction>,
    pk: u32,
    name: &str,
) {
    let collection = catalog
        .collection_mut("Brand")
        .unwrap_or_else(|| panic!("Brand collection missing"));
    upsert_entity(
        collection,
        txn,
        &EntityUpsert::new(pk, Scope::Live).with_attribute("name", name),
    )
    .unwrap_or_else(|err| panic!("brand upsert failed: {err}"));
}

pub(crate) fn upsert_tag(
    catalog: &mut Catalog,
    txn: Option<&mut Transaction>,
    pk: u32,
    label: &str,
    parent: Option<u32>,
) {
    let collection = catalog
        .collection_mut("Tag")
        .unwrap_or_else(|| panic!("Tag collection missing"));
    let mut upsert = EntityUpsert::new(pk, Scope::Live).with_attribute("label", label);
    if let Some(parent) = parent {
        upsert = upsert.parent(parent);
    }
    upsert_entity(collection, txn, &upsert)
        .unwrap_or_else(|err| panic!("tag upsert failed: {err}"));
}

pub(crate) fn upsert_product(
    catalog: &mut Catalog,
    txn: Option<&mut Transaction>,
    upsert: &EntityUpsert,
) {
    let collection = catalog
        .collection_mut("Product")
        .unwrap_or_else(|| panic!("Product collection missing"));
    upsert_entity(collection, txn, upsert)
        .unwrap_or_else(|err| panic!("product upsert failed: {err}"));
}

pub(crate) fn product_with_brand(pk: u32, brand_pk: u32, code: &str) -> EntityUpsert {
    EntityUpsert::new(pk, Scope::Live)
        .with_attribute("code", code)
        .with_reference(ReferenceAssignment::new("brand", brand_pk))
}

pub(crate) fn product_with_tags(pk: u32, code: &str, tag_pks: &[u32]) -> EntityUpsert {
    let mut upsert = EntityUpsert::new(pk, Scope::Live).with_attribute("code", code);
    for tag_pk in tag_pks {
        upsert = upsert.with_reference(ReferenceAssignment::new("tags", *tag_pk));
    }
    upsert
}
