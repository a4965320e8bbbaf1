//! End-to-end coverage of the public engine surface: catalog bootstrap,
//! index maintenance through mutations, transactional isolation, query
//! evaluation and storage-part production.

use stratadb_core::{
    index::{EntityUpsert, ReferenceAssignment, upsert_entity},
    model::{AttributeSchema, EntitySchema, ReferenceCardinality, ReferenceSchema},
    prelude::*,
};
use stratadb_query::{
    FilterBy, OrderBy, OrderDirection, attribute_equals, entity_having,
    entity_primary_key_natural, reference_having,
};

fn catalog_with_brands() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.create_collection(
        EntitySchema::new("Brand")
            .with_attribute(AttributeSchema::new("name").filterable().sortable()),
    );
    catalog.create_collection(
        EntitySchema::new("Product")
            .with_attribute(AttributeSchema::new("code").filterable().sortable())
            .with_reference(
                ReferenceSchema::new("brand", "Brand", ReferenceCardinality::ZeroOrOne)
                    .managed()
                    .indexed_in([Scope::Live]),
            ),
    );
    catalog
}

fn insert_brand(catalog: &mut Catalog, txn: Option<&mut Transaction>, pk: u32, name: &str) {
    let brands = catalog.collection_mut("Brand").expect("Brand collection");
    upsert_entity(
        brands,
        txn,
        &EntityUpsert::new(pk, Scope::Live).with_attribute("name", name),
    )
    .expect("brand upsert");
}

fn insert_product(catalog: &mut Catalog, txn: Option<&mut Transaction>, pk: u32, brand: u32) {
    let products = catalog.collection_mut("Product").expect("Product collection");
    upsert_entity(
        products,
        txn,
        &EntityUpsert::new(pk, Scope::Live)
            .with_attribute("code", format!("p-{pk}"))
            .with_reference(ReferenceAssignment::new("brand", brand)),
    )
    .expect("product upsert");
}

#[test]
fn nested_brand_query_end_to_end() {
    let mut catalog = catalog_with_brands();
    insert_brand(&mut catalog, None, 100, "Acme");
    insert_brand(&mut catalog, None, 200, "Other");
    insert_product(&mut catalog, None, 5, 100);
    insert_product(&mut catalog, None, 6, 200);

    let query = Query::new().filter_by(FilterBy::new([reference_having(
        "brand",
        [entity_having(attribute_equals("name", "Acme"))],
    )]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![5]);
}

#[test]
fn transactional_commit_and_rollback_round_trip() {
    let mut catalog = catalog_with_brands();
    insert_brand(&mut catalog, None, 100, "Acme");
    insert_product(&mut catalog, None, 5, 100);

    let all_products = Query::new().filter_by(FilterBy::new([reference_having("brand", [])]));

    // a transaction sees its own writes, outside readers do not
    let mut txn = Transaction::new();
    insert_product(&mut catalog, Some(&mut txn), 6, 100);
    assert_eq!(
        catalog.query(Some(&txn), "Product", &all_products).unwrap(),
        vec![5, 6]
    );
    assert_eq!(catalog.query(None, "Product", &all_products).unwrap(), vec![5]);

    catalog.commit(txn);
    assert_eq!(
        catalog.query(None, "Product", &all_products).unwrap(),
        vec![5, 6]
    );

    // a rolled back transaction leaves no trace
    let mut txn = Transaction::new();
    insert_product(&mut catalog, Some(&mut txn), 7, 100);
    catalog.rollback(txn);
    assert_eq!(
        catalog.query(None, "Product", &all_products).unwrap(),
        vec![5, 6]
    );
}

#[test]
fn dirty_indices_produce_storage_parts_once() {
    let mut catalog = catalog_with_brands();
    insert_brand(&mut catalog, None, 100, "Acme");
    insert_product(&mut catalog, None, 5, 100);

    let products = catalog.collection("Product").unwrap();
    let parts = products.dirty_storage_parts(None);
    assert!(!parts.is_empty());

    // parts survive the byte boundary
    for part in &parts {
        let bytes = part.to_bytes().unwrap();
        let decoded = stratadb_core::index::StoragePart::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.index_primary_key(), part.index_primary_key());
    }

    // after the persist cycle nothing is produced until the next change
    let products = catalog.collection_mut("Product").unwrap();
    products.reset_dirty();
    assert!(products.dirty_storage_parts(None).is_empty());

    insert_product(&mut catalog, None, 6, 100);
    let products = catalog.collection("Product").unwrap();
    assert!(!products.dirty_storage_parts(None).is_empty());
}

#[test]
fn ordering_composes_with_filtering() {
    let mut catalog = catalog_with_brands();
    insert_brand(&mut catalog, None, 100, "Acme");
    for pk in [5, 6, 7] {
        insert_product(&mut catalog, None, pk, 100);
    }

    let query = Query::new()
        .filter_by(FilterBy::new([reference_having("brand", [])]))
        .order_by(OrderBy::new([entity_primary_key_natural(
            OrderDirection::Desc,
        )]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![7, 6, 5]);
}
