use crate::{
    error::{Error, QueryError},
    index::ReferenceAssignment,
    test_fixtures::{
        product_catalog, product_with_brand, upsert_brand, upsert_product,
    },
    tx::Transaction,
};
use stratadb_query::{
    Query, attribute_equals, entity_having, entity_primary_key_in_set, not, or, reference_having,
};

fn filter_query(constraint: stratadb_query::FilterConstraint) -> Query {
    Query::new().filter_by(stratadb_query::FilterBy::new([constraint]))
}

#[test]
fn attribute_equals_matches_indexed_records() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "alpha"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 100, "beta"));

    let result = catalog
        .query(None, "Product", &filter_query(attribute_equals("code", "beta")))
        .unwrap();
    assert_eq!(result, vec![6]);
}

#[test]
fn reference_having_with_entity_having_resolves_nested_query() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_brand(&mut catalog, None, 200, "Other");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "p-5"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 200, "p-6"));

    let query = filter_query(reference_having(
        "brand",
        [entity_having(attribute_equals("name", "Acme"))],
    ));
    let result = catalog.query(None, "Product", &query).unwrap();
    assert_eq!(result, vec![5]);
}

#[test]
fn reference_having_filters_by_reference_attributes() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_brand(&mut catalog, None, 200, "Other");

    let featured = crate::index::EntityUpsert::new(5, stratadb_query::Scope::Live)
        .with_attribute("code", "p-5")
        .with_reference(ReferenceAssignment::new("brand", 100).with_attribute("priority", 1i64));
    let plain = crate::index::EntityUpsert::new(6, stratadb_query::Scope::Live)
        .with_attribute("code", "p-6")
        .with_reference(ReferenceAssignment::new("brand", 200).with_attribute("priority", 2i64));
    upsert_product(&mut catalog, None, &featured);
    upsert_product(&mut catalog, None, &plain);

    let query = filter_query(reference_having(
        "brand",
        [attribute_equals("priority", 1i64)],
    ));
    let result = catalog.query(None, "Product", &query).unwrap();
    assert_eq!(result, vec![5]);
}

#[test]
fn reference_having_without_index_yields_no_matches() {
    let catalog = product_catalog();

    // no product ever referenced a brand, so no referenced-type index exists
    let query = filter_query(reference_having(
        "brand",
        [entity_having(attribute_equals("name", "Acme"))],
    ));
    let result = catalog.query(None, "Product", &query).unwrap();
    assert!(result.is_empty());
}

#[test]
fn boolean_combinators_compose() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "alpha"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 100, "beta"));
    upsert_product(&mut catalog, None, &product_with_brand(7, 100, "gamma"));

    let query = filter_query(or([
        attribute_equals("code", "alpha"),
        attribute_equals("code", "gamma"),
    ]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![5, 7]);

    let query = filter_query(not(attribute_equals("code", "beta")));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![5, 7]);

    let query = filter_query(entity_primary_key_in_set([6, 7, 99]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![6, 7]);
}

#[test]
fn unknown_reference_is_a_usage_error() {
    let catalog = product_catalog();
    let query = filter_query(reference_having("owner", []));
    let err = catalog.query(None, "Product", &query).unwrap_err();
    assert!(matches!(
        err,
        Error::Query(QueryError::ReferenceNotFound { .. })
    ));
    assert!(err.is_recoverable());
}

#[test]
fn entity_having_outside_reference_is_a_usage_error() {
    let catalog = product_catalog();
    let query = filter_query(entity_having(attribute_equals("name", "Acme")));
    let err = catalog.query(None, "Product", &query).unwrap_err();
    assert!(matches!(
        err,
        Error::Query(QueryError::EntityHavingOutsideReference)
    ));
}

#[test]
fn entity_having_against_unmanaged_reference_is_a_usage_error() {
    let mut catalog = product_catalog();
    let vendor_ref = crate::index::EntityUpsert::new(5, stratadb_query::Scope::Live)
        .with_reference(ReferenceAssignment::new("vendor", 31));
    upsert_product(&mut catalog, None, &vendor_ref);

    let query = filter_query(reference_having(
        "vendor",
        [entity_having(attribute_equals("name", "x"))],
    ));
    let err = catalog.query(None, "Product", &query).unwrap_err();
    assert!(matches!(
        err,
        Error::Query(QueryError::UnmanagedReferencedType { .. })
    ));
}

#[test]
fn non_filterable_attribute_is_a_usage_error() {
    let catalog = product_catalog();
    let query = filter_query(attribute_equals("internal", "x"));
    let err = catalog.query(None, "Product", &query).unwrap_err();
    assert!(matches!(
        err,
        Error::Query(QueryError::AttributeNotFilterable { .. })
    ));
}

#[test]
fn uncommitted_mutations_are_visible_only_to_their_transaction() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "p-5"));

    let mut txn = Transaction::new();
    upsert_product(
        &mut catalog,
        Some(&mut txn),
        &product_with_brand(6, 100, "p-6"),
    );

    let query = filter_query(reference_having("brand", []));
    assert_eq!(
        catalog.query(Some(&txn), "Product", &query).unwrap(),
        vec![5, 6]
    );
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![5]);

    catalog.commit(txn);
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![5, 6]);
}

#[test]
fn enricher_injects_ambient_filters_into_nested_queries() {
    use crate::{
        index::Bitmap,
        model::EntitySchema,
        query::{algebra::Formula, context::NestedFormulaEnricher},
    };

    struct VisibleBrands(Vec<u32>);

    impl NestedFormulaEnricher for VisibleBrands {
        fn enrich<'f>(&self, formula: Formula<'f>, _schema: &EntitySchema) -> Formula<'f> {
            Formula::and(vec![
                formula,
                Formula::constant(Bitmap::of(self.0.iter().copied())),
            ])
        }
    }

    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_brand(&mut catalog, None, 200, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "p-5"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 200, "p-6"));

    let query = filter_query(reference_having(
        "brand",
        [entity_having(attribute_equals("name", "Acme"))],
    ));
    // both brands match the nested filter, but only brand 200 is visible
    let enricher = VisibleBrands(vec![200]);
    let result = catalog
        .query_with_enricher(None, "Product", &query, &enricher)
        .unwrap();
    assert_eq!(result, vec![6]);
}

#[test]
fn rolled_back_mutations_leave_no_trace() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");

    let mut txn = Transaction::new();
    upsert_product(
        &mut catalog,
        Some(&mut txn),
        &product_with_brand(5, 100, "p-5"),
    );
    catalog.rollback(txn);

    let query = filter_query(reference_having("brand", []));
    assert!(catalog.query(None, "Product", &query).unwrap().is_empty());
}
