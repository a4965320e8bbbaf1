use crate::{
    error::{Error, QueryError},
    test_fixtures::{
        product_catalog, product_with_brand, product_with_tags, upsert_brand, upsert_product,
        upsert_tag,
    },
};
use stratadb_query::{
    FilterBy, OrderBy, OrderDirection, Query, Scope, attribute_equals, attribute_natural,
    entity_primary_key_natural, pick_first_by_entity_property, reference_having,
    reference_property, scope_in, traverse_by_entity_property, TraversalMode,
};

#[test]
fn primary_key_natural_descending() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    for pk in [5, 6, 7] {
        upsert_product(&mut catalog, None, &product_with_brand(pk, 100, "x"));
    }

    let query = Query::new().order_by(OrderBy::new([entity_primary_key_natural(
        OrderDirection::Desc,
    )]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![7, 6, 5]);
}

#[test]
fn attribute_natural_orders_by_value_runs() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "gamma"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 100, "alpha"));
    upsert_product(&mut catalog, None, &product_with_brand(7, 100, "beta"));

    let asc = Query::new().order_by(OrderBy::new([attribute_natural(
        "code",
        OrderDirection::Asc,
    )]));
    assert_eq!(catalog.query(None, "Product", &asc).unwrap(), vec![6, 7, 5]);

    let desc = Query::new().order_by(OrderBy::new([attribute_natural(
        "code",
        OrderDirection::Desc,
    )]));
    assert_eq!(catalog.query(None, "Product", &desc).unwrap(), vec![5, 7, 6]);
}

#[test]
fn sequential_sorter_groups_tags_into_atomic_blocks() {
    let mut catalog = product_catalog();
    for (pk, label) in [(10, "a"), (20, "b"), (30, "c")] {
        upsert_tag(&mut catalog, None, pk, label, None);
    }
    upsert_product(&mut catalog, None, &product_with_tags(1, "p-1", &[10, 20]));
    upsert_product(&mut catalog, None, &product_with_tags(2, "p-2", &[10]));
    upsert_product(&mut catalog, None, &product_with_tags(3, "p-3", &[30]));
    upsert_product(&mut catalog, None, &product_with_tags(4, "p-4", &[20]));

    // hierarchical target defaults to traversal order; all tags are roots,
    // so blocks follow ascending referenced primary key
    let query = Query::new().order_by(OrderBy::new([reference_property("tags", None, [])]));
    assert_eq!(
        catalog.query(None, "Product", &query).unwrap(),
        vec![1, 2, 4, 3]
    );
}

#[test]
fn traversal_order_follows_hierarchy_depth_first() {
    let mut catalog = product_catalog();
    upsert_tag(&mut catalog, None, 10, "root-a", None);
    upsert_tag(&mut catalog, None, 20, "child-of-a", Some(10));
    upsert_tag(&mut catalog, None, 30, "root-b", None);
    upsert_product(&mut catalog, None, &product_with_tags(1, "p-1", &[20]));
    upsert_product(&mut catalog, None, &product_with_tags(2, "p-2", &[10]));
    upsert_product(&mut catalog, None, &product_with_tags(3, "p-3", &[30]));

    let query = Query::new().order_by(OrderBy::new([reference_property(
        "tags",
        Some(traverse_by_entity_property(
            TraversalMode::DepthFirst,
            [entity_primary_key_natural(OrderDirection::Asc)],
        )),
        [],
    )]));
    // depth-first: 10, then its child 20, then 30
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![2, 1, 3]);
}

#[test]
fn pick_first_orders_by_referenced_attribute() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Zeta");
    upsert_brand(&mut catalog, None, 200, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "p-5"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 200, "p-6"));

    let query = Query::new().order_by(OrderBy::new([reference_property(
        "brand",
        Some(pick_first_by_entity_property([attribute_natural(
            "name",
            OrderDirection::Asc,
        )])),
        [],
    )]));
    // Acme (brand 200) sorts before Zeta (brand 100)
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![6, 5]);
}

#[test]
fn sorting_by_unindexed_reference_scope_is_a_usage_error() {
    let mut catalog = product_catalog();
    upsert_tag(&mut catalog, None, 10, "a", None);
    upsert_product(&mut catalog, None, &product_with_tags(1, "p-1", &[10]));

    // "tags" is indexed in Live only
    let query = Query::new()
        .scopes([Scope::Live, Scope::Archived])
        .order_by(OrderBy::new([reference_property("tags", None, [])]));
    let err = catalog.query(None, "Product", &query).unwrap_err();
    assert!(matches!(
        err,
        Error::Query(QueryError::ReferenceNotIndexed { .. })
    ));
}

#[test]
fn filter_and_order_compose_with_scope_selection() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "beta"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 100, "beta"));
    upsert_product(&mut catalog, None, &product_with_brand(7, 100, "alpha"));

    let query = Query::new()
        .filter_by(FilterBy::new([
            attribute_equals("code", "beta"),
            scope_in([Scope::Live]),
        ]))
        .order_by(OrderBy::new([entity_primary_key_natural(
            OrderDirection::Desc,
        )]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![6, 5]);
}

#[test]
fn narrowed_target_indexes_feed_the_reference_sorter() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_brand(&mut catalog, None, 200, "Other");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "p-5"));
    upsert_product(&mut catalog, None, &product_with_brand(6, 200, "p-6"));

    // the pk-pinned referenceHaving narrows the sorter to brand 200's block
    let query = Query::new()
        .filter_by(FilterBy::new([reference_having(
            "brand",
            [stratadb_query::entity_having(
                stratadb_query::entity_primary_key_in_set([200]),
            )],
        )]))
        .order_by(OrderBy::new([reference_property("brand", None, [])]));
    assert_eq!(catalog.query(None, "Product", &query).unwrap(), vec![6]);
}
