use crate::{
    index::{
        Bitmap, CardinalityIndex, EntityIndex, EntityIndexKey, FilterIndex, GlobalEntityIndex,
        ReferenceCardinalityIndex, ReferenceKey, StoragePart, remove_entity,
    },
    test_fixtures::{product_catalog, product_with_brand, upsert_brand, upsert_product},
    tx::Transaction,
};
use proptest::prelude::*;
use std::collections::HashMap;
use stratadb_query::{Scope, Value};

#[test]
fn cardinality_signals_first_add_and_last_remove() {
    let mut index = CardinalityIndex::new();

    assert!(index.add_record(None, "red", 1));
    assert!(!index.add_record(None, "red", 1));
    assert_eq!(index.cardinality(None, &"red", 1), 2);

    assert!(!index.remove_record(None, "red", 1).unwrap());
    assert!(index.remove_record(None, "red", 1).unwrap());
    assert_eq!(index.cardinality(None, &"red", 1), 0);
    assert!(index.is_empty(None));
}

#[test]
fn cardinality_remove_of_absent_key_is_fatal() {
    let mut index: CardinalityIndex<&str> = CardinalityIndex::new();
    let err = index.remove_record(None, "red", 1).unwrap_err();
    assert!(err.message.contains("expected but missing"));
}

#[test]
fn reference_cardinality_round_trip() {
    let mut index = ReferenceCardinalityIndex::new();

    index.add_reference(None, 10, 100).unwrap();
    index.add_reference(None, 20, 100).unwrap();
    index.remove_reference(None, 10, 100).unwrap();

    let result = index.index_primary_keys(None, &Bitmap::of([100]));
    assert_eq!(result.to_vec(), vec![20]);
}

#[test]
fn reference_cardinality_reverse_bitmap_survives_last_removal() {
    let mut index = ReferenceCardinalityIndex::new();

    index.add_reference(None, 10, 100).unwrap();
    let removed = index.remove_reference(None, 10, 100).unwrap();
    assert!(removed.last_of_pair);
    assert!(removed.last_of_index);

    // the bucket stays; emptiness is checked, not existence
    assert!(!index.referenced_is_present(None, 100));
    assert!(index.index_primary_keys(None, &Bitmap::of([100])).is_empty());
}

#[test]
fn reference_cardinality_counts_pairs_independently() {
    let mut index = ReferenceCardinalityIndex::new();

    // two occurrences of the same pair (multi-valued relation)
    assert!(index.add_reference(None, 10, 100).unwrap());
    assert!(!index.add_reference(None, 10, 100).unwrap());
    assert_eq!(index.index_total(None, 10), 2);

    let removed = index.remove_reference(None, 10, 100).unwrap();
    assert!(!removed.last_of_pair);
    assert!(index.referenced_is_present(None, 100));

    let removed = index.remove_reference(None, 10, 100).unwrap();
    assert!(removed.last_of_pair);
    assert!(removed.last_of_index);
}

#[test]
fn reference_cardinality_memoizes_between_transactions_only() {
    let mut index = ReferenceCardinalityIndex::new();
    index.add_reference(None, 10, 100).unwrap();

    // prime the memo outside a transaction
    assert_eq!(index.referenced_primary_keys(None).to_vec(), vec![100]);

    let mut txn = Transaction::new();
    index.add_reference(Some(&mut txn), 20, 200).unwrap();

    // inside the transaction the key set is computed fresh
    assert_eq!(
        index.referenced_primary_keys(Some(&txn)).to_vec(),
        vec![100, 200]
    );
    // outside readers still see the committed state
    assert_eq!(index.referenced_primary_keys(None).to_vec(), vec![100]);

    index.commit(&mut txn);
    assert_eq!(index.referenced_primary_keys(None).to_vec(), vec![100, 200]);
}

#[test]
fn filter_index_prunes_drained_value_buckets() {
    let mut index = FilterIndex::new();
    index.add_record(None, Value::string("red"), 1);
    index.add_record(None, Value::string("red"), 2);

    index.remove_record(None, &Value::string("red"), 1);
    assert_eq!(
        index.records_equal_to(None, &Value::string("red")).to_vec(),
        vec![2]
    );

    index.remove_record(None, &Value::string("red"), 2);
    assert!(index.is_empty(None));
}

#[test]
fn entity_index_tracks_dirtiness() {
    let mut index = EntityIndex::new(1, EntityIndexKey::global(Scope::Live));
    assert!(!index.is_dirty(None));

    index.insert_record(None, 5);
    index.insert_attribute(None, "code", Value::string("a"), 5);
    assert!(index.is_dirty(None));

    index.reset_dirty();
    assert!(!index.is_dirty(None));
}

#[test]
fn storage_part_is_dirty_gated_and_round_trips() {
    let mut global = GlobalEntityIndex::new(2, EntityIndexKey::global(Scope::Live));
    global.insert_record(None, 5);
    global.insert_attribute(None, "code", Value::string("a"), 5);

    let part = global.create_storage_part(None).unwrap();
    let bytes = part.to_bytes().unwrap();
    let decoded = StoragePart::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.index_primary_key(), 2);

    // once persisted and reset, no part is produced until the next change
    global.reset_dirty();
    assert!(global.create_storage_part(None).is_none());
}

#[test]
fn mutation_destroys_drained_reduced_indexes() {
    let mut catalog = product_catalog();
    upsert_brand(&mut catalog, None, 100, "Acme");
    upsert_product(&mut catalog, None, &product_with_brand(5, 100, "p-5"));

    let products = catalog.collection("Product").unwrap();
    let reduced_key = EntityIndexKey::reduced(Scope::Live, ReferenceKey::new("brand", 100));
    assert!(products.index_pk(None, &reduced_key).is_some());

    let collection = catalog.collection_mut("Product").unwrap();
    remove_entity(collection, None, &product_with_brand(5, 100, "p-5")).unwrap();

    let products = catalog.collection("Product").unwrap();
    assert!(products.index_pk(None, &reduced_key).is_none());
    assert!(
        products
            .referenced_type_index(None, Scope::Live, "brand")
            .is_none()
    );
}

proptest! {
    #[test]
    fn cardinality_net_count_matches_model(
        ops in prop::collection::vec((0u32..4, 0u32..3, prop::bool::ANY), 0..64)
    ) {
        let mut index = CardinalityIndex::new();
        let mut model: HashMap<(u32, u32), i64> = HashMap::new();

        for (record, value, add) in ops {
            let slot = (record, value);
            if add {
                let first = index.add_record(None, value, record);
                let count = model.entry(slot).or_insert(0);
                prop_assert_eq!(first, *count == 0);
                *count += 1;
            } else if model.get(&slot).copied().unwrap_or(0) > 0 {
                let last = index.remove_record(None, value, record).unwrap();
                let count = model.entry(slot).or_insert(0);
                *count -= 1;
                prop_assert_eq!(last, *count == 0);
            } else {
                // removing an absent slot must fail loudly
                prop_assert!(index.remove_record(None, value, record).is_err());
            }
        }

        for ((record, value), count) in model {
            prop_assert_eq!(
                index.cardinality(None, &value, record),
                u32::try_from(count.max(0)).unwrap_or(0)
            );
        }
        prop_assert_eq!(index.is_empty(None), index.entries(None).is_empty());
    }
}
