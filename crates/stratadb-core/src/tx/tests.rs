use crate::tx::{
    Transaction, TransactionalBitmap, TransactionalFlag, TransactionalMap, TransactionalSet,
};

#[test]
fn set_reader_isolation_until_commit() {
    let mut set = TransactionalSet::of([1u32, 2, 3]);
    let mut txn = Transaction::new();

    assert!(set.insert(Some(&mut txn), 4));
    assert!(set.remove(Some(&mut txn), &1));

    // the writing transaction reads its own writes
    assert!(set.contains(Some(&txn), &4));
    assert!(!set.contains(Some(&txn), &1));
    assert_eq!(set.keys(Some(&txn)), vec![2, 3, 4]);

    // a reader outside the transaction still sees the original base
    assert!(set.contains(None, &1));
    assert!(!set.contains(None, &4));
    assert_eq!(set.keys(None), vec![1, 2, 3]);

    set.commit(&mut txn);
    assert_eq!(set.keys(None), vec![2, 3, 4]);
}

#[test]
fn set_rollback_discards_diff() {
    let mut set = TransactionalSet::of([1u32, 2, 3]);
    let mut txn = Transaction::new();

    set.insert(Some(&mut txn), 4);
    set.remove(Some(&mut txn), &1);
    drop(txn);

    assert_eq!(set.keys(None), vec![1, 2, 3]);
}

#[test]
fn set_diff_semantics() {
    let mut set = TransactionalSet::of([1u32, 2]);
    let mut txn = Transaction::new();

    // inserting an already visible key is a no-op
    assert!(!set.insert(Some(&mut txn), 1));
    // double insert of a created key is a no-op
    assert!(set.insert(Some(&mut txn), 9));
    assert!(!set.insert(Some(&mut txn), 9));
    // removing a created key nets out against the base
    assert!(set.remove(Some(&mut txn), &9));
    assert!(!set.contains(Some(&txn), &9));
    // removing an already removed key is idempotent and returns false
    assert!(set.remove(Some(&mut txn), &1));
    assert!(!set.remove(Some(&mut txn), &1));
    // removing a key absent everywhere is a no-op
    assert!(!set.remove(Some(&mut txn), &42));
    // resurrect a removed base key
    assert!(set.insert(Some(&mut txn), 1));
    assert!(set.contains(Some(&txn), &1));

    set.commit(&mut txn);
    assert_eq!(set.keys(None), vec![1, 2]);
}

#[test]
fn set_len_is_arithmetic_over_diff() {
    let mut set = TransactionalSet::of([1u32, 2, 3]);
    let mut txn = Transaction::new();

    set.insert(Some(&mut txn), 10);
    set.insert(Some(&mut txn), 11);
    set.remove(Some(&mut txn), &2);

    assert_eq!(set.len(Some(&txn)), 4);
    assert_eq!(set.len(None), 3);
}

#[test]
fn map_overlay_reads_and_commit() {
    let mut map = TransactionalMap::new();
    map.insert(None, "a".to_string(), 1u32);
    map.insert(None, "b".to_string(), 2);

    let mut txn = Transaction::new();
    map.insert(Some(&mut txn), "a".to_string(), 10);
    map.remove(Some(&mut txn), &"b".to_string());
    map.insert(Some(&mut txn), "c".to_string(), 3);

    assert_eq!(map.get(Some(&txn), &"a".to_string()), Some(&10));
    assert_eq!(map.get(Some(&txn), &"b".to_string()), None);
    assert_eq!(map.get(Some(&txn), &"c".to_string()), Some(&3));
    assert_eq!(map.len(Some(&txn)), 2);

    assert_eq!(map.get(None, &"a".to_string()), Some(&1));
    assert_eq!(map.get(None, &"b".to_string()), Some(&2));
    assert_eq!(map.len(None), 2);

    map.commit(&mut txn);
    assert_eq!(map.get(None, &"a".to_string()), Some(&10));
    assert_eq!(map.get(None, &"b".to_string()), None);
    assert_eq!(map.get(None, &"c".to_string()), Some(&3));
}

#[test]
fn map_remove_then_reinsert_within_transaction() {
    let mut map = TransactionalMap::new();
    map.insert(None, 1u32, "x".to_string());

    let mut txn = Transaction::new();
    assert!(map.remove(Some(&mut txn), &1));
    assert!(map.insert(Some(&mut txn), 1, "y".to_string()));
    assert_eq!(map.get(Some(&txn), &1), Some(&"y".to_string()));

    map.commit(&mut txn);
    assert_eq!(map.get(None, &1), Some(&"y".to_string()));
}

#[test]
fn bitmap_overlay_and_materialize() {
    let mut bitmap = TransactionalBitmap::of([1, 2, 3]);
    let mut txn = Transaction::new();

    assert!(bitmap.insert(Some(&mut txn), 4));
    assert!(bitmap.remove(Some(&mut txn), 1));
    assert!(!bitmap.insert(Some(&mut txn), 2));

    assert_eq!(bitmap.materialize(Some(&txn)).to_vec(), vec![2, 3, 4]);
    assert_eq!(bitmap.materialize(None).to_vec(), vec![1, 2, 3]);
    assert_eq!(bitmap.len(Some(&txn)), 3);

    bitmap.commit(&mut txn);
    assert_eq!(bitmap.materialize(None).to_vec(), vec![2, 3, 4]);
}

#[test]
fn bitmap_remove_added_key_nets_out() {
    let mut bitmap = TransactionalBitmap::new();
    let mut txn = Transaction::new();

    assert!(bitmap.insert(Some(&mut txn), 7));
    assert!(bitmap.remove(Some(&mut txn), 7));
    assert!(!bitmap.contains(Some(&txn), 7));

    bitmap.commit(&mut txn);
    assert!(bitmap.is_empty(None));
}

#[test]
fn flag_overlay_and_commit() {
    let mut flag = TransactionalFlag::new(false);
    let mut txn = Transaction::new();

    flag.set(Some(&mut txn), true);
    assert!(flag.get(Some(&txn)));
    assert!(!flag.get(None));

    flag.commit(&mut txn);
    assert!(flag.get(None));
}

#[test]
fn take_layer_missing_is_invariant_violation() {
    let mut txn = Transaction::new();
    let set = TransactionalSet::<u32>::new();

    let err = txn
        .take_layer::<crate::tx::SetChanges<u32>>(set.id())
        .unwrap_err();
    assert!(err.message.contains("no transactional layer"));
}

#[test]
fn independent_transactions_do_not_observe_each_other() {
    let mut set = TransactionalSet::of([1u32]);
    let mut t1 = Transaction::new();
    let mut t2 = Transaction::new();

    set.insert(Some(&mut t1), 2);
    set.insert(Some(&mut t2), 3);

    assert!(set.contains(Some(&t1), &2));
    assert!(!set.contains(Some(&t1), &3));
    assert!(set.contains(Some(&t2), &3));
    assert!(!set.contains(Some(&t2), &2));
}
