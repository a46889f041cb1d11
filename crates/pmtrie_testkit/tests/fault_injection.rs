//! Failure atomicity of map operations under injected pool faults.

use pmtrie_core::{CoreError, RadixTreeMap};
use pmtrie_pool::{DurablePool, Handle, InMemoryPool, PoolError};
use pmtrie_testkit::prelude::*;
use std::sync::Arc;

fn h(raw: u64) -> Handle {
    Handle::from_raw(raw)
}

fn faulty_map(keys: &[&str]) -> (Arc<FaultyPool<InMemoryPool>>, RadixTreeMap<FaultyPool<InMemoryPool>>) {
    init_tracing();
    let pool = Arc::new(FaultyPool::new(InMemoryPool::new()));
    let map = RadixTreeMap::create(Arc::clone(&pool)).unwrap();
    for (i, key) in keys.iter().enumerate() {
        map.insert(key.as_bytes(), h(i as u64 + 1)).unwrap();
    }
    (pool, map)
}

#[test]
fn split_alloc_failure_leaves_no_trace() {
    let (pool, map) = faulty_map(&["ab"]);
    let before = map.entries().unwrap();
    let objects = pool.inner().object_count();

    // Second allocation of the split is the new leaf.
    pool.fail_alloc_after(1);
    let err = map.insert(b"ac", h(2)).unwrap_err();
    assert!(err.is_allocation_failure());
    assert_eq!(pool.alloc_count(), 2);

    assert_eq!(map.entries().unwrap(), before);
    assert_eq!(map.get(b"ac").unwrap(), None);
    assert_eq!(pool.inner().object_count(), objects);
    assert_eq!(pool.tx_depth(), 0);
    map.verify().unwrap();
}

#[test]
fn first_alloc_failure_on_empty_map() {
    let (pool, map) = faulty_map(&[]);
    pool.fail_alloc_after(0);

    assert!(map.insert(b"k", h(1)).is_err());
    assert!(map.is_empty().unwrap());

    pool.reset();
    map.insert(b"k", h(1)).unwrap();
    assert_eq!(map.get(b"k").unwrap(), Some(h(1)));
}

#[test]
fn rolled_back_insert_is_not_counted() {
    let (pool, map) = faulty_map(&[]);

    // The leaf is allocated and filled, then storing it in the root fails.
    pool.fail_snapshot_after(1);
    assert!(map.insert(b"k", h(1)).is_err());
    assert_eq!(pool.inner().object_count(), 1);

    let stats = map.stats();
    assert_eq!(stats.nodes_allocated, 0);
    assert_eq!(stats.transactions_aborted, 1);

    pool.reset();
    map.insert(b"k", h(1)).unwrap();
    assert_eq!(map.stats().nodes_allocated, 1);
}

#[test]
fn rolled_back_split_and_remove_are_not_counted() {
    let (pool, map) = faulty_map(&["ab"]);
    let committed = map.stats();

    pool.set_fail_on_commit(true);
    assert!(map.insert(b"ac", h(2)).is_err());
    assert!(map.remove(b"ab").is_err());
    assert!(map.clear().is_err());
    pool.reset();

    let stats = map.stats();
    assert_eq!(stats.splits, committed.splits);
    assert_eq!(stats.nodes_allocated, committed.nodes_allocated);
    assert_eq!(stats.nodes_freed, committed.nodes_freed);
    assert_eq!(stats.transactions_aborted, 3);
    assert_eq!(map.len().unwrap(), 1);
}

#[test]
fn snapshot_failure_during_remove() {
    let (pool, map) = faulty_map(&["ab", "ac"]);
    let before = map.entries().unwrap();

    for n in 0..2 {
        pool.fail_snapshot_after(n);
        let err = map.remove(b"ac").unwrap_err();
        assert!(matches!(err, CoreError::Pool(PoolError::SnapshotFailed(_))));
        pool.reset();
        assert_eq!(map.entries().unwrap(), before);
    }
    assert_eq!(map.remove(b"ac").unwrap(), Some(h(2)));
}

#[test]
fn commit_failure_is_reported() {
    let (pool, map) = faulty_map(&["romane", "romanus"]);
    pool.set_fail_on_commit(true);

    let err = map.insert(b"romulus", h(3)).unwrap_err();
    assert!(err.is_transaction_failure());
    pool.reset();

    assert_eq!(map.len().unwrap(), 2);
    assert!(!map.lookup(b"romulus").unwrap());
    assert_eq!(map.stats().transactions_aborted, 1);
}

#[test]
fn failure_inside_caller_transaction_dooms_it() {
    let (pool, map) = faulty_map(&["base"]);
    let before = map.entries().unwrap();

    pool.begin().unwrap();
    map.insert(b"one", h(2)).unwrap();
    pool.fail_alloc_after(0);
    assert!(map.insert(b"two", h(3)).is_err());
    pool.reset();

    // The caller's transaction can no longer commit.
    assert!(pool.commit().is_err());
    assert_eq!(pool.tx_depth(), 0);
    assert_eq!(map.entries().unwrap(), before);
}

#[test]
fn insert_new_value_alloc_failure() {
    let (pool, map) = faulty_map(&["a"]);
    let objects = pool.inner().object_count();

    pool.fail_alloc_after(0);
    assert!(map
        .insert_new(b"b", 32, 9, |_| Ok(()))
        .unwrap_err()
        .is_allocation_failure());
    pool.reset();

    assert_eq!(pool.inner().object_count(), objects);
    assert!(!map.lookup(b"b").unwrap());
}

#[test]
fn harness_covers_every_allocation() {
    let mut harness = CrashRecoveryHarness::new(
        pmtrie_testkit::fixtures::scenarios::ROMAN_KEYS.iter().zip(1u64..),
    );
    let ok = harness.run_all("mixed batch", |map| {
        map.insert(b"rubicundissimus", h(50))?;
        map.insert(b"r", h(51))?;
        map.insert(b"", h(52))?;
        map.remove(b"ruber")?;
        map.remove_free(b"nothing")?;
        Ok(())
    });
    assert!(ok, "{:#?}", harness.results);
    assert_eq!(harness.results.len(), 5);
}
