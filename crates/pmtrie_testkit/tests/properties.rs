//! Property tests for the radix tree map.

use pmtrie_core::RadixTreeMap;
use pmtrie_pool::{Handle, InMemoryPool};
use pmtrie_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::ControlFlow;
use std::sync::Arc;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn round_trip(entries in prop::collection::vec((key_strategy(), value_strategy()), 1..40)) {
        let test_map = TestMap::memory();
        let mut model = BTreeMap::new();
        for (key, value) in &entries {
            test_map.insert(key, *value).unwrap();
            model.insert(key.clone(), *value);
        }
        for (key, value) in &model {
            prop_assert_eq!(test_map.get(key).unwrap(), Some(*value));
        }
        test_map.verify().unwrap();
    }

    #[test]
    fn overwrite(key in key_strategy(), v1 in value_strategy(), v2 in value_strategy()) {
        let test_map = TestMap::memory();
        test_map.insert(&key, v1).unwrap();
        test_map.insert(&key, v2).unwrap();
        prop_assert_eq!(test_map.get(&key).unwrap(), Some(v2));
        prop_assert_eq!(test_map.len().unwrap(), 1);
    }

    #[test]
    fn absence(
        inserted in prop::collection::btree_set(key_strategy(), 0..30),
        probes in prop::collection::vec(key_strategy(), 1..30),
    ) {
        let test_map = TestMap::memory();
        for key in &inserted {
            test_map.insert(key, Handle::from_raw(1)).unwrap();
        }
        for probe in probes.iter().filter(|p| !inserted.contains(*p)) {
            prop_assert_eq!(test_map.get(probe).unwrap(), None);
            prop_assert!(!test_map.lookup(probe).unwrap());
        }
    }

    #[test]
    fn removed_keys_are_absent(
        inserted in prop::collection::btree_set(key_strategy(), 1..30),
        remove_mask in prop::collection::vec(any::<bool>(), 30),
    ) {
        let test_map = TestMap::memory();
        for key in &inserted {
            test_map.insert(key, Handle::from_raw(7)).unwrap();
        }
        let mut kept = BTreeSet::new();
        for (key, remove) in inserted.iter().zip(remove_mask) {
            if remove {
                prop_assert_eq!(test_map.remove(key).unwrap(), Some(Handle::from_raw(7)));
                prop_assert!(!test_map.lookup(key).unwrap());
            } else {
                kept.insert(key.clone());
            }
        }
        let seen: BTreeSet<_> = test_map.keys().into_iter().collect();
        prop_assert_eq!(seen, kept);
        test_map.verify().unwrap();
    }

    #[test]
    fn traversal_completeness(keys in prop::collection::btree_set(binary_key_strategy(), 0..50)) {
        let test_map = TestMap::memory();
        for key in &keys {
            test_map.insert(key, Handle::from_raw(3)).unwrap();
        }

        let mut visits = Vec::new();
        let flow = test_map
            .foreach(|entry| {
                visits.push(entry.key.to_vec());
                ControlFlow::Continue(())
            })
            .unwrap();
        prop_assert!(flow.is_continue());
        prop_assert_eq!(visits.len(), keys.len());
        let unique: BTreeSet<_> = visits.into_iter().collect();
        prop_assert_eq!(unique, keys);
    }

    #[test]
    fn post_order_children_before_parent(keys in prop::collection::btree_set(key_strategy(), 1..30)) {
        let test_map = TestMap::memory();
        for key in &keys {
            test_map.insert(key, Handle::from_raw(1)).unwrap();
        }

        let order = test_map.keys();
        for (i, key) in order.iter().enumerate() {
            // Nothing visited after a key may extend it.
            for later in &order[i + 1..] {
                prop_assert!(!later.starts_with(key) || later == key);
            }
        }
    }

    #[test]
    fn model_checked_sequences(ops in operation_sequence_strategy(1, 80)) {
        let test_map = TestMap::memory();
        run_operations(&test_map.map, &ops).map_err(|e| TestCaseError::fail(e))?;
    }

    #[test]
    fn removing_everything_empties_the_map(keys in prop::collection::btree_set(key_strategy(), 1..30)) {
        let test_map = TestMap::memory();
        for key in &keys {
            test_map.insert(key, Handle::from_raw(1)).unwrap();
        }
        for key in keys.iter().rev() {
            test_map.remove(key).unwrap();
        }
        prop_assert!(test_map.is_empty().unwrap());
        prop_assert_eq!(test_map.pool.object_count(), 1);
    }

    #[test]
    fn clear_then_reuse(keys in prop::collection::btree_set(key_strategy(), 0..30)) {
        let pool = Arc::new(InMemoryPool::new());
        let map = RadixTreeMap::create(Arc::clone(&pool)).unwrap();
        for key in &keys {
            map.insert(key, Handle::from_raw(2)).unwrap();
        }
        map.clear().unwrap();
        prop_assert!(map.is_empty().unwrap());
        prop_assert_eq!(pool.object_count(), 1);
    }
}
