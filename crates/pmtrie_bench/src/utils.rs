//! Benchmark utilities.

use pmtrie_core::RadixTreeMap;
use pmtrie_pool::{Handle, InMemoryPool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Generate `count` random binary keys of `len` bytes.
pub fn random_keys(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| (0..len).map(|_| rng.gen()).collect())
        .collect()
}

/// Generate `count` keys sharing a `prefix_len`-byte prefix, which forces
/// long segments and a split near the leaves on every insert.
pub fn shared_prefix_keys(count: usize, prefix_len: usize) -> Vec<Vec<u8>> {
    let prefix = vec![b'p'; prefix_len];
    (0..count)
        .map(|i| {
            let mut key = prefix.clone();
            key.extend_from_slice(format!("{i:08}").as_bytes());
            key
        })
        .collect()
}

/// Build a map holding `keys`, each mapped to its 1-based index.
pub fn populated_map(keys: &[Vec<u8>]) -> RadixTreeMap<InMemoryPool> {
    let map =
        RadixTreeMap::create(Arc::new(InMemoryPool::new())).expect("Failed to create map");
    for (i, key) in keys.iter().enumerate() {
        map.insert(key, Handle::from_raw(i as u64 + 1))
            .expect("Failed to insert key");
    }
    map
}
