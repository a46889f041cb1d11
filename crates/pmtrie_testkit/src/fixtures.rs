//! Test fixtures and map helpers.
//!
//! Provides convenience functions for setting up test maps and common
//! test scenarios.

use pmtrie_core::{RadixTreeMap, TrieConfig};
use pmtrie_pool::{Handle, InMemoryPool, PoolConfig};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

/// A test map together with the pool it lives in.
pub struct TestMap {
    /// The pool holding the map.
    pub pool: Arc<InMemoryPool>,
    /// The map instance.
    pub map: RadixTreeMap<InMemoryPool>,
}

impl TestMap {
    /// Creates an empty map in an unbounded in-memory pool.
    pub fn memory() -> Self {
        Self::with_configs(PoolConfig::default(), TrieConfig::default())
    }

    /// Creates an empty map in a pool limited to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_configs(PoolConfig::new().capacity(capacity), TrieConfig::default())
    }

    /// Creates an empty map with the given pool and map configuration.
    pub fn with_configs(pool_config: PoolConfig, config: TrieConfig) -> Self {
        let pool = Arc::new(InMemoryPool::with_config(pool_config));
        let map = RadixTreeMap::create_with_config(Arc::clone(&pool), config)
            .expect("Failed to create test map");
        Self { pool, map }
    }

    /// Re-attaches to the same map object through a fresh handle.
    pub fn reopen(&self) -> RadixTreeMap<InMemoryPool> {
        RadixTreeMap::open(Arc::clone(&self.pool), self.map.handle())
            .expect("Failed to reopen test map")
    }

    /// Returns all stored keys in traversal order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.map
            .entries()
            .expect("Failed to list entries")
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }
}

impl std::ops::Deref for TestMap {
    type Target = RadixTreeMap<InMemoryPool>;

    fn deref(&self) -> &Self::Target {
        &self.map
    }
}

/// Runs a test with a temporary in-memory map.
///
/// # Example
///
/// ```rust
/// use pmtrie_pool::Handle;
/// use pmtrie_testkit::with_temp_map;
///
/// with_temp_map(|map| {
///     map.insert(b"key", Handle::from_raw(1)).unwrap();
///     assert!(map.lookup(b"key").unwrap());
/// });
/// ```
pub fn with_temp_map<F, R>(f: F) -> R
where
    F: FnOnce(&RadixTreeMap<InMemoryPool>) -> R,
{
    let test_map = TestMap::memory();
    f(&test_map.map)
}

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Latin words sharing long prefixes, a classic radix tree example.
    pub const ROMAN_KEYS: [&str; 7] = [
        "romane",
        "romanus",
        "romulus",
        "rubens",
        "ruber",
        "rubicon",
        "rubicundus",
    ];

    /// Creates a map holding `keys`, each mapped to its 1-based index.
    pub fn map_with_keys<K: AsRef<[u8]>>(keys: &[K]) -> TestMap {
        let test_map = TestMap::memory();
        for (i, key) in keys.iter().enumerate() {
            test_map
                .map
                .insert(key.as_ref(), Handle::from_raw(i as u64 + 1))
                .expect("Failed to insert key");
        }
        test_map
    }

    /// Creates a map holding `count` numbered keys.
    pub fn populated_map(count: usize) -> TestMap {
        let keys: Vec<String> = (0..count).map(|i| format!("key-{i:05}")).collect();
        map_with_keys(keys.as_slice())
    }

    /// Creates a map holding [`ROMAN_KEYS`].
    pub fn roman_map() -> TestMap {
        map_with_keys(&ROMAN_KEYS[..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_map() {
        let test_map = TestMap::memory();
        assert!(test_map.is_empty().unwrap());
    }

    #[test]
    fn test_with_temp_map() {
        with_temp_map(|map| {
            map.insert(b"k", Handle::from_raw(1)).unwrap();
            assert_eq!(map.len().unwrap(), 1);
        });
    }

    #[test]
    fn test_roman_scenario() {
        init_tracing();
        let test_map = scenarios::roman_map();
        assert_eq!(test_map.len().unwrap(), scenarios::ROMAN_KEYS.len());
        assert_eq!(test_map.reopen().get(b"ruber").unwrap(), Some(Handle::from_raw(5)));
        test_map.verify().unwrap();
    }
}
