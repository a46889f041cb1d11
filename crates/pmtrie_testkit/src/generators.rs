//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small alphabet so that random keys share
//! prefixes often, which is what exercises splits and branch nodes.

use pmtrie_pool::Handle;
use proptest::prelude::*;

/// Bytes random keys are drawn from: three letters plus both byte extremes.
pub const KEY_ALPHABET: [u8; 5] = [b'a', b'b', b'c', 0x00, 0xff];

/// Strategy for keys of up to `max_len` bytes over [`KEY_ALPHABET`].
pub fn key_strategy_with_len(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(KEY_ALPHABET.to_vec()), 0..=max_len)
}

/// Strategy for short keys, including the empty key.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    key_strategy_with_len(6)
}

/// Strategy for arbitrary binary keys.
pub fn binary_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// Strategy for non-null value handles.
pub fn value_strategy() -> impl Strategy<Value = Handle> {
    (1u64..1_000_000).prop_map(Handle::from_raw)
}

/// A single map operation.
#[derive(Debug, Clone)]
pub enum TrieOperation {
    /// Insert a value
    Insert {
        /// Key
        key: Vec<u8>,
        /// Value handle
        value: Handle,
    },
    /// Remove a key
    Remove {
        /// Key
        key: Vec<u8>,
    },
    /// Look a key up
    Get {
        /// Key
        key: Vec<u8>,
    },
}

/// Strategy for map operations, weighted towards inserts.
pub fn operation_strategy() -> impl Strategy<Value = TrieOperation> {
    prop_oneof![
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| TrieOperation::Insert { key, value }),
        2 => key_strategy().prop_map(|key| TrieOperation::Remove { key }),
        1 => key_strategy().prop_map(|key| TrieOperation::Get { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TrieOperation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_use_the_alphabet(key in key_strategy()) {
            prop_assert!(key.len() <= 6);
            prop_assert!(key.iter().all(|b| KEY_ALPHABET.contains(b)));
        }

        #[test]
        fn values_are_not_null(value in value_strategy()) {
            prop_assert!(!value.is_null());
        }

        #[test]
        fn sequences_respect_bounds(ops in operation_sequence_strategy(4, 16)) {
            prop_assert!(ops.len() >= 4 && ops.len() < 16);
        }
    }
}
