//! Operation counters and structural statistics.
//!
//! Two kinds of numbers are exposed:
//!
//! - [`TrieStats`]: monotonically increasing operation counters kept by a
//!   map handle since it was created or opened.
//! - [`TreeShape`]: a structural census computed by walking the tree.
//!
//! # Usage
//!
//! ```rust
//! use pmtrie_core::RadixTreeMap;
//! use pmtrie_pool::{Handle, InMemoryPool};
//! use std::sync::Arc;
//!
//! let map = RadixTreeMap::create(Arc::new(InMemoryPool::new())).unwrap();
//! map.insert(b"ab", Handle::from_raw(1)).unwrap();
//! map.insert(b"ac", Handle::from_raw(2)).unwrap();
//!
//! assert_eq!(map.stats().splits, 1);
//! assert_eq!(map.shape().unwrap().nodes, 3);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters for one map handle.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct TrieStats {
    inserts: AtomicU64,
    removes: AtomicU64,
    lookups: AtomicU64,
    splits: AtomicU64,
    nodes_allocated: AtomicU64,
    nodes_freed: AtomicU64,
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,
}

impl TrieStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds the structural changes of a committed mutation.
    pub(crate) fn record_changes(&self, changes: TreeChanges) {
        self.splits.fetch_add(changes.splits, Ordering::Relaxed);
        self.nodes_allocated
            .fetch_add(changes.nodes_allocated, Ordering::Relaxed);
        self.nodes_freed
            .fetch_add(changes.nodes_freed, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of insert calls.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Returns the number of remove calls.
    pub fn removes(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    /// Returns the number of get and lookup calls.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Returns the number of node splits committed.
    pub fn splits(&self) -> u64 {
        self.splits.load(Ordering::Relaxed)
    }

    /// Returns the number of nodes allocated by committed mutations.
    pub fn nodes_allocated(&self) -> u64 {
        self.nodes_allocated.load(Ordering::Relaxed)
    }

    /// Returns the number of nodes freed by committed mutations.
    pub fn nodes_freed(&self) -> u64 {
        self.nodes_freed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted.
    pub fn transactions_aborted(&self) -> u64 {
        self.transactions_aborted.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inserts: self.inserts(),
            removes: self.removes(),
            lookups: self.lookups(),
            splits: self.splits(),
            nodes_allocated: self.nodes_allocated(),
            nodes_freed: self.nodes_freed(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_aborted: self.transactions_aborted(),
        }
    }
}

/// Node-level changes made by one mutation.
///
/// Collected while the mutation runs and handed to
/// [`TrieStats::record_changes`] only after its transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TreeChanges {
    pub splits: u64,
    pub nodes_allocated: u64,
    pub nodes_freed: u64,
}

/// A point-in-time snapshot of [`TrieStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Number of insert calls.
    pub inserts: u64,
    /// Number of remove calls.
    pub removes: u64,
    /// Number of get and lookup calls.
    pub lookups: u64,
    /// Number of node splits.
    pub splits: u64,
    /// Number of nodes allocated.
    pub nodes_allocated: u64,
    /// Number of nodes freed.
    pub nodes_freed: u64,
    /// Number of transactions started.
    pub transactions_started: u64,
    /// Number of transactions committed.
    pub transactions_committed: u64,
    /// Number of transactions aborted.
    pub transactions_aborted: u64,
}

/// Structural census of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreeShape {
    /// Total number of nodes.
    pub nodes: usize,
    /// Nodes carrying a value.
    pub values: usize,
    /// Value-less nodes (pure branching points).
    pub branch_nodes: usize,
    /// Value-less nodes with exactly one child, left behind by removals.
    pub single_child_branches: usize,
    /// Number of nodes on the longest root-to-leaf path.
    pub max_depth: usize,
    /// Length of the longest stored full key.
    pub max_key_len: usize,
    /// Pool bytes occupied by node objects.
    pub node_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = TrieStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_operations() {
        let stats = TrieStats::new();
        stats.record_insert();
        stats.record_insert();
        stats.record_changes(TreeChanges {
            splits: 1,
            nodes_allocated: 3,
            nodes_freed: 1,
        });

        let snap = stats.snapshot();
        assert_eq!(snap.inserts, 2);
        assert_eq!(snap.splits, 1);
        assert_eq!(snap.nodes_allocated, 3);
        assert_eq!(snap.nodes_freed, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(TrieStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_lookup();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.lookups(), 800);
    }
}
