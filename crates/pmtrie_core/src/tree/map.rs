//! The radix tree map handle.

use crate::config::TrieConfig;
use crate::error::{CoreError, CoreResult};
use crate::node::{Slot, MAP_OBJECT_SIZE, MAP_TYPE_NUM};
use crate::stats::{StatsSnapshot, TreeChanges, TreeShape, TrieStats};
use crate::transaction;
use crate::tree::walk::{post_order, Entry, NodeVisit};
use crate::tree::{insert, remove, search, verify};
use parking_lot::{Mutex, MutexGuard};
use pmtrie_pool::{DurablePool, Handle};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

/// A crash-consistent radix tree stored in a durable pool.
///
/// `RadixTreeMap` maps byte-string keys to value [`Handle`]s. Keys sharing
/// a prefix share the nodes for that prefix; each node branches 256 ways
/// on the byte following its key segment.
///
/// Every mutating call runs in one pool transaction: after a failure the
/// pool holds exactly the tree it held before the call.
///
/// # Concurrency
///
/// At most one writer may mutate a tree at a time. Mutating calls made
/// through the same handle are serialized when
/// [`TrieConfig::writer_lock`] is set; callers sharing a tree across
/// several handles must provide their own exclusion. Readers take no lock
/// and are not isolated from an in-flight writer.
///
/// # Example
///
/// ```rust
/// use pmtrie_core::RadixTreeMap;
/// use pmtrie_pool::{Handle, InMemoryPool};
/// use std::sync::Arc;
///
/// let map = RadixTreeMap::create(Arc::new(InMemoryPool::new())).unwrap();
/// map.insert(b"apple", Handle::from_raw(1)).unwrap();
/// map.insert(b"apply", Handle::from_raw(2)).unwrap();
///
/// assert_eq!(map.get(b"apple").unwrap(), Some(Handle::from_raw(1)));
/// assert!(!map.lookup(b"appl").unwrap());
/// assert_eq!(map.remove(b"apply").unwrap(), Some(Handle::from_raw(2)));
/// ```
pub struct RadixTreeMap<P: DurablePool> {
    pool: Arc<P>,
    handle: Handle,
    config: TrieConfig,
    stats: TrieStats,
    write_lock: Mutex<()>,
}

impl<P: DurablePool> std::fmt::Debug for RadixTreeMap<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadixTreeMap")
            .field("handle", &self.handle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: DurablePool> RadixTreeMap<P> {
    /// Creates a new empty map in `pool`.
    ///
    /// # Errors
    ///
    /// Fails if the map object cannot be allocated.
    pub fn create(pool: Arc<P>) -> CoreResult<Self> {
        Self::create_with_config(pool, TrieConfig::default())
    }

    /// Creates a new empty map with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if the map object cannot be allocated.
    pub fn create_with_config(pool: Arc<P>, config: TrieConfig) -> CoreResult<Self> {
        let stats = TrieStats::new();
        let handle = transaction::run(pool.as_ref(), &stats, "create", || {
            Ok(pool.alloc(MAP_OBJECT_SIZE, MAP_TYPE_NUM)?)
        })?;
        debug!(map = %handle, "created map");
        Ok(Self::attach(pool, handle, config, stats))
    }

    /// Re-attaches to an existing map object.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if `handle` does not name a live
    /// map object.
    pub fn open(pool: Arc<P>, handle: Handle) -> CoreResult<Self> {
        Self::open_with_config(pool, handle, TrieConfig::default())
    }

    /// Re-attaches to an existing map object with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if `handle` does not name a live
    /// map object.
    pub fn open_with_config(pool: Arc<P>, handle: Handle, config: TrieConfig) -> CoreResult<Self> {
        if Self::check(pool.as_ref(), handle) {
            return Err(CoreError::invalid_handle(handle));
        }
        debug!(map = %handle, "opened map");
        Ok(Self::attach(pool, handle, config, TrieStats::new()))
    }

    fn attach(pool: Arc<P>, handle: Handle, config: TrieConfig, stats: TrieStats) -> Self {
        Self {
            pool,
            handle,
            config,
            stats,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns true if `handle` is null or does not name a live map object.
    ///
    /// This is a cheap validity probe, not an integrity check; see
    /// [`RadixTreeMap::verify`] for the latter.
    pub fn check(pool: &P, handle: Handle) -> bool {
        handle.is_null() || pool.type_of(handle) != Some(MAP_TYPE_NUM)
    }

    /// Returns the handle of the map object.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the pool the map lives in.
    #[must_use]
    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Returns the map configuration.
    #[must_use]
    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Returns a snapshot of the operation counters of this handle.
    ///
    /// Node counters only include work from committed transactions.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn ensure_valid(&self) -> CoreResult<()> {
        if Self::check(self.pool.as_ref(), self.handle) {
            return Err(CoreError::invalid_handle(self.handle));
        }
        Ok(())
    }

    fn ensure_key(&self, key: &[u8]) -> CoreResult<()> {
        if key.len() > self.config.max_key_size {
            return Err(CoreError::KeyTooLarge {
                size: key.len(),
                max: self.config.max_key_size,
            });
        }
        Ok(())
    }

    fn writer(&self) -> Option<MutexGuard<'_, ()>> {
        self.config.writer_lock.then(|| self.write_lock.lock())
    }

    fn root_slot(&self) -> Slot {
        Slot::Root(self.handle)
    }

    fn root(&self) -> CoreResult<Handle> {
        self.root_slot().load(self.pool.as_ref())
    }

    fn transaction<T>(&self, op: &'static str, body: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        transaction::run(self.pool.as_ref(), &self.stats, op, body)
    }

    /// Returns true if the map holds no keys.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a stale handle.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.ensure_valid()?;
        Ok(self.root()?.is_null())
    }

    /// Inserts `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails if the key is too large, the handle is stale, or the pool
    /// cannot allocate a node; the map is unchanged on failure.
    pub fn insert(&self, key: &[u8], value: Handle) -> CoreResult<()> {
        self.ensure_valid()?;
        self.ensure_key(key)?;
        let _writer = self.writer();
        self.stats.record_insert();
        let changes = self.transaction("insert", || {
            insert::insert(self.pool.as_ref(), self.root_slot(), key, value)
        })?;
        self.stats.record_changes(changes);
        Ok(())
    }

    /// Allocates a value object of `size` bytes, fills it with
    /// `constructor`, and inserts it under `key`.
    ///
    /// Allocation, construction and insertion form one atomic unit.
    /// Returns the handle of the new value object.
    ///
    /// # Errors
    ///
    /// Fails if allocation fails, `constructor` fails, or the insertion
    /// fails; nothing is committed in that case.
    pub fn insert_new<F>(
        &self,
        key: &[u8],
        size: usize,
        type_num: u64,
        constructor: F,
    ) -> CoreResult<Handle>
    where
        F: FnOnce(&mut [u8]) -> CoreResult<()>,
    {
        self.ensure_valid()?;
        self.ensure_key(key)?;
        let _writer = self.writer();
        self.stats.record_insert();

        let (value, changes) = self.transaction("insert_new", || {
            let value = self.pool.alloc(size, type_num)?;
            let mut bytes = vec![0u8; size];
            constructor(&mut bytes)?;
            self.pool.write(value, 0, &bytes)?;
            let changes = insert::insert(self.pool.as_ref(), self.root_slot(), key, value)?;
            Ok((value, changes))
        })?;
        self.stats.record_changes(changes);
        Ok(value)
    }

    /// Removes `key`, returning the value it held.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a pool operation fails; the map is
    /// unchanged on failure.
    pub fn remove(&self, key: &[u8]) -> CoreResult<Option<Handle>> {
        self.ensure_valid()?;
        let _writer = self.writer();
        self.stats.record_remove();
        let (value, changes) = self.transaction("remove", || {
            remove::remove(self.pool.as_ref(), self.root_slot(), key)
        })?;
        self.stats.record_changes(changes);
        Ok(value)
    }

    /// Removes `key` and frees the value object it referenced.
    ///
    /// Returns true if the key was present.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a pool operation fails; neither the
    /// map nor the value object change on failure.
    pub fn remove_free(&self, key: &[u8]) -> CoreResult<bool> {
        self.ensure_valid()?;
        let _writer = self.writer();
        self.stats.record_remove();

        let (removed, changes) = self.transaction("remove_free", || {
            let (value, changes) = remove::remove(self.pool.as_ref(), self.root_slot(), key)?;
            if let Some(value) = value.filter(|value| !value.is_null()) {
                self.pool.free(value)?;
            }
            Ok((value.is_some(), changes))
        })?;
        self.stats.record_changes(changes);
        Ok(removed)
    }

    /// Returns true if a value is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a stale handle.
    pub fn lookup(&self, key: &[u8]) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for a stale handle.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Handle>> {
        self.ensure_valid()?;
        self.stats.record_lookup();
        search::get(self.pool.as_ref(), self.root()?, key)
    }

    /// Calls `visitor` for every stored entry in post-order: the entries
    /// below each child slot, in ascending slot order, come before the
    /// entry of the node itself.
    ///
    /// Returns `ControlFlow::Break` if the visitor stopped the walk.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a node cannot be read.
    pub fn foreach<F>(&self, mut visitor: F) -> CoreResult<ControlFlow<()>>
    where
        F: FnMut(Entry<'_>) -> ControlFlow<()>,
    {
        self.walk(|visit| match visit.entry() {
            Some(entry) => visitor(entry),
            None => ControlFlow::Continue(()),
        })
    }

    /// Calls `visitor` for every node, including value-less branching
    /// nodes, in the same order as [`RadixTreeMap::foreach`].
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a node cannot be read.
    pub fn walk<F>(&self, mut visitor: F) -> CoreResult<ControlFlow<()>>
    where
        F: FnMut(&NodeVisit<'_>) -> ControlFlow<()>,
    {
        self.ensure_valid()?;
        post_order(self.pool.as_ref(), self.root()?, |visit| Ok(visitor(visit)))
    }

    /// Returns all entries as `(key, value)` pairs in post-order.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a node cannot be read.
    pub fn entries(&self) -> CoreResult<Vec<(Vec<u8>, Handle)>> {
        let mut entries = Vec::new();
        self.foreach(|entry| {
            entries.push((entry.key.to_vec(), entry.value));
            ControlFlow::Continue(())
        })?;
        Ok(entries)
    }

    /// Returns the number of stored entries.
    ///
    /// This walks the whole tree.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a node cannot be read.
    pub fn len(&self) -> CoreResult<usize> {
        let mut count = 0;
        self.foreach(|_| {
            count += 1;
            ControlFlow::Continue(())
        })?;
        Ok(count)
    }

    /// Removes every key, freeing all nodes (value objects are not freed).
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a pool operation fails; the map is
    /// unchanged on failure.
    pub fn clear(&self) -> CoreResult<()> {
        self.ensure_valid()?;
        let _writer = self.writer();
        let changes = self.transaction("clear", || self.clear_locked())?;
        self.stats.record_changes(changes);
        debug!(map = %self.handle, freed = changes.nodes_freed, "cleared map");
        Ok(())
    }

    fn clear_locked(&self) -> CoreResult<TreeChanges> {
        let pool = self.pool.as_ref();
        let mut freed = 0u64;
        post_order(pool, self.root()?, |visit| {
            pool.free(visit.handle)?;
            freed += 1;
            Ok(ControlFlow::Continue(()))
        })?;
        self.root_slot().store(pool, Handle::NULL)?;
        Ok(TreeChanges {
            nodes_freed: freed,
            ..TreeChanges::default()
        })
    }

    /// Clears the map and frees the map object itself.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a pool operation fails; the map
    /// object survives on failure and can be reopened.
    pub fn destroy(self) -> CoreResult<()> {
        self.ensure_valid()?;
        let _writer = self.writer();
        let changes = self.transaction("destroy", || {
            let changes = self.clear_locked()?;
            self.pool.free(self.handle)?;
            Ok(changes)
        })?;
        debug!(map = %self.handle, freed = changes.nodes_freed, "destroyed map");
        Ok(())
    }

    /// Checks every node against the tree invariants.
    ///
    /// Value-less single-child nodes left by removals are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] describing the first violation.
    pub fn verify(&self) -> CoreResult<()> {
        self.ensure_valid()?;
        verify::verify(self.pool.as_ref(), self.root()?)
    }

    /// Computes a structural census of the tree.
    ///
    /// # Errors
    ///
    /// Fails if the handle is stale or a node cannot be read.
    pub fn shape(&self) -> CoreResult<TreeShape> {
        self.ensure_valid()?;
        verify::shape(self.pool.as_ref(), self.root()?)
    }
}
