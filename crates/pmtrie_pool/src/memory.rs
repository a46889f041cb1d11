//! In-memory reference pool backed by an undo log.

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::handle::Handle;
use crate::pool::DurablePool;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
struct Object {
    type_num: u64,
    data: Vec<u8>,
}

/// One reversible step of an open transaction.
#[derive(Debug)]
enum UndoEntry {
    /// Prior contents of a snapshotted range.
    Range {
        handle: Handle,
        offset: usize,
        bytes: Vec<u8>,
    },
    /// An object allocated by the transaction.
    Alloc { handle: Handle },
    /// An object freed by the transaction.
    Free { handle: Handle, object: Object },
}

#[derive(Debug, Default)]
struct TxState {
    depth: usize,
    /// Set once any level aborts; the outermost level must still close.
    doomed: bool,
    undo: Vec<UndoEntry>,
    /// Objects allocated by this transaction (writable without snapshots).
    fresh: HashSet<Handle>,
    /// Snapshotted ranges per object, as `(start, end)`.
    logged: HashMap<Handle, Vec<(usize, usize)>>,
}

impl TxState {
    fn reset(&mut self) {
        self.doomed = false;
        self.undo.clear();
        self.fresh.clear();
        self.logged.clear();
    }

    fn is_covered(&self, handle: Handle, offset: usize, len: usize) -> bool {
        if len == 0 || self.fresh.contains(&handle) {
            return true;
        }
        let Some(ranges) = self.logged.get(&handle) else {
            return false;
        };
        let mut ranges = ranges.clone();
        ranges.sort_unstable();

        let end = offset + len;
        let mut reached = offset;
        for (start, stop) in ranges {
            if start > reached {
                break;
            }
            reached = reached.max(stop);
            if reached >= end {
                return true;
            }
        }
        false
    }
}

#[derive(Debug)]
struct PoolState {
    objects: HashMap<Handle, Object>,
    next_handle: u64,
    used: usize,
    tx: TxState,
}

impl PoolState {
    fn object(&self, handle: Handle) -> PoolResult<&Object> {
        self.objects
            .get(&handle)
            .ok_or(PoolError::InvalidHandle(handle))
    }

    fn check_bounds(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<()> {
        let size = self.object(handle)?.data.len();
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(PoolError::OutOfBounds {
                handle,
                offset,
                len,
                size,
            });
        }
        Ok(())
    }

    fn ensure_writable_tx(&self) -> PoolResult<()> {
        if self.tx.depth == 0 {
            return Err(PoolError::NoTransaction);
        }
        if self.tx.doomed {
            return Err(PoolError::TransactionAborted);
        }
        Ok(())
    }

    fn rollback(&mut self) {
        let undo = std::mem::take(&mut self.tx.undo);
        let steps = undo.len();
        for entry in undo.into_iter().rev() {
            match entry {
                UndoEntry::Range {
                    handle,
                    offset,
                    bytes,
                } => {
                    if let Some(object) = self.objects.get_mut(&handle) {
                        object.data[offset..offset + bytes.len()].copy_from_slice(&bytes);
                    }
                }
                UndoEntry::Alloc { handle } => {
                    if let Some(object) = self.objects.remove(&handle) {
                        self.used -= object.data.len();
                    }
                }
                UndoEntry::Free { handle, object } => {
                    self.used += object.data.len();
                    self.objects.insert(handle, object);
                }
            }
        }
        debug!(steps, "transaction rolled back");
    }
}

/// An in-memory durable pool.
///
/// This pool keeps every object in memory and implements the full
/// transactional contract of [`DurablePool`] with an undo log. It is
/// suitable for:
/// - Unit and integration tests of pool clients
/// - Ephemeral maps that don't need persistence
/// - Modelling power failure via [`InMemoryPool::simulate_crash`]
///
/// # Thread Safety
///
/// All state sits behind a single lock, so the pool can be shared across
/// threads. Transactions are pool-wide: callers must not interleave
/// transactions from several threads.
///
/// # Example
///
/// ```rust
/// use pmtrie_pool::{DurablePool, InMemoryPool};
///
/// let pool = InMemoryPool::new();
/// pool.begin().unwrap();
/// let obj = pool.alloc(16, 1).unwrap();
/// pool.write(obj, 0, b"hello").unwrap();
/// pool.commit().unwrap();
/// assert_eq!(pool.read(obj, 0, 5).unwrap(), b"hello");
/// ```
#[derive(Debug)]
pub struct InMemoryPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl Default for InMemoryPool {
    fn default() -> Self {
        Self::with_config(PoolConfig::default())
    }
}

impl InMemoryPool {
    /// Creates a new empty pool with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty pool with the given configuration.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState {
                objects: HashMap::new(),
                next_handle: 1,
                used: 0,
                tx: TxState::default(),
            }),
        }
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Returns the number of bytes held by live objects.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.state.lock().used
    }

    /// Returns true if the handle names a live object.
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    /// Simulates a power failure followed by pool recovery.
    ///
    /// Any open transaction is rolled back as recovery would on reopen;
    /// committed state survives. Returns true if a transaction was open.
    pub fn simulate_crash(&self) -> bool {
        let mut state = self.state.lock();
        if state.tx.depth == 0 {
            return false;
        }
        warn!(depth = state.tx.depth, "crash with open transaction, recovering");
        if !state.tx.doomed {
            state.rollback();
        }
        state.tx.depth = 0;
        state.tx.reset();
        true
    }
}

impl DurablePool for InMemoryPool {
    fn begin(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        if state.tx.depth == 0 {
            state.tx.reset();
        } else if state.tx.doomed {
            return Err(PoolError::TransactionAborted);
        }
        state.tx.depth += 1;
        trace!(depth = state.tx.depth, "begin");
        Ok(())
    }

    fn commit(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        if state.tx.depth == 0 {
            return Err(PoolError::NoTransaction);
        }
        state.tx.depth -= 1;
        let doomed = state.tx.doomed;
        if state.tx.depth == 0 {
            state.tx.reset();
        }
        if doomed {
            return Err(PoolError::TransactionAborted);
        }
        trace!(depth = state.tx.depth, "commit");
        Ok(())
    }

    fn abort(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        if state.tx.depth == 0 {
            return Err(PoolError::NoTransaction);
        }
        if !state.tx.doomed {
            state.rollback();
            state.tx.doomed = true;
        }
        state.tx.depth -= 1;
        if state.tx.depth == 0 {
            state.tx.reset();
        }
        Ok(())
    }

    fn tx_depth(&self) -> usize {
        self.state.lock().tx.depth
    }

    fn alloc(&self, size: usize, type_num: u64) -> PoolResult<Handle> {
        let mut state = self.state.lock();
        state.ensure_writable_tx()?;

        if let Some(capacity) = self.config.capacity {
            let available = capacity.saturating_sub(state.used);
            if size > available {
                return Err(PoolError::OutOfSpace {
                    requested: size,
                    available,
                });
            }
        }

        let handle = Handle::from_raw(state.next_handle);
        state.next_handle += 1;
        state.used += size;
        state.objects.insert(
            handle,
            Object {
                type_num,
                data: vec![0; size],
            },
        );
        state.tx.undo.push(UndoEntry::Alloc { handle });
        state.tx.fresh.insert(handle);
        trace!(%handle, size, type_num, "alloc");
        Ok(handle)
    }

    fn free(&self, handle: Handle) -> PoolResult<()> {
        let mut state = self.state.lock();
        state.ensure_writable_tx()?;

        let object = state
            .objects
            .remove(&handle)
            .ok_or(PoolError::InvalidHandle(handle))?;
        state.used -= object.data.len();
        state.tx.fresh.remove(&handle);
        state.tx.logged.remove(&handle);
        state.tx.undo.push(UndoEntry::Free { handle, object });
        trace!(%handle, "free");
        Ok(())
    }

    fn snapshot(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<()> {
        let mut state = self.state.lock();
        state.ensure_writable_tx()?;
        state.check_bounds(handle, offset, len)?;

        let bytes = state.object(handle)?.data[offset..offset + len].to_vec();
        state.tx.undo.push(UndoEntry::Range {
            handle,
            offset,
            bytes,
        });
        state
            .tx
            .logged
            .entry(handle)
            .or_default()
            .push((offset, offset + len));
        Ok(())
    }

    fn read(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<Vec<u8>> {
        let state = self.state.lock();
        state.check_bounds(handle, offset, len)?;
        Ok(state.object(handle)?.data[offset..offset + len].to_vec())
    }

    fn write(&self, handle: Handle, offset: usize, data: &[u8]) -> PoolResult<()> {
        let mut state = self.state.lock();
        state.ensure_writable_tx()?;
        state.check_bounds(handle, offset, data.len())?;

        if self.config.enforce_snapshots && !state.tx.is_covered(handle, offset, data.len()) {
            return Err(PoolError::UnloggedWrite {
                handle,
                offset,
                len: data.len(),
            });
        }

        if let Some(object) = state.objects.get_mut(&handle) {
            object.data[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    fn size_of(&self, handle: Handle) -> PoolResult<usize> {
        Ok(self.state.lock().object(handle)?.data.len())
    }

    fn type_of(&self, handle: Handle) -> Option<u64> {
        self.state
            .lock()
            .objects
            .get(&handle)
            .map(|object| object.type_num)
    }
}
