//! Durable pool trait definition.

use crate::error::PoolResult;
use crate::handle::Handle;

/// A durable, transactional memory pool.
///
/// Pools are **opaque object stores**. They hand out zero-filled objects
/// addressed by [`Handle`]s and guarantee that every change made inside a
/// transaction is either fully applied or fully reverted. Pools have no
/// knowledge of what the bytes they store mean.
///
/// # Invariants
///
/// - `alloc`, `free`, `snapshot` and `write` require an open transaction
/// - `begin` while a transaction is open joins it (nesting)
/// - `abort` at any depth reverts every change since the outermost `begin`
/// - a byte range must be passed to `snapshot` before an object that
///   predates the transaction is written in that range
/// - `read` never requires a transaction
///
/// # Implementors
///
/// - [`super::InMemoryPool`] - Reference pool backed by an undo log
pub trait DurablePool: Send + Sync {
    /// Opens a transaction, or joins the one already open.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    fn begin(&self) -> PoolResult<()>;

    /// Closes one level of transaction nesting.
    ///
    /// Changes become durable when the outermost level commits.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open, if the transaction was
    /// aborted by a nested level, or if the commit itself fails. A failed
    /// outermost commit leaves the pool as it was before `begin`.
    fn commit(&self) -> PoolResult<()>;

    /// Aborts the whole transaction, reverting all its changes.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn abort(&self) -> PoolResult<()>;

    /// Returns the current transaction nesting depth (0 = none).
    fn tx_depth(&self) -> usize;

    /// Allocates a zero-filled object of `size` bytes tagged with `type_num`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot satisfy the allocation or no
    /// transaction is open.
    fn alloc(&self, size: usize, type_num: u64) -> PoolResult<Handle>;

    /// Frees an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not live or no transaction is open.
    fn free(&self, handle: Handle) -> PoolResult<()>;

    /// Records the current contents of `len` bytes at `offset` so that an
    /// abort can restore them.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds or no transaction is open.
    fn snapshot(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<()>;

    /// Reads `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not live or the range is out of bounds.
    fn read(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<Vec<u8>>;

    /// Writes `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not live, the range is out of
    /// bounds, no transaction is open, or the range was not snapshotted.
    fn write(&self, handle: Handle, offset: usize, data: &[u8]) -> PoolResult<()>;

    /// Returns the size of a live object.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not live.
    fn size_of(&self, handle: Handle) -> PoolResult<usize>;

    /// Returns the type number of a live object, or `None` if the handle
    /// does not name one.
    fn type_of(&self, handle: Handle) -> Option<u64>;
}

impl<P: DurablePool + ?Sized> DurablePool for std::sync::Arc<P> {
    fn begin(&self) -> PoolResult<()> {
        (**self).begin()
    }

    fn commit(&self) -> PoolResult<()> {
        (**self).commit()
    }

    fn abort(&self) -> PoolResult<()> {
        (**self).abort()
    }

    fn tx_depth(&self) -> usize {
        (**self).tx_depth()
    }

    fn alloc(&self, size: usize, type_num: u64) -> PoolResult<Handle> {
        (**self).alloc(size, type_num)
    }

    fn free(&self, handle: Handle) -> PoolResult<()> {
        (**self).free(handle)
    }

    fn snapshot(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<()> {
        (**self).snapshot(handle, offset, len)
    }

    fn read(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<Vec<u8>> {
        (**self).read(handle, offset, len)
    }

    fn write(&self, handle: Handle, offset: usize, data: &[u8]) -> PoolResult<()> {
        (**self).write(handle, offset, data)
    }

    fn size_of(&self, handle: Handle) -> PoolResult<usize> {
        (**self).size_of(handle)
    }

    fn type_of(&self, handle: Handle) -> Option<u64> {
        (**self).type_of(handle)
    }
}
