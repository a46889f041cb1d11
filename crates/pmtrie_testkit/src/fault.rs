//! Fault injection for durable pools.
//!
//! [`FaultyPool`] wraps any [`DurablePool`] and fails selected operations
//! on demand, which lets tests drive every failure branch of a tree
//! mutation without a real out-of-space condition.

use pmtrie_pool::{DurablePool, Handle, PoolError, PoolResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

const NEVER: usize = usize::MAX;

/// A pool wrapper that can fail allocations, snapshots and commits.
///
/// Allocation and snapshot faults trigger on the N-th call (0-based)
/// after the fault was armed. A failed commit aborts the inner
/// transaction level, so the caller observes the same state as after a
/// failed commit of a real pool.
#[derive(Debug)]
pub struct FaultyPool<P> {
    inner: P,
    fail_alloc_at: AtomicUsize,
    allocs: AtomicUsize,
    fail_snapshot_at: AtomicUsize,
    snapshots: AtomicUsize,
    fail_on_commit: AtomicBool,
    faults: AtomicUsize,
}

impl<P: DurablePool> FaultyPool<P> {
    /// Wraps `inner` with every fault disarmed.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            fail_alloc_at: AtomicUsize::new(NEVER),
            allocs: AtomicUsize::new(0),
            fail_snapshot_at: AtomicUsize::new(NEVER),
            snapshots: AtomicUsize::new(0),
            fail_on_commit: AtomicBool::new(false),
            faults: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped pool.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Fails the allocation `n` calls from now (0 = the next one).
    pub fn fail_alloc_after(&self, n: usize) {
        self.allocs.store(0, Ordering::SeqCst);
        self.fail_alloc_at.store(n, Ordering::SeqCst);
    }

    /// Fails the snapshot `n` calls from now (0 = the next one).
    pub fn fail_snapshot_after(&self, n: usize) {
        self.snapshots.store(0, Ordering::SeqCst);
        self.fail_snapshot_at.store(n, Ordering::SeqCst);
    }

    /// Sets whether commits should fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Disarms every fault and resets the counters.
    pub fn reset(&self) {
        self.fail_alloc_at.store(NEVER, Ordering::SeqCst);
        self.allocs.store(0, Ordering::SeqCst);
        self.fail_snapshot_at.store(NEVER, Ordering::SeqCst);
        self.snapshots.store(0, Ordering::SeqCst);
        self.fail_on_commit.store(false, Ordering::SeqCst);
        self.faults.store(0, Ordering::SeqCst);
    }

    /// Returns the number of allocations attempted since the last arm or reset.
    pub fn alloc_count(&self) -> usize {
        self.allocs.load(Ordering::SeqCst)
    }

    /// Returns the number of snapshots attempted since the last arm or reset.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    /// Returns the number of faults injected since the last reset.
    pub fn fault_count(&self) -> usize {
        self.faults.load(Ordering::SeqCst)
    }

    fn trips(counter: &AtomicUsize, target: &AtomicUsize) -> bool {
        let index = counter.fetch_add(1, Ordering::SeqCst);
        index == target.load(Ordering::SeqCst)
    }

    fn inject(&self, what: &'static str) {
        self.faults.fetch_add(1, Ordering::SeqCst);
        debug!(what, "injected pool fault");
    }
}

impl<P: DurablePool> DurablePool for FaultyPool<P> {
    fn begin(&self) -> PoolResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> PoolResult<()> {
        if self.fail_on_commit.load(Ordering::SeqCst) && self.inner.tx_depth() > 0 {
            self.inject("commit");
            self.inner.abort()?;
            return Err(PoolError::CommitFailed("injected commit failure".into()));
        }
        self.inner.commit()
    }

    fn abort(&self) -> PoolResult<()> {
        self.inner.abort()
    }

    fn tx_depth(&self) -> usize {
        self.inner.tx_depth()
    }

    fn alloc(&self, size: usize, type_num: u64) -> PoolResult<Handle> {
        if Self::trips(&self.allocs, &self.fail_alloc_at) {
            self.inject("alloc");
            return Err(PoolError::AllocFailed(format!(
                "injected failure allocating {size} bytes"
            )));
        }
        self.inner.alloc(size, type_num)
    }

    fn free(&self, handle: Handle) -> PoolResult<()> {
        self.inner.free(handle)
    }

    fn snapshot(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<()> {
        if Self::trips(&self.snapshots, &self.fail_snapshot_at) {
            self.inject("snapshot");
            return Err(PoolError::SnapshotFailed(format!(
                "injected failure logging {len} bytes of {handle}"
            )));
        }
        self.inner.snapshot(handle, offset, len)
    }

    fn read(&self, handle: Handle, offset: usize, len: usize) -> PoolResult<Vec<u8>> {
        self.inner.read(handle, offset, len)
    }

    fn write(&self, handle: Handle, offset: usize, data: &[u8]) -> PoolResult<()> {
        self.inner.write(handle, offset, data)
    }

    fn size_of(&self, handle: Handle) -> PoolResult<usize> {
        self.inner.size_of(handle)
    }

    fn type_of(&self, handle: Handle) -> Option<u64> {
        self.inner.type_of(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmtrie_pool::InMemoryPool;

    fn faulty() -> FaultyPool<InMemoryPool> {
        FaultyPool::new(InMemoryPool::new())
    }

    #[test]
    fn disarmed_pool_forwards() {
        let pool = faulty();
        pool.begin().unwrap();
        let h = pool.alloc(8, 1).unwrap();
        pool.write(h, 0, &[1; 8]).unwrap();
        pool.commit().unwrap();

        assert_eq!(pool.read(h, 0, 8).unwrap(), vec![1; 8]);
        assert_eq!(pool.fault_count(), 0);
    }

    #[test]
    fn nth_alloc_fails() {
        let pool = faulty();
        pool.fail_alloc_after(1);
        pool.begin().unwrap();
        assert!(pool.alloc(8, 1).is_ok());
        assert!(matches!(pool.alloc(8, 1), Err(PoolError::AllocFailed(_))));
        assert!(pool.alloc(8, 1).is_ok());
        pool.commit().unwrap();

        assert_eq!(pool.alloc_count(), 3);
        assert_eq!(pool.fault_count(), 1);
        assert_eq!(pool.inner().object_count(), 2);
    }

    #[test]
    fn nth_snapshot_fails() {
        let pool = faulty();
        pool.begin().unwrap();
        let h = pool.alloc(8, 1).unwrap();
        pool.commit().unwrap();

        pool.fail_snapshot_after(0);
        pool.begin().unwrap();
        assert!(matches!(
            pool.snapshot(h, 0, 8),
            Err(PoolError::SnapshotFailed(_))
        ));
        pool.abort().unwrap();
    }

    #[test]
    fn failed_commit_rolls_back() {
        let pool = faulty();
        pool.set_fail_on_commit(true);
        pool.begin().unwrap();
        pool.alloc(8, 1).unwrap();

        assert!(matches!(pool.commit(), Err(PoolError::CommitFailed(_))));
        assert_eq!(pool.tx_depth(), 0);
        assert_eq!(pool.inner().object_count(), 0);
    }

    #[test]
    fn reset_disarms() {
        let pool = faulty();
        pool.fail_alloc_after(0);
        pool.set_fail_on_commit(true);
        pool.reset();

        pool.begin().unwrap();
        pool.alloc(8, 1).unwrap();
        pool.commit().unwrap();
        assert_eq!(pool.inner().object_count(), 1);
    }
}
