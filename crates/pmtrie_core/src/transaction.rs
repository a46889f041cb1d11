//! Transaction scoping over the durable pool.

use crate::error::CoreResult;
use crate::stats::TrieStats;
use pmtrie_pool::DurablePool;
use tracing::{trace, warn};

/// Runs `body` inside one pool transaction.
///
/// The transaction commits if `body` succeeds and aborts otherwise, so the
/// pool either holds every change `body` made or none of them. If the
/// caller already holds a transaction, this one joins it and an error
/// dooms the caller's transaction as well.
pub(crate) fn run<P, T, F>(pool: &P, stats: &TrieStats, op: &'static str, body: F) -> CoreResult<T>
where
    P: DurablePool + ?Sized,
    F: FnOnce() -> CoreResult<T>,
{
    pool.begin()?;
    stats.record_transaction_start();
    trace!(op, depth = pool.tx_depth(), "transaction opened");

    match body() {
        Ok(value) => match pool.commit() {
            Ok(()) => {
                stats.record_transaction_commit();
                Ok(value)
            }
            Err(err) => {
                stats.record_transaction_abort();
                warn!(op, error = %err, "commit failed");
                Err(err.into())
            }
        },
        Err(err) => {
            stats.record_transaction_abort();
            warn!(op, error = %err, "aborting transaction");
            if let Err(abort_err) = pool.abort() {
                warn!(op, error = %abort_err, "abort failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use pmtrie_pool::{Handle, InMemoryPool, PoolError};

    #[test]
    fn commits_on_success() {
        let pool = InMemoryPool::new();
        let stats = TrieStats::new();
        let handle = run(&pool, &stats, "test", || Ok(pool.alloc(8, 1)?)).unwrap();

        assert!(pool.contains(handle));
        assert_eq!(pool.tx_depth(), 0);
        assert_eq!(stats.transactions_committed(), 1);
    }

    #[test]
    fn aborts_on_error() {
        let pool = InMemoryPool::new();
        let stats = TrieStats::new();
        let mut allocated = Handle::NULL;
        let result: CoreResult<()> = run(&pool, &stats, "test", || {
            allocated = pool.alloc(8, 1)?;
            Err(CoreError::corrupted("boom"))
        });

        assert!(result.is_err());
        assert!(!pool.contains(allocated));
        assert_eq!(pool.tx_depth(), 0);
        assert_eq!(stats.transactions_aborted(), 1);
    }

    #[test]
    fn nested_failure_dooms_outer() {
        let pool = InMemoryPool::new();
        let stats = TrieStats::new();
        let result: CoreResult<()> = run(&pool, &stats, "outer", || {
            pool.alloc(8, 1)?;
            let inner: CoreResult<()> =
                run(&pool, &stats, "inner", || Err(CoreError::corrupted("inner")));
            assert!(inner.is_err());
            // The outer body ignores the failure; its commit must still fail.
            Ok(())
        });

        assert!(matches!(
            result,
            Err(CoreError::Pool(PoolError::TransactionAborted))
        ));
        assert_eq!(pool.object_count(), 0);
        assert_eq!(pool.tx_depth(), 0);
    }
}
