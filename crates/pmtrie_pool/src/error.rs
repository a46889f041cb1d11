//! Error types for pool operations.

use crate::handle::Handle;
use thiserror::Error;

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur during pool operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool cannot satisfy an allocation.
    #[error("out of space: requested {requested} bytes, {available} available")]
    OutOfSpace {
        /// Requested allocation size.
        requested: usize,
        /// Bytes still available in the pool.
        available: usize,
    },

    /// Allocation failed for a reason other than capacity.
    #[error("allocation failed: {0}")]
    AllocFailed(String),

    /// The handle does not name a live object.
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    /// Access beyond the end of an object.
    #[error("access out of bounds on {handle}: offset {offset}, len {len}, size {size}")]
    OutOfBounds {
        /// The accessed object.
        handle: Handle,
        /// The requested offset.
        offset: usize,
        /// The requested length.
        len: usize,
        /// The object size.
        size: usize,
    },

    /// A transactional operation was issued with no transaction open.
    #[error("no transaction in progress")]
    NoTransaction,

    /// The current transaction has been aborted and can only be closed.
    #[error("transaction aborted")]
    TransactionAborted,

    /// A transaction failed to begin.
    #[error("transaction begin failed: {0}")]
    BeginFailed(String),

    /// A transaction failed to commit; its changes were rolled back.
    #[error("transaction commit failed: {0}")]
    CommitFailed(String),

    /// Bytes of an object that predates the transaction were written without a snapshot.
    #[error("unlogged write to {handle}: offset {offset}, len {len}")]
    UnloggedWrite {
        /// The written object.
        handle: Handle,
        /// The written offset.
        offset: usize,
        /// The written length.
        len: usize,
    },

    /// Snapshot could not be recorded.
    #[error("snapshot failed: {0}")]
    SnapshotFailed(String),
}
