//! Error types for pmtrie core.

use pmtrie_pool::{Handle, PoolError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in trie operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Durable pool error (allocation, transaction or access failure).
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// The map handle is null or does not name a live map object.
    #[error("invalid map handle: {handle}")]
    InvalidHandle {
        /// The rejected handle.
        handle: Handle,
    },

    /// The key exceeds the configured maximum size.
    #[error("key too large: {size} bytes exceeds maximum of {max} bytes")]
    KeyTooLarge {
        /// Size of the rejected key.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A node read from the pool violates the tree layout or invariants.
    #[error("tree corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A value constructor rejected its object.
    #[error("value construction failed: {message}")]
    ConstructionFailed {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid handle error.
    pub fn invalid_handle(handle: Handle) -> Self {
        Self::InvalidHandle { handle }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a construction failed error.
    pub fn construction_failed(message: impl Into<String>) -> Self {
        Self::ConstructionFailed {
            message: message.into(),
        }
    }

    /// Returns true if the pool could not satisfy an allocation.
    #[must_use]
    pub fn is_allocation_failure(&self) -> bool {
        matches!(
            self,
            Self::Pool(PoolError::OutOfSpace { .. } | PoolError::AllocFailed(_))
        )
    }

    /// Returns true if a transaction could not begin or commit.
    #[must_use]
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            Self::Pool(
                PoolError::BeginFailed(_)
                    | PoolError::CommitFailed(_)
                    | PoolError::TransactionAborted
                    | PoolError::NoTransaction
            )
        )
    }
}
