//! # pmtrie Pool
//!
//! Durable transactional memory pool contract for pmtrie.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! trie engine. Pools are **opaque object stores** - they do not interpret
//! the bytes of the objects they hold.
//!
//! ## Design Principles
//!
//! - Objects are addressed by comparable [`Handle`]s, never native pointers
//! - Every mutation happens inside a (possibly nested) transaction
//! - Bytes of existing objects are snapshotted before they are written
//! - Abort restores the pool byte-for-byte to its pre-transaction state
//!
//! ## Available Pools
//!
//! - [`InMemoryPool`] - Undo-log pool for tests and ephemeral maps
//!
//! ## Example
//!
//! ```rust
//! use pmtrie_pool::{DurablePool, InMemoryPool};
//!
//! let pool = InMemoryPool::new();
//! pool.begin().unwrap();
//! let obj = pool.alloc(11, 1).unwrap();
//! pool.write(obj, 0, b"hello world").unwrap();
//! pool.commit().unwrap();
//! assert_eq!(pool.read(obj, 0, 11).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handle;
mod memory;
mod pool;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use handle::Handle;
pub use memory::InMemoryPool;
pub use pool::DurablePool;
