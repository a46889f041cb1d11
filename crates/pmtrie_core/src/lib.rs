//! # pmtrie Core
//!
//! Crash-consistent radix tree over a durable transactional pool.
//!
//! This crate provides:
//! - [`RadixTreeMap`]: byte-string keys mapped to durable value handles
//! - A fixed little-endian node layout (see [`node`])
//! - Atomic mutations: every insert, removal and clear runs in one pool
//!   transaction and leaves no trace when it fails
//! - Post-order traversal, structural verification and statistics
//!
//! ## Example
//!
//! ```rust
//! use pmtrie_core::RadixTreeMap;
//! use pmtrie_pool::{Handle, InMemoryPool};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(InMemoryPool::new());
//! let map = RadixTreeMap::create(Arc::clone(&pool)).unwrap();
//!
//! map.insert(b"ab", Handle::from_raw(1)).unwrap();
//! map.insert(b"ac", Handle::from_raw(2)).unwrap();
//! assert_eq!(map.get(b"ac").unwrap(), Some(Handle::from_raw(2)));
//! assert_eq!(map.get(b"a").unwrap(), None);
//!
//! // The map can be re-attached through its handle.
//! let reopened = RadixTreeMap::open(pool, map.handle()).unwrap();
//! assert_eq!(reopened.len().unwrap(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod node;
mod stats;
mod transaction;
mod tree;

pub use config::{TrieConfig, DEFAULT_MAX_KEY_SIZE};
pub use error::{CoreError, CoreResult};
pub use stats::{StatsSnapshot, TreeShape, TrieStats};
pub use tree::{Entry, NodeVisit, RadixTreeMap};
