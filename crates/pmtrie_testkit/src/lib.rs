//! # pmtrie Testkit
//!
//! Test utilities for pmtrie.
//!
//! This crate provides:
//! - Test fixtures and map helpers
//! - A fault-injecting pool wrapper
//! - Property-based test generators using proptest
//! - Failure atomicity and crash recovery harnesses
//! - Model-checked stress runs
//!
//! ## Usage
//!
//! ```rust
//! use pmtrie_pool::Handle;
//! use pmtrie_testkit::prelude::*;
//!
//! with_temp_map(|map| {
//!     map.insert(b"ab", Handle::from_raw(1)).unwrap();
//!     assert_eq!(map.len().unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fault;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fault::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fault::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
