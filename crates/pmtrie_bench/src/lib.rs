//! Benchmarks for pmtrie.
//!
//! The benchmarks live under `benches/`; this library only holds the
//! shared key generators.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
