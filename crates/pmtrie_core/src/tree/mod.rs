//! Radix tree engine.
//!
//! The tree is a 256-way trie with path compression: each node stores the
//! key segment on the edge from its parent, and the full key of a node is
//! the concatenation of segments from the root. Nodes are split when a new
//! key diverges inside an existing segment; removal frees nodes left with
//! neither value nor children but never merges single-child chains.

mod insert;
mod map;
mod remove;
mod search;
mod verify;
mod walk;

pub use map::RadixTreeMap;
pub use walk::{Entry, NodeVisit};
