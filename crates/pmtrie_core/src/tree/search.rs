//! Read-only key search.

use crate::error::CoreResult;
use crate::node::{common_prefix_len, Node};
use pmtrie_pool::{DurablePool, Handle};

/// Finds the node whose full key is exactly `key`, starting at `root`.
///
/// Returns `None` on the first segment mismatch or empty slot. The node
/// found may be a value-less branching point.
pub(crate) fn find<P: DurablePool + ?Sized>(
    pool: &P,
    root: Handle,
    mut key: &[u8],
) -> CoreResult<Option<Node>> {
    let mut current = root;
    let mut at_root = true;
    loop {
        if current.is_null() {
            return Ok(None);
        }

        let node = Node::new(current);
        let segment = node.descent_key(pool, at_root)?;
        let i = common_prefix_len(key, &segment);

        if i != segment.len() {
            return Ok(None);
        }
        if i == key.len() {
            return Ok(Some(node));
        }

        current = node.child(pool, key[i])?;
        key = &key[i..];
        at_root = false;
    }
}

/// Returns the value stored under `key`, if any.
pub(crate) fn get<P: DurablePool + ?Sized>(
    pool: &P,
    root: Handle,
    key: &[u8],
) -> CoreResult<Option<Handle>> {
    match find(pool, root, key)? {
        Some(node) => {
            let (has_value, value) = node.value(pool)?;
            Ok(has_value.then_some(value))
        }
        None => Ok(None),
    }
}
