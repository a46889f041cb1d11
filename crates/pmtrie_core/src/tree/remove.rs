//! Removal with empty-node reclamation.

use crate::error::CoreResult;
use crate::node::{common_prefix_len, Node, Slot};
use crate::stats::TreeChanges;
use pmtrie_pool::{DurablePool, Handle};
use tracing::trace;

/// Removes the value stored under `key`, returning it.
///
/// Must run inside an open transaction. A node left without value and
/// children is freed and its slot cleared, and so is every value-less
/// ancestor that loses its last child that way. A parent left as a
/// value-less single-child node is kept as is.
pub(crate) fn remove<P: DurablePool + ?Sized>(
    pool: &P,
    mut slot: Slot,
    mut key: &[u8],
) -> CoreResult<(Option<Handle>, TreeChanges)> {
    let mut path: Vec<(Slot, Node)> = Vec::new();
    loop {
        let current = slot.load(pool)?;
        if current.is_null() {
            return Ok((None, TreeChanges::default()));
        }

        let node = Node::new(current);
        let segment = node.descent_key(pool, slot.is_root())?;
        let i = common_prefix_len(key, &segment);

        if i != segment.len() {
            return Ok((None, TreeChanges::default()));
        }

        if i == key.len() {
            let (has_value, value) = node.value(pool)?;
            if !has_value {
                return Ok((None, TreeChanges::default()));
            }

            node.set_value(pool, None)?;
            let freed = reclaim(pool, slot, node, path)?;
            let changes = TreeChanges {
                nodes_freed: freed,
                ..TreeChanges::default()
            };
            return Ok((Some(value), changes));
        }

        path.push((slot, node));
        slot = Slot::Child {
            parent: node,
            byte: key[i],
        };
        key = &key[i..];
    }
}

/// Frees `node` if it is empty, then walks up `path` freeing ancestors
/// that became empty. Returns the number of nodes freed.
fn reclaim<P: DurablePool + ?Sized>(
    pool: &P,
    mut slot: Slot,
    mut node: Node,
    mut path: Vec<(Slot, Node)>,
) -> CoreResult<u64> {
    let mut freed = 0;
    loop {
        if node.has_children(pool)? || node.value(pool)?.0 {
            return Ok(freed);
        }

        node.free(pool)?;
        slot.store(pool, Handle::NULL)?;
        freed += 1;
        trace!(node = %node.handle(), "freed empty node");

        match path.pop() {
            Some((parent_slot, parent)) => {
                slot = parent_slot;
                node = parent;
            }
            None => return Ok(freed),
        }
    }
}
