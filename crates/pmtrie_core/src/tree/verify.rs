//! Structural verification and census.

use crate::error::{CoreError, CoreResult};
use crate::node::NODE_TYPE_NUM;
use crate::stats::TreeShape;
use crate::tree::walk::{post_order, NodeVisit};
use pmtrie_pool::{DurablePool, Handle};
use std::collections::HashSet;
use std::ops::ControlFlow;

fn check_node<P: DurablePool + ?Sized>(pool: &P, visit: &NodeVisit<'_>) -> CoreResult<()> {
    if pool.type_of(visit.handle) != Some(NODE_TYPE_NUM) {
        return Err(CoreError::corrupted(format!(
            "{} is not a node object",
            visit.handle
        )));
    }

    if let Some(byte) = visit.slot {
        match visit.segment.first() {
            None => {
                return Err(CoreError::corrupted(format!(
                    "non-root node {} has an empty key segment",
                    visit.handle
                )))
            }
            Some(first) if *first != byte => {
                return Err(CoreError::corrupted(format!(
                    "node {} stored at slot {:#04x} starts with {:#04x}",
                    visit.handle, byte, first
                )))
            }
            Some(_) => {}
        }
    }

    if !visit.has_value {
        if !visit.value.is_null() {
            return Err(CoreError::corrupted(format!(
                "value-less node {} holds value {}",
                visit.handle, visit.value
            )));
        }
        if visit.child_count == 0 {
            return Err(CoreError::corrupted(format!(
                "node {} has neither value nor children",
                visit.handle
            )));
        }
    }
    Ok(())
}

/// Checks every node under `root` against the tree invariants.
///
/// Value-less nodes with a single child are accepted: removal never
/// compacts them.
pub(crate) fn verify<P: DurablePool + ?Sized>(
    pool: &P,
    root: Handle,
) -> CoreResult<()> {
    let mut seen = HashSet::new();
    post_order(pool, root, |visit| {
        if !seen.insert(visit.handle) {
            return Err(CoreError::corrupted(format!(
                "node {} is reachable twice",
                visit.handle
            )));
        }
        check_node(pool, visit)?;
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(())
}

/// Computes the structural census of the tree under `root`.
pub(crate) fn shape<P: DurablePool + ?Sized>(
    pool: &P,
    root: Handle,
) -> CoreResult<TreeShape> {
    let mut shape = TreeShape::default();
    post_order(pool, root, |visit| {
        shape.nodes += 1;
        shape.max_depth = shape.max_depth.max(visit.depth + 1);
        shape.node_bytes += pool.size_of(visit.handle)?;
        if visit.has_value {
            shape.values += 1;
            shape.max_key_len = shape.max_key_len.max(visit.key.len());
        } else {
            shape.branch_nodes += 1;
            if visit.child_count == 1 {
                shape.single_child_branches += 1;
            }
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(shape)
}
