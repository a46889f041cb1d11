//! Post-order traversal.
//!
//! Children are visited in ascending slot order before their parent. The
//! walk keeps an explicit stack, so its depth is bounded by heap memory
//! rather than the thread stack.

use crate::error::{CoreError, CoreResult};
use crate::node::Node;
use pmtrie_pool::{DurablePool, Handle};
use std::collections::HashSet;
use std::ops::ControlFlow;

/// A stored key/value pair reported by [`crate::RadixTreeMap::foreach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    /// Full key, reconstructed from the root.
    pub key: &'a [u8],
    /// The node's own key segment (a suffix of `key`).
    pub segment: &'a [u8],
    /// The stored value.
    pub value: Handle,
}

impl Entry<'_> {
    /// Returns the length of the node's key segment.
    #[must_use]
    pub fn key_size(&self) -> usize {
        self.segment.len()
    }
}

/// A node reported by [`crate::RadixTreeMap::walk`], value-bearing or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeVisit<'a> {
    /// Pool handle of the node.
    pub handle: Handle,
    /// Full key, reconstructed from the root.
    pub key: &'a [u8],
    /// The node's own key segment (a suffix of `key`).
    pub segment: &'a [u8],
    /// Whether the node terminates a stored key.
    pub has_value: bool,
    /// The value field (null unless `has_value`).
    pub value: Handle,
    /// Number of occupied child slots.
    pub child_count: usize,
    /// Distance from the root (root = 0).
    pub depth: usize,
    /// Slot of the parent this node hangs from (`None` for the root).
    pub slot: Option<u8>,
}

impl NodeVisit<'_> {
    /// Returns the stored entry if the node carries a value.
    #[must_use]
    pub fn entry(&self) -> Option<Entry<'_>> {
        self.has_value.then_some(Entry {
            key: self.key,
            segment: self.segment,
            value: self.value,
        })
    }
}

struct Frame {
    handle: Handle,
    has_value: bool,
    value: Handle,
    children: Vec<(u8, Handle)>,
    next: usize,
    key_start: usize,
    slot: Option<u8>,
}

impl Frame {
    fn load<P: DurablePool + ?Sized>(
        pool: &P,
        handle: Handle,
        slot: Option<u8>,
        key: &mut Vec<u8>,
    ) -> CoreResult<Self> {
        let image = Node::new(handle).load(pool)?;
        let key_start = key.len();
        key.extend_from_slice(&image.key);
        Ok(Self {
            handle,
            has_value: image.has_value,
            value: image.value,
            children: image.children().collect(),
            next: 0,
            key_start,
            slot,
        })
    }
}

/// Walks every node under `root` in post-order.
///
/// A child slot pointing back at a node on the current path is reported
/// as corruption. Paths of any length through distinct nodes are walked.
pub(crate) fn post_order<P, F>(
    pool: &P,
    root: Handle,
    mut visitor: F,
) -> CoreResult<ControlFlow<()>>
where
    P: DurablePool + ?Sized,
    F: FnMut(&NodeVisit<'_>) -> CoreResult<ControlFlow<()>>,
{
    if root.is_null() {
        return Ok(ControlFlow::Continue(()));
    }

    let mut key = Vec::new();
    let mut on_path = HashSet::from([root]);
    let mut stack = vec![Frame::load(pool, root, None, &mut key)?];

    while let Some(top) = stack.last_mut() {
        if top.next < top.children.len() {
            let (byte, child) = top.children[top.next];
            let parent = top.handle;
            top.next += 1;
            if !on_path.insert(child) {
                return Err(CoreError::corrupted(format!(
                    "slot {byte:#04x} of {parent} points back at ancestor {child}"
                )));
            }
            let frame = Frame::load(pool, child, Some(byte), &mut key)?;
            stack.push(frame);
            continue;
        }

        let Some(frame) = stack.pop() else {
            break;
        };
        on_path.remove(&frame.handle);
        let visit = NodeVisit {
            handle: frame.handle,
            key: &key,
            segment: &key[frame.key_start..],
            has_value: frame.has_value,
            value: frame.value,
            child_count: frame.children.len(),
            depth: stack.len(),
            slot: frame.slot,
        };
        if visitor(&visit)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        key.truncate(frame.key_start);
    }

    Ok(ControlFlow::Continue(()))
}
