//! Insertion with node splitting.

use crate::error::CoreResult;
use crate::node::{common_prefix_len, Node, Slot};
use crate::stats::TreeChanges;
use pmtrie_pool::{DurablePool, Handle};
use tracing::{debug, trace, warn};

/// Inserts `value` under `key`, starting the descent at `slot`.
///
/// Must run inside an open transaction. At most one split happens per
/// call, so at most three node objects are allocated or rewritten. The
/// returned changes are only meaningful once the transaction commits.
pub(crate) fn insert<P: DurablePool + ?Sized>(
    pool: &P,
    mut slot: Slot,
    mut key: &[u8],
    value: Handle,
) -> CoreResult<TreeChanges> {
    loop {
        let current = slot.load(pool)?;
        if current.is_null() {
            let leaf = Node::alloc(pool, key, Some(value))?;
            slot.store(pool, leaf.handle())?;
            trace!(leaf = %leaf.handle(), key_size = key.len(), "attached leaf");
            return Ok(TreeChanges {
                nodes_allocated: 1,
                ..TreeChanges::default()
            });
        }

        let node = Node::new(current);
        let segment = node.descent_key(pool, slot.is_root())?;
        let i = common_prefix_len(key, &segment);

        if i < segment.len() {
            return split(pool, slot, node, &segment, key, i, value);
        }

        if i == key.len() {
            overwrite(pool, node, value)?;
            return Ok(TreeChanges::default());
        }

        slot = Slot::Child {
            parent: node,
            byte: key[i],
        };
        key = &key[i..];
    }
}

/// Splits `orig` at offset `i` of its segment and hangs the new key off the
/// intermediate node.
fn split<P: DurablePool + ?Sized>(
    pool: &P,
    slot: Slot,
    orig: Node,
    segment: &[u8],
    key: &[u8],
    i: usize,
    value: Handle,
) -> CoreResult<TreeChanges> {
    let ends_here = i == key.len();
    let middle = Node::alloc(pool, &segment[..i], ends_here.then_some(value))?;
    let mut allocated = 1;

    middle.set_child(pool, segment[i], orig.handle())?;
    orig.shrink_key(pool, segment, i)?;

    if !ends_here {
        let leaf = Node::alloc(pool, &key[i..], Some(value))?;
        allocated += 1;
        middle.set_child(pool, key[i], leaf.handle())?;
    }

    slot.store(pool, middle.handle())?;

    debug!(
        orig = %orig.handle(),
        middle = %middle.handle(),
        at = i,
        ends_here,
        "split node"
    );
    Ok(TreeChanges {
        splits: 1,
        nodes_allocated: allocated,
        nodes_freed: 0,
    })
}

fn overwrite<P: DurablePool + ?Sized>(pool: &P, node: Node, value: Handle) -> CoreResult<()> {
    let (has_value, existing) = node.value(pool)?;
    // Literal guard: a value-less node always has a null value, so in any
    // well-formed tree this never skips the write.
    if existing.is_null() || has_value {
        node.set_value(pool, Some(value))?;
        trace!(node = %node.handle(), "stored value");
    } else {
        warn!(
            node = %node.handle(),
            %existing,
            "value-less node holds a stale value; insert ignored"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MAP_OBJECT_SIZE, MAP_TYPE_NUM};
    use pmtrie_pool::InMemoryPool;

    struct Fixture {
        pool: InMemoryPool,
        map: Handle,
    }

    impl Fixture {
        fn new() -> Self {
            let pool = InMemoryPool::new();
            pool.begin().unwrap();
            let map = pool.alloc(MAP_OBJECT_SIZE, MAP_TYPE_NUM).unwrap();
            pool.commit().unwrap();
            Self { pool, map }
        }

        fn insert(&self, key: &[u8], value: u64) -> TreeChanges {
            self.pool.begin().unwrap();
            let changes =
                insert(&self.pool, Slot::Root(self.map), key, Handle::from_raw(value)).unwrap();
            self.pool.commit().unwrap();
            changes
        }

        fn root(&self) -> Node {
            Node::new(Slot::Root(self.map).load(&self.pool).unwrap())
        }
    }

    #[test]
    fn first_key_becomes_root() {
        let fx = Fixture::new();
        fx.insert(b"hello", 1);

        let root = fx.root().load(&fx.pool).unwrap();
        assert_eq!(root.key, b"hello");
        assert!(root.has_value);
        assert_eq!(root.value, Handle::from_raw(1));
    }

    #[test]
    fn diverging_keys_split_the_root() {
        let fx = Fixture::new();
        fx.insert(b"ab", 1);
        let changes = fx.insert(b"ac", 2);

        let root = fx.root();
        let image = root.load(&fx.pool).unwrap();
        assert_eq!(image.key, b"a");
        assert!(!image.has_value);
        assert_eq!(image.children().count(), 2);

        let b = Node::new(root.child(&fx.pool, b'b').unwrap());
        let c = Node::new(root.child(&fx.pool, b'c').unwrap());
        assert_eq!(b.key(&fx.pool).unwrap(), b"b");
        assert_eq!(c.key(&fx.pool).unwrap(), b"c");
        assert_eq!(b.value(&fx.pool).unwrap(), (true, Handle::from_raw(1)));
        assert_eq!(c.value(&fx.pool).unwrap(), (true, Handle::from_raw(2)));
        assert_eq!(changes.splits, 1);
        assert_eq!(changes.nodes_allocated, 2);
    }

    #[test]
    fn prefix_of_existing_key_takes_the_value() {
        let fx = Fixture::new();
        fx.insert(b"abc", 1);
        fx.insert(b"ab", 2);

        let root = fx.root();
        let image = root.load(&fx.pool).unwrap();
        assert_eq!(image.key, b"ab");
        assert_eq!((image.has_value, image.value), (true, Handle::from_raw(2)));

        let child = Node::new(root.child(&fx.pool, b'c').unwrap());
        assert_eq!(child.key(&fx.pool).unwrap(), b"c");
        assert_eq!(child.value(&fx.pool).unwrap(), (true, Handle::from_raw(1)));
    }

    #[test]
    fn longer_key_descends_into_child() {
        let fx = Fixture::new();
        fx.insert(b"ab", 1);
        let changes = fx.insert(b"abcd", 2);

        let root = fx.root();
        assert_eq!(root.key(&fx.pool).unwrap(), b"ab");
        let child = Node::new(root.child(&fx.pool, b'c').unwrap());
        assert_eq!(child.key(&fx.pool).unwrap(), b"cd");
        assert_eq!(changes.splits, 0);
        assert_eq!(changes.nodes_allocated, 1);
    }

    #[test]
    fn exact_match_overwrites() {
        let fx = Fixture::new();
        fx.insert(b"key", 1);
        fx.insert(b"key", 2);

        assert_eq!(fx.root().value(&fx.pool).unwrap(), (true, Handle::from_raw(2)));
        assert_eq!(fx.pool.object_count(), 2);
    }

    #[test]
    fn empty_key_splits_above_root() {
        let fx = Fixture::new();
        fx.insert(b"x", 1);
        fx.insert(b"", 2);

        let root = fx.root();
        let image = root.load(&fx.pool).unwrap();
        assert!(image.key.is_empty());
        assert_eq!((image.has_value, image.value), (true, Handle::from_raw(2)));
        assert!(!root.child(&fx.pool, b'x').unwrap().is_null());
    }

    #[test]
    fn stale_value_on_valueless_node_is_left_alone() {
        let fx = Fixture::new();
        fx.insert(b"k", 1);
        let root = fx.root();

        // Forge a node that has a value handle but no has_value flag.
        fx.pool.begin().unwrap();
        fx.pool.snapshot(root.handle(), crate::node::HAS_VALUE_OFFSET, 8).unwrap();
        fx.pool
            .write(root.handle(), crate::node::HAS_VALUE_OFFSET, &0u64.to_le_bytes())
            .unwrap();
        fx.pool.commit().unwrap();

        fx.insert(b"k", 9);
        assert_eq!(root.value(&fx.pool).unwrap(), (false, Handle::from_raw(1)));
    }

    #[test]
    fn failed_split_leaves_tree_untouched() {
        let fx = Fixture::new();
        fx.insert(b"abc", 1);
        let before = fx.root().load(&fx.pool).unwrap();

        fx.pool.begin().unwrap();
        insert(&fx.pool, Slot::Root(fx.map), b"abd", Handle::from_raw(2)).unwrap();
        fx.pool.abort().unwrap();

        let after = fx.root().load(&fx.pool).unwrap();
        assert_eq!(after.key, before.key);
        assert_eq!(after.value, before.value);
        assert_eq!(fx.pool.object_count(), 2);
    }
}
