//! Persistent node layout and snapshot-guarded node access.
//!
//! Every node lives in one pool object with a fixed little-endian layout:
//!
//! | offset | size       | field                                   |
//! |-------:|-----------:|-----------------------------------------|
//! | 0      | 256 x 8    | child slots (handle, 0 = empty)         |
//! | 2048   | 8          | `has_value` (0 or 1)                    |
//! | 2056   | 8          | value handle                            |
//! | 2064   | 8          | `key_size`                              |
//! | 2072   | `key_size` | key segment                             |
//!
//! The map object holds only the root handle at offset 0.

use crate::error::{CoreError, CoreResult};
use pmtrie_pool::{DurablePool, Handle};

/// Branching factor of every node.
pub const ORDER: usize = 256;

/// Offset of the child slot array.
pub const SLOTS_OFFSET: usize = 0;
/// Offset of the `has_value` flag.
pub const HAS_VALUE_OFFSET: usize = SLOTS_OFFSET + ORDER * Handle::ENCODED_SIZE;
/// Offset of the value handle.
pub const VALUE_OFFSET: usize = HAS_VALUE_OFFSET + 8;
/// Offset of the key segment length.
pub const KEY_SIZE_OFFSET: usize = VALUE_OFFSET + 8;
/// Offset of the key segment bytes.
pub const KEY_OFFSET: usize = KEY_SIZE_OFFSET + 8;
/// Size of a node without its key segment.
pub const NODE_HEADER_SIZE: usize = KEY_OFFSET;

/// Offset of the root handle in the map object.
pub const MAP_ROOT_OFFSET: usize = 0;
/// Size of the map object.
pub const MAP_OBJECT_SIZE: usize = Handle::ENCODED_SIZE;

/// Type number of map objects.
pub const MAP_TYPE_NUM: u64 = 0x5254_0001;
/// Type number of node objects.
pub const NODE_TYPE_NUM: u64 = 0x5254_0002;

/// Returns the pool object size of a node with a `key_len` byte segment.
#[must_use]
pub const fn node_size(key_len: usize) -> usize {
    NODE_HEADER_SIZE + key_len
}

/// Returns the length of the longest common prefix of `a` and `b`.
#[must_use]
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn decode_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

fn decode_handle(bytes: &[u8]) -> Handle {
    Handle::from_raw(decode_u64(bytes))
}

/// A byte range of one pool object that has been snapshotted and may now
/// be written.
///
/// Creating the guard records the range's current contents with the pool,
/// so whatever is written through it is reverted if the enclosing
/// transaction aborts.
pub(crate) struct Mutation<'p, P: DurablePool + ?Sized> {
    pool: &'p P,
    handle: Handle,
    offset: usize,
    len: usize,
}

impl<'p, P: DurablePool + ?Sized> Mutation<'p, P> {
    /// Snapshots `len` bytes at `offset` of `handle`.
    pub(crate) fn begin(pool: &'p P, handle: Handle, offset: usize, len: usize) -> CoreResult<Self> {
        pool.snapshot(handle, offset, len)?;
        Ok(Self {
            pool,
            handle,
            offset,
            len,
        })
    }

    /// Writes `data` at `at` bytes into the guarded range.
    pub(crate) fn write_at(&self, at: usize, data: &[u8]) -> CoreResult<()> {
        if at + data.len() > self.len {
            return Err(CoreError::corrupted(format!(
                "write of {} bytes at {} escapes guarded range of {} bytes",
                data.len(),
                at,
                self.len
            )));
        }
        self.pool.write(self.handle, self.offset + at, data)?;
        Ok(())
    }

    /// Writes `data` at the start of the guarded range.
    pub(crate) fn write(&self, data: &[u8]) -> CoreResult<()> {
        self.write_at(0, data)
    }
}

/// A fully decoded node.
#[derive(Debug, Clone)]
pub(crate) struct NodeImage {
    pub slots: Vec<Handle>,
    pub has_value: bool,
    pub value: Handle,
    pub key: Vec<u8>,
}

impl NodeImage {
    /// Returns occupied slots in ascending byte order.
    pub(crate) fn children(&self) -> impl DoubleEndedIterator<Item = (u8, Handle)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, child)| !child.is_null())
            .map(|(byte, child)| (byte as u8, *child))
    }
}

/// A tree node addressed by its pool handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Node(Handle);

impl Node {
    pub(crate) const fn new(handle: Handle) -> Self {
        Self(handle)
    }

    pub(crate) const fn handle(self) -> Handle {
        self.0
    }

    /// Allocates a node holding `key` and, if given, `value`.
    pub(crate) fn alloc<P: DurablePool + ?Sized>(
        pool: &P,
        key: &[u8],
        value: Option<Handle>,
    ) -> CoreResult<Self> {
        let handle = pool.alloc(node_size(key.len()), NODE_TYPE_NUM)?;

        let mut header = [0u8; NODE_HEADER_SIZE - HAS_VALUE_OFFSET];
        header[0..8].copy_from_slice(&u64::from(value.is_some()).to_le_bytes());
        header[8..16].copy_from_slice(&value.unwrap_or(Handle::NULL).to_le_bytes());
        header[16..24].copy_from_slice(&(key.len() as u64).to_le_bytes());

        let fields = Mutation::begin(pool, handle, HAS_VALUE_OFFSET, header.len() + key.len())?;
        fields.write(&header)?;
        fields.write_at(header.len(), key)?;
        Ok(Self(handle))
    }

    fn key_size<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<usize> {
        let raw = decode_u64(&pool.read(self.0, KEY_SIZE_OFFSET, 8)?);
        let capacity = pool.size_of(self.0)?.saturating_sub(NODE_HEADER_SIZE);
        match usize::try_from(raw) {
            Ok(size) if size <= capacity => Ok(size),
            _ => Err(CoreError::corrupted(format!(
                "node {} key_size {} exceeds object capacity {}",
                self.0, raw, capacity
            ))),
        }
    }

    /// Reads the key segment.
    pub(crate) fn key<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<Vec<u8>> {
        let size = self.key_size(pool)?;
        Ok(pool.read(self.0, KEY_OFFSET, size)?)
    }

    /// Reads the key segment of a node met during a descent.
    ///
    /// Only the root may have an empty segment. Below it every step must
    /// consume at least one key byte, otherwise a slot cycle would never
    /// end the descent.
    pub(crate) fn descent_key<P: DurablePool + ?Sized>(
        self,
        pool: &P,
        at_root: bool,
    ) -> CoreResult<Vec<u8>> {
        let key = self.key(pool)?;
        if key.is_empty() && !at_root {
            return Err(CoreError::corrupted(format!(
                "non-root node {} has an empty key segment",
                self.0
            )));
        }
        Ok(key)
    }

    /// Reads `(has_value, value)`.
    pub(crate) fn value<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<(bool, Handle)> {
        let bytes = pool.read(self.0, HAS_VALUE_OFFSET, 16)?;
        let flag = decode_u64(&bytes[0..8]);
        if flag > 1 {
            return Err(CoreError::corrupted(format!(
                "node {} has_value flag {}",
                self.0, flag
            )));
        }
        Ok((flag == 1, decode_handle(&bytes[8..16])))
    }

    /// Reads the child at slot `byte`.
    pub(crate) fn child<P: DurablePool + ?Sized>(self, pool: &P, byte: u8) -> CoreResult<Handle> {
        let offset = SLOTS_OFFSET + usize::from(byte) * Handle::ENCODED_SIZE;
        Ok(decode_handle(&pool.read(self.0, offset, Handle::ENCODED_SIZE)?))
    }

    /// Returns true if any child slot is occupied.
    pub(crate) fn has_children<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<bool> {
        let slots = pool.read(self.0, SLOTS_OFFSET, ORDER * Handle::ENCODED_SIZE)?;
        Ok(slots.iter().any(|b| *b != 0))
    }

    /// Reads and decodes the whole node.
    pub(crate) fn load<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<NodeImage> {
        let key_size = self.key_size(pool)?;
        let bytes = pool.read(self.0, 0, node_size(key_size))?;

        let slots = bytes[SLOTS_OFFSET..HAS_VALUE_OFFSET]
            .chunks_exact(Handle::ENCODED_SIZE)
            .map(decode_handle)
            .collect();
        let flag = decode_u64(&bytes[HAS_VALUE_OFFSET..VALUE_OFFSET]);
        if flag > 1 {
            return Err(CoreError::corrupted(format!(
                "node {} has_value flag {}",
                self.0, flag
            )));
        }

        Ok(NodeImage {
            slots,
            has_value: flag == 1,
            value: decode_handle(&bytes[VALUE_OFFSET..KEY_SIZE_OFFSET]),
            key: bytes[KEY_OFFSET..].to_vec(),
        })
    }

    /// Points slot `byte` at `child`.
    pub(crate) fn set_child<P: DurablePool + ?Sized>(
        self,
        pool: &P,
        byte: u8,
        child: Handle,
    ) -> CoreResult<()> {
        let offset = SLOTS_OFFSET + usize::from(byte) * Handle::ENCODED_SIZE;
        Mutation::begin(pool, self.0, offset, Handle::ENCODED_SIZE)?.write(&child.to_le_bytes())
    }

    /// Sets or clears the node's value.
    pub(crate) fn set_value<P: DurablePool + ?Sized>(
        self,
        pool: &P,
        value: Option<Handle>,
    ) -> CoreResult<()> {
        let mut fields = [0u8; 16];
        fields[0..8].copy_from_slice(&u64::from(value.is_some()).to_le_bytes());
        fields[8..16].copy_from_slice(&value.unwrap_or(Handle::NULL).to_le_bytes());
        Mutation::begin(pool, self.0, HAS_VALUE_OFFSET, fields.len())?.write(&fields)
    }

    /// Drops the first `by` bytes of the key segment `key` in place.
    ///
    /// The vacated tail of the segment is zeroed.
    pub(crate) fn shrink_key<P: DurablePool + ?Sized>(
        self,
        pool: &P,
        key: &[u8],
        by: usize,
    ) -> CoreResult<()> {
        let remaining = &key[by..];
        let mut fields = Vec::with_capacity(8 + key.len());
        fields.extend_from_slice(&(remaining.len() as u64).to_le_bytes());
        fields.extend_from_slice(remaining);
        fields.resize(8 + key.len(), 0);

        Mutation::begin(pool, self.0, KEY_SIZE_OFFSET, fields.len())?.write(&fields)
    }

    /// Frees the node object.
    pub(crate) fn free<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<()> {
        pool.free(self.0)?;
        Ok(())
    }
}

/// A location holding a node reference: the map's root or a child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// The root field of a map object.
    Root(Handle),
    /// Slot `byte` of `parent`.
    Child {
        /// The node owning the slot.
        parent: Node,
        /// The slot index.
        byte: u8,
    },
}

impl Slot {
    /// Returns true for the map's root field.
    pub(crate) const fn is_root(self) -> bool {
        matches!(self, Self::Root(_))
    }

    /// Reads the handle stored in the slot.
    pub(crate) fn load<P: DurablePool + ?Sized>(self, pool: &P) -> CoreResult<Handle> {
        match self {
            Self::Root(map) => Ok(decode_handle(&pool.read(
                map,
                MAP_ROOT_OFFSET,
                Handle::ENCODED_SIZE,
            )?)),
            Self::Child { parent, byte } => parent.child(pool, byte),
        }
    }

    /// Stores `handle` in the slot.
    pub(crate) fn store<P: DurablePool + ?Sized>(self, pool: &P, handle: Handle) -> CoreResult<()> {
        match self {
            Self::Root(map) => Mutation::begin(pool, map, MAP_ROOT_OFFSET, Handle::ENCODED_SIZE)?
                .write(&handle.to_le_bytes()),
            Self::Child { parent, byte } => parent.set_child(pool, byte, handle),
        }
    }
}
