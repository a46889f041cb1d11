//! Durable object handles.

use std::fmt;

/// An opaque reference to an object in a durable pool.
///
/// Handles are plain integers so they can be stored inside other pool
/// objects. The value `0` is reserved for [`Handle::NULL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Handle(u64);

impl Handle {
    /// The distinguished empty handle.
    pub const NULL: Self = Self(0);

    /// Size of an encoded handle in bytes.
    pub const ENCODED_SIZE: usize = 8;

    /// Creates a handle from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the empty handle.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Encodes the handle as little-endian bytes.
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Decodes a handle from little-endian bytes.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "oid:null")
        } else {
            write!(f, "oid:{:#x}", self.0)
        }
    }
}
