//! The [`HeapPtr`] payload handle.

use std::fmt;

/// Offset of an allocation's payload within its arena.
///
/// A `HeapPtr` is what the allocator hands out instead of a raw address.
/// It is only meaningful for the heap that produced it; the payload bytes
/// are reached through that heap's accessors. Payload offsets are always
/// multiples of [`DWORD`](crate::layout::DWORD) relative to the arena base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapPtr(usize);

impl HeapPtr {
    /// Wrap a raw payload offset.
    ///
    /// Nothing is validated here; the allocator checks offsets it is
    /// handed back before trusting them.
    pub const fn from_offset(offset: usize) -> Self {
        Self(offset)
    }

    /// The payload offset from the arena base.
    pub const fn offset(self) -> usize {
        self.0
    }

    /// Whether the offset is aligned to `align` bytes.
    pub const fn is_aligned_to(self, align: usize) -> bool {
        self.0 % align == 0
    }
}

impl fmt::Display for HeapPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<HeapPtr> for usize {
    fn from(ptr: HeapPtr) -> Self {
        ptr.0
    }
}
