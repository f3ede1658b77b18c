//! The [`Arena`] trait the allocator grows into.

use crate::error::ArenaError;

/// A single contiguous, append-only byte region.
///
/// The arena is the allocator's only source of memory, in the spirit of
/// `sbrk`: it can be asked to append bytes at its top and never gives them
/// back (short of a full [`reset`](Arena::reset)). The arena never looks at
/// the bytes it holds; all structure is imposed by the allocator.
///
/// Offsets handed out and accepted by implementations index directly into
/// [`bytes`](Arena::bytes).
pub trait Arena {
    /// Append `additional` bytes to the arena.
    ///
    /// Returns the offset of the first appended byte (the old top), or
    /// [`ArenaError::CapacityExceeded`] if the configured ceiling would be
    /// crossed. A failed call leaves the arena unchanged.
    fn extend(&mut self, additional: usize) -> Result<usize, ArenaError>;

    /// Offset of the first usable byte of the arena.
    fn base(&self) -> usize;

    /// Offset one past the last byte of the arena.
    fn top(&self) -> usize;

    /// Drop all contents and return to an empty arena.
    fn reset(&mut self);

    /// The arena contents, `base()..top()`.
    fn bytes(&self) -> &[u8];

    /// Mutable view of the arena contents.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Number of bytes currently in the arena.
    fn len(&self) -> usize {
        self.top() - self.base()
    }

    /// Whether the arena holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
