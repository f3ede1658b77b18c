//! Error types shared across the segheap workspace.

use std::error::Error;
use std::fmt;

use crate::id::HeapPtr;

/// Errors reported by an [`Arena`](crate::Arena) implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// Growing by `requested` bytes would cross the configured ceiling.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes already in use.
        used: usize,
        /// Configured maximum arena size in bytes.
        capacity: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                used,
                capacity,
            } => {
                write!(
                    f,
                    "arena capacity exceeded: requested {requested} bytes with {used} of {capacity} bytes in use"
                )
            }
        }
    }
}

impl Error for ArenaError {}

/// Errors from allocator operations.
///
/// The plain `alloc`/`realloc`/`dealloc` entry points fold these into
/// `None` or a silent no-op; the `try_*` variants surface them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The arena refused to grow far enough to satisfy the request.
    ArenaExhausted {
        /// Bytes the allocator asked the arena for.
        requested: usize,
        /// The arena's refusal.
        source: ArenaError,
    },
    /// The request size overflowed block size arithmetic.
    SizeOverflow {
        /// The payload size requested.
        requested: usize,
    },
    /// A zero-byte allocation was requested.
    ZeroSize,
    /// The pointer does not name a live allocation in this heap
    /// (double free, foreign pointer, or out-of-bounds offset).
    InvalidPointer {
        /// The rejected pointer.
        ptr: HeapPtr,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArenaExhausted { requested, source } => {
                write!(f, "arena exhausted growing by {requested} bytes: {source}")
            }
            Self::SizeOverflow { requested } => {
                write!(f, "request of {requested} bytes overflows block size")
            }
            Self::ZeroSize => write!(f, "zero-size allocation requested"),
            Self::InvalidPointer { ptr } => {
                write!(f, "pointer {ptr} is not a live allocation")
            }
        }
    }
}

impl Error for AllocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ArenaExhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}
