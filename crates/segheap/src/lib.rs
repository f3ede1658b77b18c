//! segheap: a segregated free-list `malloc`/`free`/`realloc` over a
//! growable byte arena.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the segheap sub-crates. For most users, adding `segheap` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use segheap::prelude::*;
//!
//! let mut heap = SegHeap::new(VecArena::with_limit(1 << 20), HeapConfig::default()).unwrap();
//!
//! let p = heap.alloc(100).unwrap();
//! assert!(p.is_aligned_to(16));
//! heap.payload_mut(p)[..5].copy_from_slice(b"hello");
//!
//! // Growing keeps the contents.
//! let q = heap.realloc(p, 1000).unwrap();
//! assert_eq!(&heap.payload(q)[..5], b"hello");
//!
//! heap.dealloc(q);
//! assert!(heap.check());
//! assert_eq!(heap.stats().allocated_blocks, 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `segheap-core` | `HeapPtr`, layout constants, `Arena` trait, errors |
//! | [`arena`] | `segheap-arena` | `VecArena` and `ArenaConfig` |
//! | [`alloc`] | `segheap-alloc` | `SegHeap`, buckets, validator, statistics |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, layout constants and the arena trait (`segheap-core`).
pub use segheap_core as types;

/// The growable byte arena (`segheap-arena`).
///
/// [`arena::VecArena`] is the only backend shipped; anything implementing
/// [`types::Arena`] can stand in for it.
pub use segheap_arena as arena;

/// The allocator itself (`segheap-alloc`).
///
/// Besides [`alloc::SegHeap`], exposes the block codec and bucket helpers
/// for tooling that needs to inspect a heap.
pub use segheap_alloc as alloc;

/// A heap over a [`VecArena`](arena::VecArena) with default settings.
pub type DefaultHeap = segheap_alloc::SegHeap<segheap_arena::VecArena>;

/// Build a [`DefaultHeap`] with the default 20 MiB arena ceiling.
pub fn default_heap() -> Result<DefaultHeap, segheap_core::AllocError> {
    segheap_alloc::SegHeap::new(
        segheap_arena::VecArena::default(),
        segheap_alloc::HeapConfig::default(),
    )
}

/// Common imports for typical segheap usage.
///
/// ```rust
/// use segheap::prelude::*;
/// ```
pub mod prelude {
    // Allocator
    pub use segheap_alloc::{HeapConfig, HeapStats, SegHeap};

    // Arena
    pub use segheap_arena::{ArenaConfig, VecArena};

    // Core types and traits
    pub use segheap_core::{AllocError, Arena, ArenaError, HeapPtr};

    // Diagnostics
    pub use segheap_alloc::{BlockInfo, HeapCorruption};

    pub use crate::{default_heap, DefaultHeap};
}
