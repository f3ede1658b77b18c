//! Segregated free-list allocator for the segheap workspace.
//!
//! [`SegHeap`] implements `alloc`, `dealloc` and `realloc` over any
//! [`Arena`](segheap_core::Arena). Every block carries a boundary tag
//! (header and footer word) so both neighbours can be found in constant
//! time, and free blocks are threaded into one of eight size-class rings.
//!
//! # Architecture
//!
//! ```text
//! SegHeap<A: Arena>
//! ├── arena: A               (contiguous bytes, grows at the top)
//! │   └── [pad][prologue][block]...[block][epilogue]
//! ├── lists: FreeLists       (8 circular rings, LIFO insert)
//! └── config: HeapConfig     (request rounding, per-op verification)
//! ```
//!
//! - [`block`]: word codec and link overlay; the only raw arena access.
//! - [`buckets`]: size classes and ring maintenance.
//! - [`coalesce`]: neighbour merging on free.
//! - [`heap`]: the allocator proper.
//! - [`check`]: structural validator.
//! - [`stats`]: block walk, statistics, dumps.
//!
//! # Safety
//!
//! No `unsafe`. Payloads are handed out as [`HeapPtr`] offsets and read or
//! written through [`SegHeap::payload`] and [`SegHeap::payload_mut`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod buckets;
pub mod check;
pub mod coalesce;
pub mod config;
pub mod heap;
pub mod stats;

pub use buckets::{bucket_for, bucket_range, FreeLists};
pub use check::{Corruption, HeapCorruption};
pub use config::HeapConfig;
pub use heap::SegHeap;
pub use segheap_core::{AllocError, HeapPtr};
pub use stats::{BlockInfo, Blocks, HeapDump, HeapStats};
