//! Test utilities for segheap development.
//!
//! - [`Workload`]: seeded random alloc/free/realloc traces.
//! - [`LiveAllocations`]: shadow map of live payloads that checks
//!   alignment, disjointness and content preservation.
//! - [`replay_checked`]: drive a heap through a trace, validating after
//!   every step.
//! - [`fixtures`]: ready-made heaps and `tracing` setup.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod live;
pub mod workload;

pub use fixtures::{heap_with_limit, init_tracing, small_heap};
pub use live::{replay_checked, Live, LiveAllocations, ReplaySummary};
pub use workload::{Op, Workload};
