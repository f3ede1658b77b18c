//! Benchmark profiles and utilities for the segheap allocator.
//!
//! Provides pre-built workload traces for benchmarking:
//!
//! - [`reference_profile`]: mixed sizes up to 4 KiB, frees and reallocs
//! - [`small_object_profile`]: requests below 128 bytes, heavy free churn
//! - [`realloc_profile`]: few live blocks, mostly resized in place or moved
//!
//! and [`replay`], an unchecked driver that measures the allocator alone.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use segheap_alloc::{HeapConfig, SegHeap};
use segheap_arena::VecArena;
use segheap_core::{Arena, HeapPtr};
use segheap_test_utils::{Op, Workload};

/// Steps in every stock profile.
pub const PROFILE_STEPS: usize = 10_000;

/// Mixed-size reference workload: 1..=4096-byte requests, up to 256 live.
pub fn reference_profile(seed: u64) -> Vec<Op> {
    Workload::new(seed).generate(PROFILE_STEPS)
}

/// Small objects only, freed about as often as they are allocated.
pub fn small_object_profile(seed: u64) -> Vec<Op> {
    Workload::new(seed)
        .sizes(1, 128)
        .free_ratio(0.45)
        .realloc_ratio(0.05)
        .max_live(1024)
        .generate(PROFILE_STEPS)
}

/// Realloc-dominated workload over a small working set.
pub fn realloc_profile(seed: u64) -> Vec<Op> {
    Workload::new(seed)
        .sizes(1, 8192)
        .free_ratio(0.1)
        .realloc_ratio(0.7)
        .max_live(32)
        .generate(PROFILE_STEPS)
}

/// A heap over a default arena with benchmark settings: no per-op
/// verification.
pub fn bench_heap() -> SegHeap<VecArena> {
    match SegHeap::new(VecArena::default(), HeapConfig::default()) {
        Ok(heap) => heap,
        Err(err) => panic!("cannot initialise benchmark heap: {err}"),
    }
}

/// Outcome of an unchecked replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Allocations or reallocs that returned `None`.
    pub failures: usize,
    /// Allocations still live at the end.
    pub live: usize,
    /// Arena top at the end.
    pub top: usize,
}

/// Drive `heap` through `ops` without any checking.
///
/// Victims are picked the same way as in the checked replay, so the same
/// trace touches the same allocations.
pub fn replay<A: Arena>(heap: &mut SegHeap<A>, ops: &[Op]) -> ReplayOutcome {
    let mut live: Vec<HeapPtr> = Vec::with_capacity(256);
    let mut failures = 0;
    for op in ops {
        match *op {
            Op::Alloc { size } => match heap.alloc(size) {
                Some(ptr) => live.push(ptr),
                None => failures += 1,
            },
            Op::Free { index } => {
                if !live.is_empty() {
                    let ptr = live.swap_remove(index % live.len());
                    heap.dealloc(ptr);
                }
            }
            Op::Realloc { index, size } => {
                if !live.is_empty() {
                    let index = index % live.len();
                    match heap.realloc(live[index], size) {
                        Some(ptr) => {
                            live.swap_remove(index);
                            live.push(ptr);
                        }
                        None => failures += 1,
                    }
                }
            }
        }
    }
    ReplayOutcome {
        failures,
        live: live.len(),
        top: heap.arena().top(),
    }
}
