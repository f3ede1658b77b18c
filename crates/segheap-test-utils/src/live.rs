//! Shadow bookkeeping for live allocations.

use indexmap::IndexMap;

use segheap_alloc::SegHeap;
use segheap_core::layout::DWORD;
use segheap_core::{Arena, HeapPtr};

use crate::workload::Op;

/// What the tracker remembers about one allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Live {
    /// Bytes the caller asked for.
    pub len: usize,
    /// Byte the payload was filled with.
    pub fill: u8,
}

/// Every allocation the test believes is live, in insertion order.
///
/// Victims for free and realloc are picked by index, so a seeded workload
/// always hits the same allocations.
#[derive(Clone, Debug, Default)]
pub struct LiveAllocations {
    live: IndexMap<HeapPtr, Live>,
}

impl LiveAllocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn get_index(&self, index: usize) -> Option<(HeapPtr, Live)> {
        self.live.get_index(index).map(|(ptr, live)| (*ptr, *live))
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeapPtr, Live)> + '_ {
        self.live.iter().map(|(ptr, live)| (*ptr, *live))
    }

    /// Record a fresh allocation: check alignment and disjointness, then
    /// fill its first `len` bytes with `fill`.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is misaligned, already tracked, or overlaps another
    /// tracked payload.
    pub fn track<A: Arena>(&mut self, heap: &mut SegHeap<A>, ptr: HeapPtr, len: usize, fill: u8) {
        assert!(!self.live.contains_key(&ptr), "payload {ptr} handed out twice");
        assert!(ptr.is_aligned_to(DWORD), "payload {ptr} is not {DWORD}-byte aligned");
        let usable = heap
            .usable_size(ptr)
            .unwrap_or_else(|| panic!("payload {ptr} is not live"));
        assert!(usable >= len, "payload {ptr} has {usable} bytes, asked for {len}");
        let start = ptr.offset();
        let end = start + usable;
        for (other, _) in self.iter() {
            let other_start = other.offset();
            let other_end = other_start + heap.usable_size(other).unwrap_or(0);
            assert!(
                end <= other_start || other_end <= start,
                "payload {ptr} ({start:#x}..{end:#x}) overlaps {other} ({other_start:#x}..{other_end:#x})"
            );
        }
        heap.payload_mut(ptr)[..len].fill(fill);
        self.live.insert(ptr, Live { len, fill });
    }

    /// Stop tracking the allocation at `index`.
    pub fn untrack_index(&mut self, index: usize) -> Option<(HeapPtr, Live)> {
        self.live.swap_remove_index(index)
    }

    /// Assert that the first `len` bytes of `ptr` still hold `fill`.
    pub fn assert_intact<A: Arena>(heap: &SegHeap<A>, ptr: HeapPtr, len: usize, fill: u8) {
        let payload = heap.payload(ptr);
        if let Some(at) = payload[..len].iter().position(|&b| b != fill) {
            panic!(
                "payload {ptr} byte {at} is {:#04x}, expected {fill:#04x}",
                payload[at]
            );
        }
    }

    /// Assert every tracked payload still holds its fill byte.
    pub fn assert_all_intact<A: Arena>(&self, heap: &SegHeap<A>) {
        for (ptr, live) in self.iter() {
            Self::assert_intact(heap, ptr, live.len, live.fill);
        }
    }
}

/// Counters from a replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub allocs: usize,
    pub frees: usize,
    pub reallocs: usize,
    /// Allocations or reallocs that returned `None`.
    pub failures: usize,
}

/// Replay `ops` against `heap`, checking everything a caller can observe.
///
/// After every step the heap must validate, the new or resized payload
/// must be disjoint from every other live one, and a realloc must carry
/// the old contents over. Returns the tracker so tests can keep going.
///
/// # Panics
///
/// Panics on the first violation, with a heap dump in the message.
pub fn replay_checked<A: Arena>(
    heap: &mut SegHeap<A>,
    ops: &[Op],
) -> (LiveAllocations, ReplaySummary) {
    let mut live = LiveAllocations::new();
    let mut summary = ReplaySummary::default();
    for (step, op) in ops.iter().enumerate() {
        let fill = (step % 251) as u8 + 1;
        match *op {
            Op::Alloc { size } => {
                summary.allocs += 1;
                match heap.alloc(size) {
                    Some(ptr) => live.track(heap, ptr, size, fill),
                    None => summary.failures += 1,
                }
            }
            Op::Free { index } => {
                if live.is_empty() {
                    continue;
                }
                summary.frees += 1;
                if let Some((ptr, _)) = live.untrack_index(index % live.len()) {
                    heap.dealloc(ptr);
                }
            }
            Op::Realloc { index, size } => {
                if live.is_empty() {
                    continue;
                }
                summary.reallocs += 1;
                let index = index % live.len();
                let Some((old, before)) = live.get_index(index) else {
                    continue;
                };
                match heap.realloc(old, size) {
                    Some(ptr) => {
                        live.untrack_index(index);
                        let kept = before.len.min(size);
                        LiveAllocations::assert_intact(heap, ptr, kept, before.fill);
                        live.track(heap, ptr, size, fill);
                    }
                    None => {
                        summary.failures += 1;
                        LiveAllocations::assert_intact(heap, old, before.len, before.fill);
                    }
                }
            }
        }
        if let Err(corruption) = heap.validate() {
            panic!("step {step} ({op:?}): {corruption}\n{}", heap.dump());
        }
    }
    live.assert_all_intact(heap);
    (live, summary)
}
