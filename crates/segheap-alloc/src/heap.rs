//! The allocator core.
//!
//! [`SegHeap`] owns an [`Arena`] and a [`FreeLists`] table and implements
//! `alloc`/`dealloc`/`realloc` on top of them:
//!
//! ```text
//! alloc(n)
//! ├── round small requests to a power of two
//! ├── adjusted = max(MIN_BLOCK, align(n + OVERHEAD, DWORD))
//! ├── first fit from bucket_for(adjusted) upward
//! │   ├── close fit → take the whole block
//! │   └── roomy fit → carve the tail, relist the head
//! └── no fit → grow the arena by exactly `adjusted`
//!
//! dealloc(p)  → mark free → coalesce → insert
//!
//! realloc(p, n)
//! ├── shrink → tear the tail off as a free block when it is big enough
//! └── grow   → absorb free neighbours in place, else alloc + copy + free
//! ```

use segheap_core::layout::{
    block_size_for, round_small_request, DWORD, INIT_BYTES, MIN_BLOCK, NUM_BUCKETS, OVERHEAD, WORD,
};
use segheap_core::{AllocError, Arena, HeapPtr};

use crate::block;
use crate::buckets::{bucket_for, FreeLists};
use crate::coalesce::coalesce;
use crate::config::HeapConfig;

/// A segregated free-list heap over an [`Arena`].
///
/// Every operation takes `&mut self`, so one heap is only ever driven from
/// one place at a time. Independent heaps share nothing and can coexist.
pub struct SegHeap<A: Arena> {
    pub(crate) arena: A,
    pub(crate) lists: FreeLists,
    config: HeapConfig,
    /// Payload offset of the prologue sentinel.
    pub(crate) prologue: usize,
}

impl<A: Arena> SegHeap<A> {
    /// Build a heap over `arena` and initialise it.
    ///
    /// Any previous arena contents are discarded.
    pub fn new(arena: A, config: HeapConfig) -> Result<Self, AllocError> {
        let mut heap = Self {
            arena,
            lists: FreeLists::new(),
            config,
            prologue: 0,
        };
        heap.init()?;
        Ok(heap)
    }

    /// Reset the heap to empty: padding word, prologue, epilogue, and no
    /// free blocks. Every outstanding [`HeapPtr`] becomes invalid.
    pub fn init(&mut self) -> Result<(), AllocError> {
        self.arena.reset();
        self.lists.clear();
        let start = self
            .arena
            .extend(INIT_BYTES)
            .map_err(|source| AllocError::ArenaExhausted {
                requested: INIT_BYTES,
                source,
            })?;
        debug_assert_eq!(start % DWORD, 0, "arena base {start:#x} is not DWORD-aligned");

        let mem = self.arena.bytes_mut();
        block::put(mem, start, 0);
        block::put(mem, start + WORD, block::pack(DWORD, true));
        block::put(mem, start + 2 * WORD, block::pack(DWORD, true));
        block::put(mem, start + 3 * WORD, block::pack(0, true));
        self.prologue = start + DWORD;
        tracing::debug!(prologue = self.prologue, "heap initialised");
        Ok(())
    }

    /// Allocate at least `size` payload bytes.
    ///
    /// Returns `None` for a zero-size request or when the arena cannot grow.
    pub fn alloc(&mut self, size: usize) -> Option<HeapPtr> {
        self.try_alloc(size).ok()
    }

    /// Allocate at least `size` payload bytes, reporting why on failure.
    pub fn try_alloc(&mut self, size: usize) -> Result<HeapPtr, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let rounded = if self.config.round_small_requests {
            round_small_request(size, self.config.small_request_limit)
        } else {
            size
        };
        let adjusted =
            block_size_for(rounded).ok_or(AllocError::SizeOverflow { requested: size })?;

        let bp = match self.find_fit(adjusted) {
            Some(bp) => bp,
            None => self.extend_heap(adjusted)?,
        };
        self.place(bp);
        self.after_op("alloc");
        Ok(HeapPtr::from_offset(bp))
    }

    /// Release an allocation.
    ///
    /// `None`, already-free blocks and pointers this heap never handed out
    /// are ignored.
    pub fn dealloc(&mut self, ptr: impl Into<Option<HeapPtr>>) {
        let Some(ptr) = ptr.into() else {
            return;
        };
        if let Err(err) = self.try_dealloc(ptr) {
            tracing::trace!(%err, "ignoring invalid free");
        }
    }

    /// Release an allocation, rejecting pointers that are not live.
    pub fn try_dealloc(&mut self, ptr: HeapPtr) -> Result<(), AllocError> {
        let bp = self.live_block(ptr)?;
        self.release(bp);
        self.after_op("dealloc");
        Ok(())
    }

    /// Resize an allocation, preserving its contents up to the smaller size.
    ///
    /// `realloc(None, n)` allocates, `realloc(p, 0)` frees and returns
    /// `None`. On failure the original allocation is left untouched.
    pub fn realloc(&mut self, ptr: impl Into<Option<HeapPtr>>, size: usize) -> Option<HeapPtr> {
        self.try_realloc(ptr, size).ok().flatten()
    }

    /// Resize an allocation, reporting why on failure.
    ///
    /// `Ok(None)` means the call degenerated to a free.
    pub fn try_realloc(
        &mut self,
        ptr: impl Into<Option<HeapPtr>>,
        size: usize,
    ) -> Result<Option<HeapPtr>, AllocError> {
        let ptr = ptr.into();
        if size == 0 {
            if let Some(ptr) = ptr {
                self.try_dealloc(ptr)?;
            }
            return Ok(None);
        }
        let Some(ptr) = ptr else {
            return self.try_alloc(size).map(Some);
        };

        let bp = self.live_block(ptr)?;
        let padded = block_size_for(size).ok_or(AllocError::SizeOverflow { requested: size })?;
        let old = block::block_size(self.arena.bytes(), bp);

        if padded <= old {
            self.shrink_in_place(bp, old, padded);
            self.after_op("realloc");
            return Ok(Some(ptr));
        }

        if let Some(moved) = self.grow_in_place(bp, old, padded) {
            self.after_op("realloc");
            return Ok(Some(HeapPtr::from_offset(moved)));
        }

        // The old block stays allocated until the new one exists, so a
        // failed allocation leaves it exactly as it was.
        let fresh = self.try_alloc(size)?;
        let mem = self.arena.bytes_mut();
        mem.copy_within(bp..bp + old - OVERHEAD, fresh.offset());
        self.release(bp);
        tracing::trace!(from = bp, to = fresh.offset(), size, "realloc moved block");
        self.after_op("realloc");
        Ok(Some(fresh))
    }

    /// Usable payload bytes of a live allocation.
    ///
    /// This is the block size minus overhead, so it includes any rounding
    /// slack beyond the size originally requested.
    pub fn usable_size(&self, ptr: HeapPtr) -> Option<usize> {
        let bp = self.live_block(ptr).ok()?;
        Some(block::block_size(self.arena.bytes(), bp) - OVERHEAD)
    }

    /// Payload bytes of a live allocation.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn payload(&self, ptr: HeapPtr) -> &[u8] {
        let bp = self.expect_live(ptr);
        let len = block::block_size(self.arena.bytes(), bp) - OVERHEAD;
        &self.arena.bytes()[bp..bp + len]
    }

    /// Mutable payload bytes of a live allocation.
    ///
    /// # Panics
    ///
    /// Panics if `ptr` is not a live allocation of this heap.
    pub fn payload_mut(&mut self, ptr: HeapPtr) -> &mut [u8] {
        let bp = self.expect_live(ptr);
        let len = block::block_size(self.arena.bytes(), bp) - OVERHEAD;
        &mut self.arena.bytes_mut()[bp..bp + len]
    }

    /// The arena backing this heap.
    pub fn arena(&self) -> &A {
        &self.arena
    }

    /// Tear the heap down and hand back its arena.
    pub fn into_arena(self) -> A {
        self.arena
    }

    /// The configuration this heap was built with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// The bucket table.
    pub fn free_lists(&self) -> &FreeLists {
        &self.lists
    }

    /// Resolve `ptr` to the payload offset of a live allocated block.
    ///
    /// Checks alignment, bounds, the allocated flag and header/footer
    /// agreement. A pointer into the middle of a payload whose bytes happen
    /// to mimic a block frame is not detected.
    pub(crate) fn live_block(&self, ptr: HeapPtr) -> Result<usize, AllocError> {
        let bp = ptr.offset();
        let top = self.arena.top();
        let invalid = AllocError::InvalidPointer { ptr };
        if bp % DWORD != 0 || bp <= self.prologue || bp >= top {
            return Err(invalid);
        }
        let mem = self.arena.bytes();
        let header = block::get(mem, block::header_of(bp));
        let size = block::unpack_size(header);
        if !block::unpack_allocated(header) || size < MIN_BLOCK || size > top - bp {
            return Err(invalid);
        }
        if block::get(mem, bp + size - DWORD) != header {
            return Err(invalid);
        }
        Ok(bp)
    }

    fn expect_live(&self, ptr: HeapPtr) -> usize {
        match self.live_block(ptr) {
            Ok(bp) => bp,
            Err(err) => panic!("{err}"),
        }
    }

    /// First fit across buckets, starting at the request's own class.
    ///
    /// The chosen block is unlinked. When it is big enough to split, the
    /// tail `adjusted` bytes are returned and the head goes back on a list.
    fn find_fit(&mut self, adjusted: usize) -> Option<usize> {
        let mem = self.arena.bytes_mut();
        for k in bucket_for(adjusted)..NUM_BUCKETS {
            let Some(head) = self.lists.head(k) else {
                continue;
            };
            let mut bp = head;
            loop {
                let size = block::block_size(mem, bp);
                if size >= adjusted {
                    self.lists.remove(mem, bp);
                    let remainder = size - adjusted;
                    if remainder < MIN_BLOCK {
                        return Some(bp);
                    }
                    let tail = bp + remainder;
                    block::write_block(mem, tail, adjusted, false);
                    block::write_block(mem, bp, remainder, false);
                    self.lists.insert(mem, bp);
                    tracing::trace!(block = bp, remainder, carved = tail, "split free block");
                    return Some(tail);
                }
                bp = block::next_link(mem, bp);
                if bp == head {
                    break;
                }
            }
        }
        None
    }

    /// Grow the arena by exactly `adjusted` bytes and frame a free block
    /// over them, moving the epilogue to the new end.
    fn extend_heap(&mut self, adjusted: usize) -> Result<usize, AllocError> {
        let bp = self.arena.extend(adjusted).map_err(|source| {
            tracing::warn!(requested = adjusted, %source, "arena exhausted");
            AllocError::ArenaExhausted {
                requested: adjusted,
                source,
            }
        })?;
        // The old epilogue header becomes the new block's header.
        let mem = self.arena.bytes_mut();
        block::write_block(mem, bp, adjusted, false);
        let epilogue = block::header_of(block::next_block(mem, bp));
        block::put(mem, epilogue, block::pack(0, true));
        tracing::debug!(block = bp, size = adjusted, top = epilogue + WORD, "heap extended");
        Ok(bp)
    }

    /// Mark `bp` allocated at its current size.
    fn place(&mut self, bp: usize) {
        let mem = self.arena.bytes_mut();
        let size = block::block_size(mem, bp);
        block::write_block(mem, bp, size, true);
    }

    /// Mark `bp` free, merge it with free neighbours and list the result.
    fn release(&mut self, bp: usize) {
        let mem = self.arena.bytes_mut();
        let size = block::block_size(mem, bp);
        block::write_block(mem, bp, size, false);
        let merged = coalesce(mem, &mut self.lists, bp);
        self.lists.insert(mem, merged);
    }

    /// Shrink `bp` from `old` to `padded` bytes, tearing off the excess
    /// when it can stand as a block of its own.
    fn shrink_in_place(&mut self, bp: usize, old: usize, padded: usize) {
        let excess = old - padded;
        if excess < MIN_BLOCK {
            return;
        }
        let mem = self.arena.bytes_mut();
        block::write_block(mem, bp, padded, true);
        let torn = bp + padded;
        block::write_block(mem, torn, excess, false);
        // The left neighbour is `bp` itself, so only a free right
        // neighbour can merge.
        let merged = coalesce(mem, &mut self.lists, torn);
        self.lists.insert(mem, merged);
        tracing::trace!(block = bp, size = padded, torn, excess, "realloc shrank in place");
    }

    /// Grow `bp` by absorbing free neighbours, if together they reach
    /// `padded` bytes. Returns the (possibly lower) payload offset.
    fn grow_in_place(&mut self, bp: usize, old: usize, padded: usize) -> Option<usize> {
        let mem = self.arena.bytes();
        let prev = block::prev_block(mem, bp);
        let next = block::next_block(mem, bp);
        let mut available = old;
        if !block::is_allocated(mem, prev) {
            available += block::block_size(mem, prev);
        }
        if !block::is_allocated(mem, next) {
            available += block::block_size(mem, next);
        }
        if available < padded {
            return None;
        }

        let mem = self.arena.bytes_mut();
        block::write_block(mem, bp, old, false);
        let merged = coalesce(mem, &mut self.lists, bp);
        let size = block::block_size(mem, merged);
        if merged != bp {
            mem.copy_within(bp..bp + old - OVERHEAD, merged);
        }
        block::write_block(mem, merged, size, true);
        tracing::trace!(from = bp, to = merged, size, "realloc grew in place");
        Some(merged)
    }

    fn after_op(&self, op: &'static str) {
        if !self.config.verify_each_op {
            return;
        }
        if let Err(corruption) = self.validate() {
            for issue in corruption.issues() {
                tracing::error!(op, %issue, "heap verification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segheap_arena::VecArena;

    fn heap() -> SegHeap<VecArena> {
        SegHeap::new(VecArena::with_limit(1 << 20), HeapConfig::checked()).unwrap()
    }

    #[test]
    fn init_lays_out_sentinels() {
        let heap = heap();
        assert_eq!(heap.arena().top(), INIT_BYTES);
        assert_eq!(heap.prologue, DWORD);
        let mem = heap.arena().bytes();
        assert_eq!(block::block_size(mem, heap.prologue), DWORD);
        assert!(block::is_allocated(mem, heap.prologue));
        assert_eq!(block::get(mem, INIT_BYTES - WORD), block::pack(0, true));
        assert!(heap.check());
    }

    #[test]
    fn init_fails_when_arena_is_too_small() {
        let err = SegHeap::new(VecArena::with_limit(16), HeapConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AllocError::ArenaExhausted { requested: 32, .. }));
    }

    #[test]
    fn ceiling_of_exactly_the_sentinels_inits_but_cannot_grow() {
        let mut heap =
            SegHeap::new(VecArena::with_limit(INIT_BYTES), HeapConfig::default()).unwrap();
        assert!(heap.check());
        assert_eq!(heap.alloc(8), None);
        assert_eq!(heap.arena().top(), INIT_BYTES);
    }

    #[test]
    fn first_payload_is_aligned() {
        let mut heap = heap();
        let p = heap.alloc(1).unwrap();
        assert_eq!(p.offset(), 32);
        assert!(p.is_aligned_to(DWORD));
    }

    #[test]
    fn zero_size_is_refused_without_growth() {
        let mut heap = heap();
        let top = heap.arena().top();
        assert_eq!(heap.alloc(0), None);
        assert_eq!(heap.try_alloc(0), Err(AllocError::ZeroSize));
        assert_eq!(heap.arena().top(), top);
    }

    #[test]
    fn miss_grows_arena_by_exactly_the_block() {
        let mut heap = heap();
        heap.alloc(1000).unwrap();
        assert_eq!(heap.arena().top(), INIT_BYTES + 1024);
    }

    #[test]
    fn small_requests_are_rounded() {
        let mut heap = heap();
        let p = heap.alloc(100).unwrap();
        assert_eq!(heap.usable_size(p), Some(128));

        let mut exact =
            SegHeap::new(VecArena::default(), HeapConfig::default().exact_sizes()).unwrap();
        let p = exact.alloc(100).unwrap();
        assert_eq!(exact.usable_size(p), Some(112));
    }

    #[test]
    fn split_hands_out_the_tail() {
        let mut heap = heap();
        let big = heap.alloc(1000).unwrap();
        let _guard = heap.alloc(8).unwrap();
        heap.dealloc(big);
        let small = heap.alloc(8).unwrap();
        // Tail of the 1024-byte block, 32 bytes from its end.
        assert_eq!(small.offset(), big.offset() + 1024 - 32);
        assert_eq!(heap.bucket_sizes(5), vec![992]);
        assert!(heap.check());
    }

    #[test]
    fn close_fit_is_taken_whole() {
        let mut heap = heap();
        let a = heap.alloc(40).unwrap(); // 64 payload → 80-byte block
        let _guard = heap.alloc(8).unwrap();
        heap.dealloc(a);
        let b = heap.alloc(30).unwrap(); // 32 payload → 48-byte block, remainder 32
        assert_eq!(b.offset(), a.offset() + 32);
        let c = heap.alloc(17).unwrap(); // 48 again; the 32-byte remainder is too small
        assert_ne!(c, a);
        assert!(heap.check());
    }

    #[test]
    fn whole_block_keeps_its_size() {
        let mut heap =
            SegHeap::new(VecArena::default(), HeapConfig::checked().exact_sizes()).unwrap();
        let a = heap.alloc(48).unwrap(); // 64-byte block
        let _guard = heap.alloc(8).unwrap();
        heap.dealloc(a);
        let b = heap.alloc(40).unwrap(); // needs 64, gets the 64-byte block
        assert_eq!(a, b);
        let b2 = heap.alloc(20); // new 48-byte block somewhere else
        assert!(b2.is_some());
        heap.dealloc(b);
        let c = heap.alloc(20).unwrap(); // 48 fits in 64 with 16 spare: taken whole
        assert_eq!(c, a);
        assert_eq!(heap.usable_size(c), Some(48));
    }

    #[test]
    fn dealloc_ignores_garbage() {
        let mut heap = heap();
        let p = heap.alloc(64).unwrap();
        heap.dealloc(None);
        heap.dealloc(HeapPtr::from_offset(3));
        heap.dealloc(HeapPtr::from_offset(1 << 30));
        heap.dealloc(HeapPtr::from_offset(0));
        assert!(heap.check());
        heap.dealloc(p);
        heap.dealloc(p);
        assert!(heap.check());
        assert_eq!(heap.stats().free_blocks, 1);
    }

    #[test]
    fn try_dealloc_reports_double_free() {
        let mut heap = heap();
        let p = heap.alloc(64).unwrap();
        assert_eq!(heap.try_dealloc(p), Ok(()));
        assert_eq!(heap.try_dealloc(p), Err(AllocError::InvalidPointer { ptr: p }));
    }

    #[test]
    fn exhaustion_returns_none_and_keeps_heap_intact() {
        let mut heap = SegHeap::new(VecArena::with_limit(256), HeapConfig::checked()).unwrap();
        let p = heap.alloc(100).unwrap(); // 144-byte block, top = 176
        assert_eq!(heap.alloc(100), None);
        assert!(matches!(heap.try_alloc(100), Err(AllocError::ArenaExhausted { .. })));
        assert_eq!(heap.arena().top(), 176);
        assert!(heap.check());
        heap.dealloc(p);
        assert!(heap.alloc(100).is_some());
    }

    #[test]
    fn size_overflow_is_reported() {
        let mut heap = heap();
        assert_eq!(
            heap.try_alloc(usize::MAX),
            Err(AllocError::SizeOverflow { requested: usize::MAX })
        );
    }

    #[test]
    fn realloc_null_allocates_and_zero_frees() {
        let mut heap = heap();
        let p = heap.realloc(None, 24).unwrap();
        assert!(heap.usable_size(p).is_some());
        assert_eq!(heap.realloc(p, 0), None);
        assert_eq!(heap.usable_size(p), None);
        assert_eq!(heap.realloc(None, 0), None);
        assert!(heap.check());
    }

    #[test]
    fn realloc_shrink_small_excess_is_a_no_op() {
        let mut heap = heap();
        let p = heap.alloc(64).unwrap(); // 80-byte block
        let q = heap.realloc(p, 40).unwrap(); // needs 64: excess 16
        assert_eq!(p, q);
        assert_eq!(heap.usable_size(q), Some(64));
    }

    #[test]
    fn realloc_shrink_tear_merges_with_free_right_neighbour() {
        let mut heap = heap();
        let p = heap.alloc(1000).unwrap();
        let right = heap.alloc(1000).unwrap();
        let _guard = heap.alloc(8).unwrap();
        heap.dealloc(right);
        let q = heap.realloc(p, 10).unwrap();
        assert_eq!(p, q);
        // Torn 992 bytes + the freed 1024-byte neighbour.
        assert_eq!(heap.bucket_sizes(6), vec![2016]);
        assert!(heap.check());
    }

    #[test]
    fn realloc_grows_into_free_next() {
        let mut heap = heap();
        let p = heap.alloc(600).unwrap(); // 624-byte block
        let next = heap.alloc(600).unwrap();
        let _guard = heap.alloc(8).unwrap();
        heap.dealloc(next);
        heap.payload_mut(p)[..4].copy_from_slice(&[1, 2, 3, 4]);
        let q = heap.realloc(p, 1000).unwrap();
        assert_eq!(p, q);
        assert_eq!(&heap.payload(q)[..4], &[1, 2, 3, 4]);
        assert_eq!(heap.usable_size(q), Some(1248 - OVERHEAD));
        assert!(heap.check());
    }

    #[test]
    fn realloc_grows_into_free_previous_and_moves_payload() {
        let mut heap = heap();
        let prev = heap.alloc(600).unwrap();
        let p = heap.alloc(600).unwrap();
        let _guard = heap.alloc(8).unwrap();
        heap.payload_mut(p).fill(0x5A);
        heap.dealloc(prev);
        let q = heap.realloc(p, 1000).unwrap();
        assert_eq!(q, prev);
        assert!(heap.payload(q)[..600].iter().all(|&b| b == 0x5A));
        assert!(heap.check());
    }

    #[test]
    fn realloc_grows_across_both_neighbours() {
        let mut heap = heap();
        let a = heap.alloc(600).unwrap(); // 624-byte blocks
        let b = heap.alloc(600).unwrap();
        let c = heap.alloc(600).unwrap();
        let _guard = heap.alloc(8).unwrap();
        heap.payload_mut(b).fill(0x3C);
        heap.dealloc(a);
        heap.dealloc(c);
        let q = heap.realloc(b, 1800).unwrap(); // needs 1824 of the 1872 merged
        assert_eq!(q, a);
        assert!(heap.payload(q)[..608].iter().all(|&x| x == 0x3C));
        assert_eq!(heap.usable_size(q), Some(3 * 624 - OVERHEAD));
        assert_eq!(heap.stats().free_blocks, 0);
        assert!(heap.check());
    }

    #[test]
    fn realloc_failure_leaves_block_untouched() {
        let mut heap = SegHeap::new(VecArena::with_limit(512), HeapConfig::checked()).unwrap();
        let p = heap.alloc(200).unwrap();
        heap.payload_mut(p)[..3].copy_from_slice(b"abc");
        let before = heap.arena().bytes().to_vec();
        assert_eq!(heap.realloc(p, 4000), None);
        assert_eq!(heap.arena().bytes(), &before[..]);
        assert_eq!(&heap.payload(p)[..3], b"abc");
        assert!(heap.check());
    }

    #[test]
    fn realloc_rejects_dead_pointer() {
        let mut heap = heap();
        let p = heap.alloc(64).unwrap();
        heap.dealloc(p);
        assert_eq!(
            heap.try_realloc(p, 128),
            Err(AllocError::InvalidPointer { ptr: p })
        );
        assert_eq!(heap.realloc(p, 128), None);
    }

    #[test]
    #[should_panic(expected = "is not a live allocation")]
    fn payload_of_freed_block_panics() {
        let mut heap = heap();
        let p = heap.alloc(64).unwrap();
        heap.dealloc(p);
        let _ = heap.payload(p);
    }

    #[test]
    fn init_discards_previous_state() {
        let mut heap = heap();
        heap.alloc(500).unwrap();
        heap.init().unwrap();
        assert_eq!(heap.arena().top(), INIT_BYTES);
        assert_eq!(heap.stats().free_blocks, 0);
        assert!(heap.check());
    }
}
