//! Heap validator.
//!
//! Walks the block sequence from prologue to epilogue, then every bucket
//! ring, and reports everything that breaks the heap's structural rules.
//! Read-only and linear in heap size, so it belongs in tests and debug
//! runs, not on the allocation path.

use std::error::Error;
use std::fmt;

use smallvec::SmallVec;

use segheap_core::layout::{DWORD, MIN_BLOCK, NUM_BUCKETS, WORD};
use segheap_core::Arena;

use crate::block;
use crate::buckets::bucket_for;
use crate::heap::SegHeap;

/// One structural problem found by the validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Corruption {
    /// The prologue sentinel is not an allocated `DWORD` block.
    BadPrologue {
        /// Payload offset of the prologue.
        block: usize,
    },
    /// The walk did not end on an allocated zero-size header at the top.
    BadEpilogue {
        /// Offset where the walk stopped.
        block: usize,
    },
    /// A block size is not a multiple of the alignment unit.
    MisalignedSize {
        /// Payload offset.
        block: usize,
        /// Size read from the header.
        size: usize,
    },
    /// A block is smaller than the minimum block size.
    Undersized {
        /// Payload offset.
        block: usize,
        /// Size read from the header.
        size: usize,
    },
    /// Header and footer words differ.
    HeaderFooterMismatch {
        /// Payload offset.
        block: usize,
        /// Raw header word.
        header: u64,
        /// Raw footer word.
        footer: u64,
    },
    /// A block extends past the arena top.
    BlockOutOfBounds {
        /// Payload offset.
        block: usize,
    },
    /// Two free blocks sit next to each other.
    Uncoalesced {
        /// The lower block.
        first: usize,
        /// The block right after it.
        second: usize,
    },
    /// A bucket links to an allocated block.
    ListedAllocated {
        /// Bucket index.
        bucket: usize,
        /// Payload offset.
        block: usize,
    },
    /// A bucket links outside the arena.
    ListedOutOfBounds {
        /// Bucket index.
        bucket: usize,
        /// Offending link value.
        block: usize,
    },
    /// A block sits in a bucket its size does not map to.
    WrongBucket {
        /// Bucket the block was found in.
        bucket: usize,
        /// Payload offset.
        block: usize,
        /// Bucket its size maps to.
        expected: usize,
    },
    /// `next.prev` does not lead back to the block.
    BrokenLink {
        /// Bucket index.
        bucket: usize,
        /// Payload offset.
        block: usize,
    },
    /// A ring did not close within the number of free blocks in the heap.
    RingNotClosed {
        /// Bucket index.
        bucket: usize,
    },
    /// The buckets list a different number of blocks than the walk found free.
    FreeCountMismatch {
        /// Blocks reachable from the buckets.
        listed: usize,
        /// Free blocks found walking the arena.
        free: usize,
    },
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadPrologue { block } => write!(f, "prologue at {block:#x} is damaged"),
            Self::BadEpilogue { block } => write!(f, "no epilogue at {block:#x}"),
            Self::MisalignedSize { block, size } => {
                write!(f, "block {block:#x} has misaligned size {size}")
            }
            Self::Undersized { block, size } => {
                write!(f, "block {block:#x} is below the minimum size ({size} bytes)")
            }
            Self::HeaderFooterMismatch {
                block,
                header,
                footer,
            } => write!(
                f,
                "block {block:#x} header {header:#x} does not match footer {footer:#x}"
            ),
            Self::BlockOutOfBounds { block } => {
                write!(f, "block {block:#x} runs past the arena top")
            }
            Self::Uncoalesced { first, second } => {
                write!(f, "free blocks {first:#x} and {second:#x} are not coalesced")
            }
            Self::ListedAllocated { bucket, block } => {
                write!(f, "bucket {bucket} lists allocated block {block:#x}")
            }
            Self::ListedOutOfBounds { bucket, block } => {
                write!(f, "bucket {bucket} links to {block:#x} outside the heap")
            }
            Self::WrongBucket {
                bucket,
                block,
                expected,
            } => write!(
                f,
                "block {block:#x} listed in bucket {bucket}, belongs in {expected}"
            ),
            Self::BrokenLink { bucket, block } => {
                write!(f, "bucket {bucket}: back link of {block:#x}'s successor is wrong")
            }
            Self::RingNotClosed { bucket } => write!(f, "bucket {bucket} ring does not close"),
            Self::FreeCountMismatch { listed, free } => {
                write!(f, "{listed} blocks listed but {free} free blocks in the heap")
            }
        }
    }
}

/// Everything the validator found wrong with a heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapCorruption {
    issues: SmallVec<[Corruption; 4]>,
}

impl HeapCorruption {
    /// The individual problems, in discovery order.
    pub fn issues(&self) -> &[Corruption] {
        &self.issues
    }
}

impl fmt::Display for HeapCorruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "heap corrupted ({} issues)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

impl Error for HeapCorruption {}

impl<A: Arena> SegHeap<A> {
    /// Whether the heap passes every structural check.
    pub fn check(&self) -> bool {
        self.validate().is_ok()
    }

    /// Run every structural check and collect what fails.
    pub fn validate(&self) -> Result<(), HeapCorruption> {
        let mut issues = SmallVec::new();
        let free = self.walk_blocks(&mut issues);
        self.walk_buckets(free, &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(HeapCorruption { issues })
        }
    }

    /// Walk prologue to epilogue. Returns the number of free blocks seen.
    fn walk_blocks(&self, issues: &mut SmallVec<[Corruption; 4]>) -> usize {
        let mem = self.arena.bytes();
        let top = self.arena.top();
        let prologue = self.prologue;

        let sentinel = block::pack(DWORD, true);
        if block::try_get(mem, prologue - WORD) != Some(sentinel)
            || block::try_get(mem, prologue) != Some(sentinel)
        {
            issues.push(Corruption::BadPrologue { block: prologue });
            return 0;
        }

        let mut free = 0;
        let mut prev_free: Option<usize> = None;
        let mut bp = prologue + DWORD;
        loop {
            let Some(header) = block::try_get(mem, bp - WORD) else {
                issues.push(Corruption::BlockOutOfBounds { block: bp });
                break;
            };
            let size = block::unpack_size(header);
            let allocated = block::unpack_allocated(header);

            if size == 0 {
                if !allocated || bp != top {
                    issues.push(Corruption::BadEpilogue { block: bp });
                }
                break;
            }
            // Bits between the flag and the alignment unit must be clear.
            if header & (DWORD as u64 - 1) & !1 != 0 {
                issues.push(Corruption::MisalignedSize { block: bp, size });
                break;
            }
            if size > top.saturating_sub(bp) {
                issues.push(Corruption::BlockOutOfBounds { block: bp });
                break;
            }
            if size < MIN_BLOCK {
                issues.push(Corruption::Undersized { block: bp, size });
            }
            let footer = block::get(mem, bp + size - DWORD);
            if footer != header {
                issues.push(Corruption::HeaderFooterMismatch {
                    block: bp,
                    header,
                    footer,
                });
            }
            if allocated {
                prev_free = None;
            } else {
                free += 1;
                if let Some(first) = prev_free {
                    issues.push(Corruption::Uncoalesced { first, second: bp });
                }
                prev_free = Some(bp);
            }
            bp += size;
        }
        free
    }

    /// Walk every bucket ring, checking membership and link symmetry.
    fn walk_buckets(&self, free: usize, issues: &mut SmallVec<[Corruption; 4]>) {
        let mem = self.arena.bytes();
        let top = self.arena.top();
        let lowest = self.prologue + DWORD;
        let in_bounds = |bp: usize| {
            bp >= lowest
                && bp % DWORD == 0
                && bp.checked_add(MIN_BLOCK - WORD).is_some_and(|end| end <= top)
        };

        let mut listed = 0;
        for k in 0..NUM_BUCKETS {
            let Some(head) = self.lists.head(k) else {
                continue;
            };
            let mut bp = head;
            let mut steps = 0;
            loop {
                if !in_bounds(bp) {
                    issues.push(Corruption::ListedOutOfBounds { bucket: k, block: bp });
                    break;
                }
                let header = block::get(mem, bp - WORD);
                let size = block::unpack_size(header);
                if block::unpack_allocated(header) {
                    issues.push(Corruption::ListedAllocated { bucket: k, block: bp });
                }
                if size >= MIN_BLOCK && bucket_for(size) != k {
                    issues.push(Corruption::WrongBucket {
                        bucket: k,
                        block: bp,
                        expected: bucket_for(size),
                    });
                }
                let next = block::next_link(mem, bp);
                if !in_bounds(next) {
                    issues.push(Corruption::ListedOutOfBounds { bucket: k, block: next });
                    break;
                }
                if block::prev_link(mem, next) != bp {
                    issues.push(Corruption::BrokenLink { bucket: k, block: bp });
                    break;
                }
                listed += 1;
                steps += 1;
                bp = next;
                if bp == head {
                    break;
                }
                if steps > free {
                    issues.push(Corruption::RingNotClosed { bucket: k });
                    break;
                }
            }
        }
        if listed != free {
            issues.push(Corruption::FreeCountMismatch { listed, free });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;
    use segheap_arena::VecArena;
    use segheap_core::Arena;

    fn heap() -> SegHeap<VecArena> {
        SegHeap::new(VecArena::default(), HeapConfig::default()).unwrap()
    }

    fn issues(heap: &SegHeap<VecArena>) -> Vec<Corruption> {
        heap.validate().unwrap_err().issues().to_vec()
    }

    #[test]
    fn fresh_heap_is_valid() {
        assert!(heap().check());
    }

    #[test]
    fn detects_header_footer_mismatch() {
        let mut heap = heap();
        let p = heap.alloc(64).unwrap().offset();
        let mem = heap.arena.bytes_mut();
        let footer = block::footer_of(mem, p);
        block::put(mem, footer, block::pack(80, false));
        assert!(matches!(
            issues(&heap)[0],
            Corruption::HeaderFooterMismatch { block, .. } if block == p
        ));
    }

    #[test]
    fn detects_uncoalesced_neighbours() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        let b = heap.alloc(64).unwrap().offset();
        // Flip both to free behind the allocator's back and list them.
        let mem = heap.arena.bytes_mut();
        block::write_block(mem, a, 80, false);
        block::write_block(mem, b, 80, false);
        heap.lists.insert(mem, a);
        heap.lists.insert(mem, b);
        assert_eq!(issues(&heap), vec![Corruption::Uncoalesced { first: a, second: b }]);
    }

    #[test]
    fn detects_unlisted_free_block() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        let mem = heap.arena.bytes_mut();
        block::write_block(mem, a, 80, false);
        assert_eq!(
            issues(&heap),
            vec![Corruption::FreeCountMismatch { listed: 0, free: 1 }]
        );
    }

    #[test]
    fn detects_allocated_block_in_bucket() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        let mem = heap.arena.bytes_mut();
        heap.lists.insert(mem, a);
        assert_eq!(
            issues(&heap),
            vec![
                Corruption::ListedAllocated { bucket: 2, block: a },
                Corruption::FreeCountMismatch { listed: 1, free: 0 },
            ]
        );
    }

    #[test]
    fn detects_undersized_block() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        // Reframe the 80-byte block as a 16-byte block followed by a 64-byte one.
        let mem = heap.arena.bytes_mut();
        block::write_block(mem, a, 16, true);
        block::write_block(mem, a + 16, 64, true);
        assert_eq!(issues(&heap), vec![Corruption::Undersized { block: a, size: 16 }]);
    }

    #[test]
    fn detects_block_past_top() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        let header = block::header_of(a);
        block::put(heap.arena.bytes_mut(), header, block::pack(4096, true));
        assert_eq!(issues(&heap), vec![Corruption::BlockOutOfBounds { block: a }]);
    }

    #[test]
    fn detects_block_in_wrong_bucket() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        let _guard = heap.alloc(8).unwrap();
        let mem = heap.arena.bytes_mut();
        block::write_block(mem, a, 80, false);
        // List it under a 144-byte header, then restore the real size.
        block::put(mem, block::header_of(a), block::pack(144, false));
        heap.lists.insert(mem, a);
        block::put(mem, block::header_of(a), block::pack(80, false));
        assert_eq!(
            issues(&heap),
            vec![Corruption::WrongBucket {
                bucket: 3,
                block: a,
                expected: 2,
            }]
        );
    }

    #[test]
    fn detects_link_outside_heap() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap();
        let _guard = heap.alloc(8).unwrap();
        heap.dealloc(a);
        block::set_next_link(heap.arena.bytes_mut(), a.offset(), 0x7fff_0000);
        assert_eq!(
            issues(&heap),
            vec![
                Corruption::ListedOutOfBounds {
                    bucket: 2,
                    block: 0x7fff_0000,
                },
                Corruption::FreeCountMismatch { listed: 0, free: 1 },
            ]
        );
    }

    #[test]
    fn detects_ring_longer_than_free_count() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap();
        let b = heap.alloc(64).unwrap().offset();
        let c = heap.alloc(64).unwrap().offset();
        heap.dealloc(a);
        // Thread two allocated blocks into the ring. Back links stay
        // consistent, so the walk runs until it outnumbers the free blocks.
        let mem = heap.arena.bytes_mut();
        heap.lists.insert(mem, b);
        heap.lists.insert(mem, c);
        assert_eq!(
            issues(&heap),
            vec![
                Corruption::ListedAllocated { bucket: 2, block: c },
                Corruption::ListedAllocated { bucket: 2, block: b },
                Corruption::RingNotClosed { bucket: 2 },
                Corruption::FreeCountMismatch { listed: 2, free: 1 },
            ]
        );
    }

    #[test]
    fn detects_broken_back_link() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap();
        let _guard = heap.alloc(8).unwrap();
        let b = heap.alloc(64).unwrap();
        let _guard2 = heap.alloc(8).unwrap();
        heap.dealloc(a);
        heap.dealloc(b);
        let mem = heap.arena.bytes_mut();
        block::set_prev_link(mem, a.offset(), 0x1000);
        assert!(issues(&heap)
            .iter()
            .any(|c| matches!(c, Corruption::BrokenLink { bucket: 2, .. })));
    }

    #[test]
    fn detects_stray_header_bits() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        let header = block::header_of(a);
        block::put(heap.arena.bytes_mut(), header, block::pack(80, true) | 0b100);
        assert_eq!(
            issues(&heap),
            vec![Corruption::MisalignedSize { block: a, size: 80 }]
        );
    }

    #[test]
    fn detects_bad_epilogue() {
        let mut heap = heap();
        heap.alloc(64).unwrap();
        let top = heap.arena.top();
        block::put(heap.arena.bytes_mut(), top - WORD, block::pack(0, false));
        assert_eq!(issues(&heap), vec![Corruption::BadEpilogue { block: top }]);
    }

    #[test]
    fn detects_damaged_prologue() {
        let mut heap = heap();
        let prologue = heap.prologue;
        block::put(heap.arena.bytes_mut(), prologue, 0);
        assert_eq!(issues(&heap), vec![Corruption::BadPrologue { block: prologue }]);
    }

    #[test]
    fn corruption_display_lists_every_issue() {
        let mut heap = heap();
        let a = heap.alloc(64).unwrap().offset();
        block::write_block(heap.arena.bytes_mut(), a, 80, false);
        let text = heap.validate().unwrap_err().to_string();
        assert!(text.starts_with("heap corrupted (1 issues)"));
        assert!(text.contains("1 free blocks"));
    }
}
