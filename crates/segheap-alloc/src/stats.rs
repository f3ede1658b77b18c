//! Heap introspection: block walk, statistics and dumps.

use std::fmt;

use segheap_core::layout::{DWORD, NUM_BUCKETS, OVERHEAD, WORD};
use segheap_core::{Arena, HeapPtr};

use crate::block;
use crate::buckets::bucket_range;
use crate::heap::SegHeap;

/// One block between the sentinels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Payload offset.
    pub payload: HeapPtr,
    /// Whole block size, including header and footer.
    pub size: usize,
    /// Allocated flag.
    pub allocated: bool,
}

impl BlockInfo {
    /// Payload bytes available in this block.
    pub fn usable(&self) -> usize {
        self.size - OVERHEAD
    }
}

/// Iterator over the blocks of a heap in address order.
///
/// Stops at the epilogue, or early if a header points outside the arena.
pub struct Blocks<'a> {
    mem: &'a [u8],
    top: usize,
    cursor: usize,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let bp = self.cursor;
        let header = block::try_get(self.mem, bp.checked_sub(WORD)?)?;
        let size = block::unpack_size(header);
        if size == 0 || size > self.top.saturating_sub(bp) {
            return None;
        }
        self.cursor = bp + size;
        Some(BlockInfo {
            payload: HeapPtr::from_offset(bp),
            size,
            allocated: block::unpack_allocated(header),
        })
    }
}

/// Aggregate occupancy figures for a heap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Bytes the arena has handed to the heap, sentinels included.
    pub arena_bytes: usize,
    /// Number of allocated blocks.
    pub allocated_blocks: usize,
    /// Bytes in allocated blocks, overhead included.
    pub allocated_bytes: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Bytes in free blocks.
    pub free_bytes: usize,
    /// Size of the largest free block, or 0.
    pub largest_free: usize,
    /// Number of blocks listed in each bucket.
    pub bucket_counts: [usize; NUM_BUCKETS],
}

impl HeapStats {
    /// Fraction of arena bytes held by allocated blocks.
    pub fn utilization(&self) -> f64 {
        if self.arena_bytes == 0 {
            return 0.0;
        }
        self.allocated_bytes as f64 / self.arena_bytes as f64
    }
}

/// Printable snapshot of a heap's blocks and buckets.
#[derive(Clone, Debug)]
pub struct HeapDump {
    /// Every block in address order.
    pub blocks: Vec<BlockInfo>,
    /// Sizes in each bucket, in ring order.
    pub buckets: Vec<Vec<usize>>,
    /// Arena top at the time of the snapshot.
    pub top: usize,
}

impl fmt::Display for HeapDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "heap: {} blocks, top {:#x}", self.blocks.len(), self.top)?;
        writeln!(f, "{:>10} {:>10}  state", "payload", "size")?;
        for info in &self.blocks {
            let state = if info.allocated { "alloc" } else { "free" };
            writeln!(f, "{:>10} {:>10}  {state}", info.payload.to_string(), info.size)?;
        }
        for (k, sizes) in self.buckets.iter().enumerate() {
            if sizes.is_empty() {
                continue;
            }
            let range = bucket_range(k);
            if k == NUM_BUCKETS - 1 {
                write!(f, "bucket {k} [{}..]:", range.start())?;
            } else {
                write!(f, "bucket {k} [{}..={}]:", range.start(), range.end())?;
            }
            for size in sizes {
                write!(f, " {size}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<A: Arena> SegHeap<A> {
    /// Walk every block between the sentinels in address order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            mem: self.arena.bytes(),
            top: self.arena.top(),
            cursor: self.prologue + DWORD,
        }
    }

    /// Block sizes in bucket `k`, in ring order from the head.
    ///
    /// # Panics
    ///
    /// Panics if `k >= NUM_BUCKETS`.
    pub fn bucket_sizes(&self, k: usize) -> Vec<usize> {
        let mem = self.arena.bytes();
        self.lists
            .iter(mem, k)
            .map(|bp| block::block_size(mem, bp))
            .collect()
    }

    /// Occupancy figures from one walk of the heap.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            arena_bytes: self.arena.top() - self.arena.base(),
            ..HeapStats::default()
        };
        for info in self.blocks() {
            if info.allocated {
                stats.allocated_blocks += 1;
                stats.allocated_bytes += info.size;
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += info.size;
                stats.largest_free = stats.largest_free.max(info.size);
            }
        }
        let mem = self.arena.bytes();
        for (k, count) in stats.bucket_counts.iter_mut().enumerate() {
            *count = self.lists.iter(mem, k).count();
        }
        stats
    }

    /// Snapshot the heap for printing and log it at debug level.
    pub fn dump(&self) -> HeapDump {
        let dump = HeapDump {
            blocks: self.blocks().collect(),
            buckets: (0..NUM_BUCKETS).map(|k| self.bucket_sizes(k)).collect(),
            top: self.arena.top(),
        };
        tracing::debug!(blocks = dump.blocks.len(), top = dump.top, "heap dump\n{dump}");
        dump
    }
}
