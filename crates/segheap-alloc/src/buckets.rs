//! Segregated free lists.
//!
//! [`FreeLists`] keeps one head per size class. Each class is a circular
//! doubly-linked ring threaded through the payloads of its free blocks
//! (see [`block`](crate::block) for the link overlay). Links are arena
//! offsets, so the table itself is just `NUM_BUCKETS` optional offsets.
//!
//! Class `k` holds blocks whose size lies in
//! `(2^(k + MIN_BUCKET_PWR - 1), 2^(k + MIN_BUCKET_PWR)]`; the last class
//! takes everything larger.

use std::ops::RangeInclusive;

use segheap_core::layout::{MIN_BLOCK, MIN_BUCKET_PWR, NUM_BUCKETS};

use crate::block;

/// Size class for a block of `size` bytes.
///
/// Logarithmic: each class covers twice the range of the one before it.
///
/// # Panics
///
/// Panics if `size` is below [`MIN_BLOCK`]; such blocks never exist.
#[inline]
pub fn bucket_for(size: usize) -> usize {
    assert!(size >= MIN_BLOCK, "block of {size} bytes is below the minimum");
    let bits = usize::BITS - (size - 1).leading_zeros();
    (bits.saturating_sub(MIN_BUCKET_PWR) as usize).min(NUM_BUCKETS - 1)
}

/// Block sizes held by class `k`. The last class is open-ended.
///
/// # Panics
///
/// Panics if `k >= NUM_BUCKETS`.
pub fn bucket_range(k: usize) -> RangeInclusive<usize> {
    assert!(k < NUM_BUCKETS, "bucket index {k} out of range");
    let low = if k == 0 {
        MIN_BLOCK
    } else {
        (1usize << (k as u32 + MIN_BUCKET_PWR - 1)) + 1
    };
    let high = if k == NUM_BUCKETS - 1 {
        usize::MAX
    } else {
        1usize << (k as u32 + MIN_BUCKET_PWR)
    };
    low..=high
}

/// The size-class bucket table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreeLists {
    heads: [Option<usize>; NUM_BUCKETS],
}

impl FreeLists {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every bucket. Block contents are left untouched.
    pub fn clear(&mut self) {
        self.heads = [None; NUM_BUCKETS];
    }

    /// Head of bucket `k`.
    pub fn head(&self, k: usize) -> Option<usize> {
        self.heads[k]
    }

    /// Whether bucket `k` holds no blocks.
    pub fn is_empty(&self, k: usize) -> bool {
        self.heads[k].is_none()
    }

    /// Push free block `bp` at the head of the bucket its header size maps to.
    pub fn insert(&mut self, mem: &mut [u8], bp: usize) {
        let k = bucket_for(block::block_size(mem, bp));
        match self.heads[k] {
            None => {
                block::set_next_link(mem, bp, bp);
                block::set_prev_link(mem, bp, bp);
            }
            Some(head) => {
                let tail = block::prev_link(mem, head);
                block::set_next_link(mem, bp, head);
                block::set_prev_link(mem, bp, tail);
                block::set_next_link(mem, tail, bp);
                block::set_prev_link(mem, head, bp);
            }
        }
        self.heads[k] = Some(bp);
    }

    /// Unlink free block `bp` from its bucket.
    ///
    /// The header size must still be the one the block was inserted with.
    pub fn remove(&mut self, mem: &mut [u8], bp: usize) {
        let k = bucket_for(block::block_size(mem, bp));
        let next = block::next_link(mem, bp);
        if next == bp {
            debug_assert_eq!(
                self.heads[k],
                Some(bp),
                "lone block {bp:#x} is not the head of bucket {k}"
            );
            self.heads[k] = None;
            return;
        }
        let prev = block::prev_link(mem, bp);
        block::set_next_link(mem, prev, next);
        block::set_prev_link(mem, next, prev);
        if self.heads[k] == Some(bp) {
            self.heads[k] = Some(next);
        }
    }

    /// Iterate bucket `k` once around its ring, starting at the head.
    pub fn iter<'a>(&self, mem: &'a [u8], k: usize) -> BucketIter<'a> {
        BucketIter {
            mem,
            head: self.heads[k],
            cursor: self.heads[k],
        }
    }
}

/// Iterator over the payload offsets in one bucket.
pub struct BucketIter<'a> {
    mem: &'a [u8],
    head: Option<usize>,
    cursor: Option<usize>,
}

impl Iterator for BucketIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let bp = self.cursor?;
        let next = block::next_link(self.mem, bp);
        self.cursor = if Some(next) == self.head { None } else { Some(next) };
        Some(bp)
    }
}
