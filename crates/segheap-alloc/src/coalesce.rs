//! Immediate-neighbour coalescing.

use crate::block;
use crate::buckets::FreeLists;

/// Merge free block `bp` with whichever immediate neighbours are free.
///
/// `bp` must already be marked free and must not be in any bucket.
/// Neighbours that get absorbed are removed from their buckets first.
/// Returns the payload offset of the merged block, which moves down to
/// the previous block when that one was free. The result is NOT inserted;
/// the caller decides whether to list it, split it or hand it out.
///
/// The prologue and epilogue sentinels are always allocated, so the first
/// and last blocks need no special casing.
pub fn coalesce(mem: &mut [u8], lists: &mut FreeLists, bp: usize) -> usize {
    let prev = block::prev_block(mem, bp);
    let next = block::next_block(mem, bp);
    let prev_free = !block::is_allocated(mem, prev);
    let next_free = !block::is_allocated(mem, next);
    let size = block::block_size(mem, bp);

    match (prev_free, next_free) {
        (false, false) => bp,
        (false, true) => {
            lists.remove(mem, next);
            let merged = size + block::block_size(mem, next);
            block::write_block(mem, bp, merged, false);
            tracing::trace!(block = bp, absorbed = next, size = merged, "coalesced with next");
            bp
        }
        (true, false) => {
            lists.remove(mem, prev);
            let merged = size + block::block_size(mem, prev);
            block::write_block(mem, prev, merged, false);
            tracing::trace!(block = prev, absorbed = bp, size = merged, "coalesced with previous");
            prev
        }
        (true, true) => {
            lists.remove(mem, prev);
            lists.remove(mem, next);
            let merged = size + block::block_size(mem, prev) + block::block_size(mem, next);
            block::write_block(mem, prev, merged, false);
            tracing::trace!(block = prev, size = merged, "coalesced with both neighbours");
            prev
        }
    }
}
