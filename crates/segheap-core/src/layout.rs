//! Block layout constants and size arithmetic.
//!
//! Every block is framed by a one-word header and a one-word footer:
//!
//! ```text
//!   ┌────────┬──────────────────────────────┬────────┐
//!   │ header │           payload            │ footer │
//!   │ size|a │  (free: next, prev, ...)     │ size|a │
//!   └────────┴──────────────────────────────┴────────┘
//!            ▲
//!            └── HeapPtr
//! ```
//!
//! Words are fixed at 64 bits regardless of the host, so heap images are
//! identical on every platform.

/// Width of a header, footer or free-list link, in bytes.
pub const WORD: usize = 8;

/// Double word: the payload alignment unit.
pub const DWORD: usize = 2 * WORD;

/// Per-block metadata: header plus footer.
pub const OVERHEAD: usize = 2 * WORD;

/// Smallest legal block. A free block needs a header, two links and a footer.
pub const MIN_BLOCK: usize = 2 * DWORD;

/// Number of segregated size classes.
pub const NUM_BUCKETS: usize = 8;

/// `log2(MIN_BLOCK)`; bucket 0 holds blocks of at most `2^MIN_BUCKET_PWR` bytes.
pub const MIN_BUCKET_PWR: u32 = 5;

/// Requests strictly below this many bytes are rounded to a power of two.
pub const SMALL_REQUEST_LIMIT: usize = 512;

/// Low bit of a header/footer word marking the block allocated.
pub const ALLOCATED_BIT: u64 = 0x1;

/// Bytes written by heap initialisation: padding, prologue header and
/// footer, epilogue header.
pub const INIT_BYTES: usize = 4 * WORD;

/// Round `value` up to the next multiple of `align` (a power of two).
///
/// Returns `None` on overflow.
#[inline]
pub fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(value.checked_add(align - 1)? & !(align - 1))
}

/// Block size needed to satisfy a payload request of `size` bytes.
///
/// Adds header/footer overhead, rounds to [`DWORD`] and applies the
/// [`MIN_BLOCK`] floor. Returns `None` if the arithmetic overflows.
#[inline]
pub fn block_size_for(size: usize) -> Option<usize> {
    if size <= DWORD {
        return Some(MIN_BLOCK);
    }
    align_up(size.checked_add(OVERHEAD)?, DWORD)
}

/// Round requests below `limit` up to the next power of two.
///
/// Larger requests pass through unchanged.
#[inline]
pub fn round_small_request(size: usize, limit: usize) -> usize {
    if size > 0 && size < limit {
        size.next_power_of_two()
    } else {
        size
    }
}
