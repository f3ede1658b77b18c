//! Block header/footer codec and the free-block link overlay.
//!
//! Blocks are addressed by payload offset `bp`. The header word sits at
//! `bp - WORD`, the footer word at `bp + size - DWORD`. Both pack the block
//! size with the allocated flag in the low bit.
//!
//! While a block is free its first two payload words are reused as the
//! `next` and `prev` links of its bucket ring. This module is the only
//! place that reads or writes raw words in the arena; everything else goes
//! through these accessors.
//!
//! All functions index the arena slice directly, so an offset outside the
//! arena panics. That only happens on a bug in the allocator itself.

use segheap_core::layout::{ALLOCATED_BIT, DWORD, WORD};

/// Mask selecting the size bits of a header/footer word.
const SIZE_MASK: u64 = !(DWORD as u64 - 1);

/// Pack a block size and allocated flag into one word.
#[inline]
pub fn pack(size: usize, allocated: bool) -> u64 {
    debug_assert_eq!(size % DWORD, 0, "block size {size} is not DWORD-aligned");
    size as u64 | if allocated { ALLOCATED_BIT } else { 0 }
}

/// Size field of a packed word.
#[inline]
pub fn unpack_size(word: u64) -> usize {
    (word & SIZE_MASK) as usize
}

/// Allocated flag of a packed word.
#[inline]
pub fn unpack_allocated(word: u64) -> bool {
    word & ALLOCATED_BIT != 0
}

/// Read the word at byte offset `at`.
#[inline]
pub fn get(mem: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; WORD];
    buf.copy_from_slice(&mem[at..at + WORD]);
    u64::from_le_bytes(buf)
}

/// Read the word at `at`, or `None` if it lies outside `mem`.
#[inline]
pub fn try_get(mem: &[u8], at: usize) -> Option<u64> {
    let end = at.checked_add(WORD)?;
    let bytes = mem.get(at..end)?;
    let mut buf = [0u8; WORD];
    buf.copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// Write `word` at byte offset `at`.
#[inline]
pub fn put(mem: &mut [u8], at: usize, word: u64) {
    mem[at..at + WORD].copy_from_slice(&word.to_le_bytes());
}

/// Size stored in the header or footer word at `at`.
#[inline]
pub fn read_size(mem: &[u8], at: usize) -> usize {
    unpack_size(get(mem, at))
}

/// Allocated flag stored in the header or footer word at `at`.
#[inline]
pub fn read_allocated(mem: &[u8], at: usize) -> bool {
    unpack_allocated(get(mem, at))
}

/// Offset of the header word of block `bp`.
#[inline]
pub fn header_of(bp: usize) -> usize {
    bp - WORD
}

/// Offset of the footer word of block `bp`. The header size must be set.
#[inline]
pub fn footer_of(mem: &[u8], bp: usize) -> usize {
    bp + block_size(mem, bp) - DWORD
}

/// Size of block `bp`, from its header.
#[inline]
pub fn block_size(mem: &[u8], bp: usize) -> usize {
    read_size(mem, header_of(bp))
}

/// Whether block `bp` is allocated, from its header.
#[inline]
pub fn is_allocated(mem: &[u8], bp: usize) -> bool {
    read_allocated(mem, header_of(bp))
}

/// Payload offset of the block after `bp`, via the current header.
#[inline]
pub fn next_block(mem: &[u8], bp: usize) -> usize {
    bp + block_size(mem, bp)
}

/// Payload offset of the block before `bp`, via the previous footer.
#[inline]
pub fn prev_block(mem: &[u8], bp: usize) -> usize {
    bp - read_size(mem, bp - DWORD)
}

/// Write matching header and footer for block `bp`.
///
/// The header goes first; the footer position is derived from `size`, not
/// from whatever the header held before.
#[inline]
pub fn write_block(mem: &mut [u8], bp: usize, size: usize, allocated: bool) {
    let word = pack(size, allocated);
    put(mem, header_of(bp), word);
    put(mem, bp + size - DWORD, word);
}

/// `next` link of free block `bp`.
#[inline]
pub fn next_link(mem: &[u8], bp: usize) -> usize {
    get(mem, bp) as usize
}

/// `prev` link of free block `bp`.
#[inline]
pub fn prev_link(mem: &[u8], bp: usize) -> usize {
    get(mem, bp + WORD) as usize
}

/// Set the `next` link of free block `bp`.
#[inline]
pub fn set_next_link(mem: &mut [u8], bp: usize, next: usize) {
    put(mem, bp, next as u64);
}

/// Set the `prev` link of free block `bp`.
#[inline]
pub fn set_prev_link(mem: &mut [u8], bp: usize, prev: usize) {
    put(mem, bp + WORD, prev as u64);
}
