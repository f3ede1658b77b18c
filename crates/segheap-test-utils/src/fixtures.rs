//! Ready-made heaps and test logging.

use segheap_alloc::{HeapConfig, SegHeap};
use segheap_arena::{ArenaConfig, VecArena};

/// A heap over a default-sized arena with per-operation verification on.
pub fn small_heap() -> SegHeap<VecArena> {
    heap_with_limit(ArenaConfig::DEFAULT_MAX_BYTES)
}

/// A verifying heap whose arena refuses to grow past `max_bytes`.
///
/// # Panics
///
/// Panics if `max_bytes` cannot even hold the sentinels.
pub fn heap_with_limit(max_bytes: usize) -> SegHeap<VecArena> {
    match SegHeap::new(VecArena::with_limit(max_bytes), HeapConfig::checked()) {
        Ok(heap) => heap,
        Err(err) => panic!("cannot initialise a {max_bytes}-byte heap: {err}"),
    }
}

/// Route `tracing` output to the test harness.
///
/// Filter with `RUST_LOG`, e.g. `RUST_LOG=segheap_alloc=trace`. Safe to
/// call from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
