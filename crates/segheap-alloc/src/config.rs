//! Allocator tuning parameters.

use segheap_core::layout::SMALL_REQUEST_LIMIT;

/// Configuration for a [`SegHeap`](crate::SegHeap).
///
/// By default small requests are rounded to a power of two and no
/// per-operation verification runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Round requests below `small_request_limit` up to a power of two.
    ///
    /// Costs some internal fragmentation now in exchange for freed blocks
    /// that are more likely to satisfy later, slightly larger requests.
    pub round_small_requests: bool,

    /// Threshold for power-of-two rounding, in payload bytes.
    ///
    /// Default: 512.
    pub small_request_limit: usize,

    /// Run the heap validator after every mutating call and log any
    /// corruption at error level. Debug aid; walks the whole heap.
    pub verify_each_op: bool,
}

impl HeapConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self {
            round_small_requests: true,
            small_request_limit: SMALL_REQUEST_LIMIT,
            verify_each_op: false,
        }
    }

    /// Default configuration with per-operation verification switched on.
    pub fn checked() -> Self {
        Self {
            verify_each_op: true,
            ..Self::new()
        }
    }

    /// Disable power-of-two rounding of small requests.
    pub fn exact_sizes(mut self) -> Self {
        self.round_small_requests = false;
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new()
    }
}
