//! Seeded random allocation workloads.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One step of a workload.
///
/// Frees and reallocs name their victim by position among the live
/// allocations at replay time, taken modulo the live count. A trace stays
/// replayable even when some allocations fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Allocate `size` bytes.
    Alloc { size: usize },
    /// Free the live allocation at `index`.
    Free { index: usize },
    /// Resize the live allocation at `index` to `size` bytes.
    Realloc { index: usize, size: usize },
}

/// Generator for deterministic random workloads.
///
/// Same seed and parameters, same trace.
#[derive(Clone, Debug)]
pub struct Workload {
    seed: u64,
    min_size: usize,
    max_size: usize,
    free_ratio: f64,
    realloc_ratio: f64,
    max_live: usize,
}

impl Workload {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            min_size: 1,
            max_size: 4096,
            free_ratio: 0.35,
            realloc_ratio: 0.15,
            max_live: 256,
        }
    }

    /// Request sizes are drawn uniformly from `min..=max`.
    pub fn sizes(mut self, min: usize, max: usize) -> Self {
        assert!(min >= 1 && min <= max, "invalid size range {min}..={max}");
        self.min_size = min;
        self.max_size = max;
        self
    }

    /// Probability that a step frees, given at least one live allocation.
    pub fn free_ratio(mut self, ratio: f64) -> Self {
        self.free_ratio = ratio;
        self
    }

    /// Probability that a step reallocs, given at least one live allocation.
    pub fn realloc_ratio(mut self, ratio: f64) -> Self {
        self.realloc_ratio = ratio;
        self
    }

    /// Once this many allocations are live, every step frees.
    pub fn max_live(mut self, max_live: usize) -> Self {
        self.max_live = max_live.max(1);
        self
    }

    /// Generate `steps` operations.
    pub fn generate(&self, steps: usize) -> Vec<Op> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut live = 0usize;
        let mut ops = Vec::with_capacity(steps);
        for _ in 0..steps {
            let op = if live >= self.max_live {
                Op::Free {
                    index: rng.random_range(0..live),
                }
            } else if live == 0 {
                Op::Alloc {
                    size: rng.random_range(self.min_size..=self.max_size),
                }
            } else {
                let roll: f64 = rng.random();
                if roll < self.free_ratio {
                    Op::Free {
                        index: rng.random_range(0..live),
                    }
                } else if roll < self.free_ratio + self.realloc_ratio {
                    Op::Realloc {
                        index: rng.random_range(0..live),
                        size: rng.random_range(self.min_size..=self.max_size),
                    }
                } else {
                    Op::Alloc {
                        size: rng.random_range(self.min_size..=self.max_size),
                    }
                }
            };
            match op {
                Op::Alloc { .. } => live += 1,
                Op::Free { .. } => live -= 1,
                Op::Realloc { .. } => {}
            }
            ops.push(op);
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_trace() {
        let a = Workload::new(7).generate(500);
        let b = Workload::new(7).generate(500);
        assert_eq!(a, b);
        assert_ne!(a, Workload::new(8).generate(500));
    }

    #[test]
    fn never_frees_from_an_empty_set() {
        let ops = Workload::new(1).free_ratio(0.9).generate(1000);
        let mut live = 0usize;
        for op in ops {
            match op {
                Op::Alloc { .. } => live += 1,
                Op::Free { index } => {
                    assert!(index < live);
                    live -= 1;
                }
                Op::Realloc { index, .. } => assert!(index < live),
            }
        }
    }

    #[test]
    fn live_count_is_capped() {
        let ops = Workload::new(3).free_ratio(0.0).realloc_ratio(0.0).max_live(4).generate(100);
        let mut live = 0usize;
        for op in ops {
            match op {
                Op::Alloc { .. } => live += 1,
                Op::Free { .. } => live -= 1,
                Op::Realloc { .. } => {}
            }
            assert!(live <= 4);
        }
    }

    #[test]
    fn sizes_stay_in_range() {
        let ops = Workload::new(11).sizes(10, 20).generate(300);
        for op in ops {
            if let Op::Alloc { size } | Op::Realloc { size, .. } = op {
                assert!((10..=20).contains(&size));
            }
        }
    }
}
