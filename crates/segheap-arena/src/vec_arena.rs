//! `Vec<u8>`-backed implementation of [`Arena`].

use segheap_core::{Arena, ArenaError};

use crate::config::ArenaConfig;

/// A monotonic byte arena over a single `Vec<u8>`.
///
/// The arena starts empty. Each [`extend`](Arena::extend) appends zeroed
/// bytes at the top; nothing is ever removed except by
/// [`reset`](Arena::reset), which truncates to zero but keeps the backing
/// allocation for reuse.
pub struct VecArena {
    /// Backing storage. `data.len()` is the current top.
    data: Vec<u8>,
    config: ArenaConfig,
    /// Largest top ever reached, for reporting.
    high_water: usize,
}

impl VecArena {
    /// Create an empty arena with the given configuration.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            data: Vec::with_capacity(config.initial_capacity),
            config,
            high_water: 0,
        }
    }

    /// Create an empty arena that refuses to grow past `max_bytes`.
    pub fn with_limit(max_bytes: usize) -> Self {
        Self::new(ArenaConfig::new(max_bytes))
    }

    /// The configuration this arena was built with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Bytes still available before the ceiling.
    pub fn remaining(&self) -> usize {
        self.config.max_bytes - self.data.len()
    }

    /// Largest size the arena has reached since construction.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Memory held by the backing storage in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.data.capacity()
    }
}

impl Default for VecArena {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl Arena for VecArena {
    fn extend(&mut self, additional: usize) -> Result<usize, ArenaError> {
        let old_top = self.data.len();
        let new_top = old_top
            .checked_add(additional)
            .filter(|&top| top <= self.config.max_bytes)
            .ok_or_else(|| {
                tracing::debug!(
                    requested = additional,
                    used = old_top,
                    capacity = self.config.max_bytes,
                    "arena refused to grow"
                );
                ArenaError::CapacityExceeded {
                    requested: additional,
                    used: old_top,
                    capacity: self.config.max_bytes,
                }
            })?;
        self.data.resize(new_top, 0);
        self.high_water = self.high_water.max(new_top);
        tracing::trace!(from = old_top, to = new_top, "arena grew");
        Ok(old_top)
    }

    fn base(&self) -> usize {
        0
    }

    fn top(&self) -> usize {
        self.data.len()
    }

    fn reset(&mut self) {
        self.data.clear();
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
