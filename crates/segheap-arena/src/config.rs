//! Arena configuration parameters.

/// Configuration for a [`VecArena`](crate::VecArena).
///
/// Controls the growth ceiling and how much backing storage is reserved
/// up front. All values are immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Maximum arena size in bytes. Growth past this is refused.
    ///
    /// Default: 20 MiB.
    pub max_bytes: usize,

    /// Bytes of backing storage reserved at construction.
    ///
    /// Reservation only avoids early reallocations of the `Vec`; it does
    /// not count against `max_bytes` and is clamped to it.
    pub initial_capacity: usize,
}

impl ArenaConfig {
    /// Default ceiling: 20 MiB.
    pub const DEFAULT_MAX_BYTES: usize = 20 * (1 << 20);

    /// Default up-front reservation: 64 KiB.
    pub const DEFAULT_INITIAL_CAPACITY: usize = 64 * 1024;

    /// Create a config with the given ceiling and the default reservation.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            initial_capacity: Self::DEFAULT_INITIAL_CAPACITY.min(max_bytes),
        }
    }

    /// Override the up-front reservation.
    pub fn with_initial_capacity(mut self, bytes: usize) -> Self {
        self.initial_capacity = bytes.min(self.max_bytes);
        self
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ceiling_is_20mib() {
        let config = ArenaConfig::default();
        assert_eq!(config.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.initial_capacity, 64 * 1024);
    }

    #[test]
    fn reservation_clamped_to_ceiling() {
        let config = ArenaConfig::new(1024);
        assert_eq!(config.initial_capacity, 1024);
        let config = config.with_initial_capacity(1 << 20);
        assert_eq!(config.initial_capacity, 1024);
    }
}
