//! Arena configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Smallest pool an arena creates when none of its pools can serve a request.
pub const DEFAULT_MIN_POOL_SIZE: usize = 128;

/// Arena configuration builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArenaConfig {
    /// Lower bound for the size of every new pool
    pub min_pool_size: usize,
}

impl ArenaConfig {
    /// Creates config with default values
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_pool_size: DEFAULT_MIN_POOL_SIZE,
        }
    }

    /// Small objects configuration - page-sized pools for many tiny allocations
    #[must_use]
    pub const fn small_objects() -> Self {
        Self {
            min_pool_size: 4 * 1024,
        }
    }

    /// Large objects configuration - fewer, bigger pools
    #[must_use]
    pub const fn large_objects() -> Self {
        Self {
            min_pool_size: 256 * 1024,
        }
    }

    #[must_use]
    pub const fn with_min_pool_size(mut self, min_pool_size: usize) -> Self {
        self.min_pool_size = min_pool_size;
        self
    }

    /// Checks the configuration for values the arena cannot work with.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`] when `min_pool_size` is zero.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.min_pool_size == 0 {
            return Err(MemoryError::invalid_config("min_pool_size must be non-zero"));
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What [`ArenaAllocator::reset`](super::ArenaAllocator::reset) does with
/// existing pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResetMode {
    /// Rewind every pool and keep its memory for reuse.
    #[default]
    RetainCapacity,
    /// Return every pool to the backing allocator.
    DeallocAll,
}
