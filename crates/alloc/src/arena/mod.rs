//! Arena allocator
//!
//! An arena is a growable chain of bump pools. Each pool is a region acquired
//! from a backing allocator; requests are served first-fit in pool creation
//! order, and a new pool is added whenever none of the existing ones has room.
//!
//! Individual blocks cannot be freed. Memory comes back all at once through
//! [`ArenaAllocator::reset`], or when the arena is dropped.
//!
//! # Examples
//!
//! ```rust
//! use nebula_alloc::allocator::{RawAllocator, heap_allocator};
//! use nebula_alloc::arena::ArenaAllocator;
//!
//! let arena = ArenaAllocator::new(heap_allocator());
//! let handle = arena.as_allocator();
//!
//! let big = handle.alloc(200, 8).unwrap();
//! let small = handle.alloc(50, 8).unwrap();
//! assert_eq!(big.len(), 200);
//! assert_eq!(small.len(), 50);
//! assert_eq!(arena.pool_count(), 2);
//! ```

mod config;

use core::cell::RefCell;
use core::fmt;
use core::mem;
use core::panic::Location;
use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::{debug, warn};

pub use self::config::{ArenaConfig, DEFAULT_MIN_POOL_SIZE, ResetMode};
use crate::allocator::{Allocator, Block, BumpAllocator, CallSite, MemoryUsage, Operation, RawAllocator};
use crate::error::{AllocError, AllocResult, MemoryResult};
use crate::utils::{assert_valid_alignment, checked_align_up, empty_block};

/// Usage of a single arena pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
    /// Size of the pool's region in bytes.
    pub capacity: usize,
    /// Bytes handed out, padding included.
    pub used: usize,
}

/// Allocator that serves requests from a chain of bump pools.
pub struct ArenaAllocator<'b> {
    backing: Allocator<'b>,
    config: ArenaConfig,
    pools: RefCell<Vec<BumpAllocator<'b>>>,
}

impl<'b> ArenaAllocator<'b> {
    /// Creates an empty arena with the default configuration.
    ///
    /// No memory is acquired until the first allocation.
    #[must_use]
    pub fn new(backing: Allocator<'b>) -> Self {
        Self {
            backing,
            config: ArenaConfig::default(),
            pools: RefCell::new(Vec::new()),
        }
    }

    /// Creates an empty arena with a custom configuration.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidConfig`](crate::error::MemoryError::InvalidConfig)
    /// if the configuration does not validate.
    pub fn with_config(backing: Allocator<'b>, config: ArenaConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self {
            backing,
            config,
            pools: RefCell::new(Vec::new()),
        })
    }

    #[inline]
    #[must_use]
    pub fn backing(&self) -> Allocator<'b> {
        self.backing
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.borrow().len()
    }

    /// Per-pool usage in creation order.
    #[must_use]
    pub fn pools(&self) -> Vec<PoolInfo> {
        self.pools
            .borrow()
            .iter()
            .map(|pool| PoolInfo {
                capacity: pool.capacity(),
                used: pool.offset(),
            })
            .collect()
    }

    /// `true` when `ptr` lies inside one of the pools.
    #[must_use]
    pub fn owns_ptr(&self, ptr: NonNull<u8>) -> bool {
        self.pools.borrow().iter().any(|pool| pool.owns_ptr(ptr))
    }

    /// Allocates `size` zeroed bytes aligned to `align`, adding a pool if
    /// needed.
    ///
    /// # Errors
    ///
    /// Whatever the backing allocator reports when a new pool cannot be
    /// acquired.
    #[track_caller]
    pub fn alloc(&self, size: usize, align: usize) -> AllocResult<Block> {
        self.alloc_at(size, align, Location::caller())
    }

    /// Resizes a block in place inside its pool.
    ///
    /// # Errors
    ///
    /// - [`AllocError::NotOwnedPointer`] when no pool contains `ptr`
    /// - the owning pool's error otherwise (`CannotResize`, `OutOfMemory`)
    ///
    /// # Safety
    ///
    /// After a shrink the caller must not access bytes past `new_size`.
    pub unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> AllocResult<Block> {
        let pools = self.pools.borrow();
        let pool = pools
            .iter()
            .find(|pool| pool.owns_ptr(ptr))
            .ok_or(AllocError::NotOwnedPointer)?;
        // SAFETY: Forwarded from our caller's contract.
        unsafe { pool.resize(ptr, new_size) }
    }

    /// Arenas do not free individual blocks.
    ///
    /// # Errors
    ///
    /// Always [`AllocError::UnsupportedOperation`].
    pub fn free(&self, _ptr: NonNull<u8>) -> AllocResult<()> {
        Err(AllocError::UnsupportedOperation)
    }

    /// Discards every allocation.
    pub fn reset(&mut self, mode: ResetMode) {
        match mode {
            ResetMode::RetainCapacity => self.rewind_pools(),
            ResetMode::DeallocAll => self.release_pools(),
        }
    }

    #[track_caller]
    fn alloc_at(&self, size: usize, align: usize, location: CallSite) -> AllocResult<Block> {
        assert_valid_alignment(align);
        if size == 0 {
            return Ok(empty_block(align));
        }

        if let Some(block) = self
            .pools
            .borrow()
            .iter()
            .find_map(|pool| pool.alloc(size, align).ok())
        {
            return Ok(block);
        }

        let pool_size = checked_align_up(size, align)
            .zip(checked_align_up(self.config.min_pool_size, align))
            .map(|(request, minimum)| request.max(minimum))
            .ok_or(AllocError::OutOfMemory)?;

        // SAFETY: `Alloc` places no requirements on the caller.
        let region = unsafe {
            self.backing.procedure(
                Operation::Alloc {
                    size: pool_size,
                    align,
                },
                location,
            )
        }?;

        // SAFETY: The region was just handed out by the backing allocator, is
        // exclusively ours, and is only returned in `release_pools`.
        let pool = unsafe { BumpAllocator::from_raw_parts(region.cast(), region.len()) };
        let block = pool.alloc(size, align);

        let mut pools = self.pools.borrow_mut();
        pools.push(pool);

        #[cfg(feature = "logging")]
        debug!(
            pool_size = region.len(),
            pool_count = pools.len(),
            %location,
            "arena pool created"
        );

        block
    }

    fn rewind_pools(&self) {
        for pool in self.pools.borrow().iter() {
            pool.rewind();
        }
    }

    fn release_pools(&self) {
        let pools = mem::take(&mut *self.pools.borrow_mut());
        if pools.is_empty() {
            return;
        }

        #[cfg(feature = "logging")]
        debug!(pool_count = pools.len(), "releasing arena pools");

        for pool in pools {
            // SAFETY: The base is the start of a region obtained from the
            // backing allocator; the pool is gone so nothing refers to it.
            if let Err(_err) = unsafe { self.backing.free(pool.base()) } {
                #[cfg(feature = "logging")]
                warn!(
                    error = %_err,
                    capacity = pool.capacity(),
                    "failed to return arena pool to backing allocator"
                );
            }
        }
    }
}

impl Drop for ArenaAllocator<'_> {
    fn drop(&mut self) {
        self.release_pools();
    }
}

impl fmt::Debug for ArenaAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("config", &self.config)
            .field("pools", &self.pools())
            .finish_non_exhaustive()
    }
}

unsafe impl RawAllocator for ArenaAllocator<'_> {
    unsafe fn procedure(&self, operation: Operation, location: CallSite) -> AllocResult<Block> {
        match operation {
            Operation::Alloc { size, align } => self.alloc_at(size, align, location),
            // SAFETY: pointer contract forwarded from the handle caller.
            Operation::Resize { ptr, new_size, .. } => unsafe { self.resize(ptr, new_size) },
            Operation::Free { ptr } => self.free(ptr).map(|()| empty_block(1)),
            Operation::FreeAll => {
                self.rewind_pools();
                Ok(empty_block(1))
            }
        }
    }
}

impl MemoryUsage for ArenaAllocator<'_> {
    fn used_memory(&self) -> usize {
        self.pools.borrow().iter().map(BumpAllocator::offset).sum()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(
            self.pools
                .borrow()
                .iter()
                .map(BumpAllocator::available_space)
                .sum(),
        )
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.pools.borrow().iter().map(BumpAllocator::capacity).sum())
    }
}
