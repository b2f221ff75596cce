//! Traits implemented by allocator strategies
//!
//! # Safety
//!
//! [`RawAllocator`] is an `unsafe` trait: the blocks an implementor returns are
//! trusted by every consumer of the resulting [`Allocator`] handle.

use super::{Allocator, Block, CallSite, Operation};
use crate::error::AllocResult;

/// A concrete allocation strategy that can sit behind an [`Allocator`] handle.
///
/// # Safety
///
/// Implementors must guarantee that for a successful [`Operation::Alloc`]:
/// - the block is at least `size` bytes long and aligned to `align`
/// - every byte of the block is zero
/// - the block does not overlap any other live block from the same strategy
/// - the block stays valid until it is freed, resized away, or the strategy
///   is reset or dropped
///
/// A successful [`Operation::Resize`] must return a block that starts at the
/// same pointer and is at least `new_size` bytes long.
pub unsafe trait RawAllocator {
    /// Performs `operation` on behalf of the code at `location`.
    ///
    /// # Safety
    ///
    /// The caller upholds the pointer requirements documented on
    /// [`Operation`]: `Resize` and `Free` receive live, non-empty blocks from
    /// this strategy, and freed memory is never touched again.
    unsafe fn procedure(&self, operation: Operation, location: CallSite) -> AllocResult<Block>;

    /// Returns a handle that borrows this strategy.
    #[inline]
    fn as_allocator(&self) -> Allocator<'_>
    where
        Self: Sized,
    {
        Allocator::new(self)
    }
}

/// Memory accounting for a strategy.
pub trait MemoryUsage {
    /// Bytes currently handed out (including alignment padding where the
    /// strategy cannot tell the difference).
    fn used_memory(&self) -> usize;

    /// Bytes that can still be served without acquiring more memory.
    ///
    /// `None` when the strategy has no fixed limit.
    fn available_memory(&self) -> Option<usize> {
        None
    }

    /// Total bytes under management, if known.
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| available + self.used_memory())
    }
}
