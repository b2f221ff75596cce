//! Leak-tracking allocator
//!
//! Wraps another allocator handle and records every live allocation together
//! with the call site that requested it. [`TrackingAllocator::report`] lists
//! whatever is still outstanding.
//!
//! # Safety
//!
//! Memory operations are forwarded to the backing handle unchanged; the
//! tracker adds bookkeeping only and never touches the blocks themselves.
//!
//! ## Invariants
//!
//! - One ledger entry per live block, keyed by address
//! - A recorded address is removed exactly once, on the first free the
//!   backing allocator reports as done (or as not applicable)
//! - Unknown addresses are forwarded but never touch the ledger

use core::cell::RefCell;
use core::fmt;
use core::panic::Location;
use core::ptr::NonNull;

use indexmap::IndexMap;
#[cfg(feature = "logging")]
use tracing::{debug, info, trace, warn};

use super::{Allocator, Block, CallSite, MemoryUsage, Operation, RawAllocator};
use crate::error::{AllocError, AllocResult};
use crate::utils::{assert_valid_alignment, empty_block};

#[derive(Debug, Clone, Copy)]
struct LedgerEntry {
    size: usize,
    location: CallSite,
}

/// A block that was still live when the ledger was inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeakedAllocation {
    /// Address of the block.
    pub address: usize,
    /// Size recorded for the block, updated by resizes.
    pub size: usize,
    /// Where the block was requested.
    pub location: CallSite,
}

impl fmt::Display for LeakedAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#x} ({} bytes) allocated at {}",
            self.address, self.size, self.location
        )
    }
}

/// Outstanding allocations found by [`TrackingAllocator::report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakReport {
    /// Where the tracker was created.
    pub created_at: CallSite,
    /// Outstanding blocks in allocation order.
    pub leaks: Vec<LeakedAllocation>,
}

impl LeakReport {
    #[must_use]
    pub fn leaked_bytes(&self) -> usize {
        self.leaks.iter().map(|leak| leak.size).sum()
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Leaked allocations: {} ({} bytes), tracker created at {}",
            self.leaks.len(),
            self.leaked_bytes(),
            self.created_at
        )?;
        for leak in &self.leaks {
            write!(f, "\n  {leak}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LeakReport {}

/// Decorator that records every live allocation of its backing allocator.
pub struct TrackingAllocator<'b> {
    backing: Allocator<'b>,
    ledger: RefCell<IndexMap<NonNull<u8>, LedgerEntry>>,
    created_at: CallSite,
}

impl<'b> TrackingAllocator<'b> {
    /// Creates a tracker over `backing`, remembering the caller's location.
    #[track_caller]
    #[must_use]
    pub fn new(backing: Allocator<'b>) -> Self {
        let created_at = Location::caller();

        #[cfg(feature = "logging")]
        debug!(%created_at, "tracking allocator created");

        Self {
            backing,
            ledger: RefCell::new(IndexMap::new()),
            created_at,
        }
    }

    /// The wrapped handle.
    #[inline]
    #[must_use]
    pub fn backing(&self) -> Allocator<'b> {
        self.backing
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> CallSite {
        self.created_at
    }

    /// Number of blocks believed live.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.ledger.borrow().len()
    }

    /// Sum of the sizes of all blocks believed live.
    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.ledger.borrow().values().map(|entry| entry.size).sum()
    }

    #[must_use]
    pub fn has_leaks(&self) -> bool {
        !self.ledger.borrow().is_empty()
    }

    /// Live blocks in allocation order.
    #[must_use]
    pub fn entries(&self) -> Vec<LeakedAllocation> {
        self.ledger
            .borrow()
            .iter()
            .map(|(ptr, entry)| LeakedAllocation {
                address: ptr.as_ptr().addr(),
                size: entry.size,
                location: entry.location,
            })
            .collect()
    }

    /// Allocates through the backing allocator and records the block.
    #[track_caller]
    pub fn alloc(&self, size: usize, align: usize) -> AllocResult<Block> {
        self.alloc_at(size, align, Location::caller())
    }

    /// Resizes through the backing allocator and updates the recorded size.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::resize`].
    #[track_caller]
    pub unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize, old_size: usize) -> AllocResult<Block> {
        // SAFETY: Forwarded from our caller's contract.
        unsafe { self.resize_at(ptr, new_size, old_size, Location::caller()) }
    }

    /// Frees through the backing allocator and forgets the block.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::free`].
    #[track_caller]
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> AllocResult<()> {
        // SAFETY: Forwarded from our caller's contract.
        unsafe { self.free_at(ptr, Location::caller()) }
    }

    /// Releases everything through the backing allocator and clears the
    /// ledger.
    ///
    /// # Errors
    ///
    /// [`AllocError::UnsupportedOperation`] if the backing allocator fails;
    /// the ledger is left untouched.
    ///
    /// # Safety
    ///
    /// Same contract as [`Allocator::free_all`].
    #[track_caller]
    pub unsafe fn free_all(&self) -> AllocResult<()> {
        // SAFETY: Forwarded from our caller's contract.
        unsafe { self.free_all_at(Location::caller()) }
    }

    #[track_caller]
    fn alloc_at(&self, size: usize, align: usize, location: CallSite) -> AllocResult<Block> {
        assert_valid_alignment(align);
        if size == 0 {
            return Ok(empty_block(align));
        }

        // SAFETY: `Alloc` places no requirements on the caller.
        let block = unsafe { self.backing.procedure(Operation::Alloc { size, align }, location) }?;

        #[cfg(feature = "logging")]
        trace!(?block, size, %location, "ledger insert");

        let _replaced = self
            .ledger
            .borrow_mut()
            .insert(block.cast(), LedgerEntry { size, location });

        // The backing allocator reused a recorded address without a tracked
        // free, e.g. after being reset behind the tracker's back.
        #[cfg(feature = "logging")]
        if let Some(stale) = _replaced {
            warn!(
                ?block,
                stale_size = stale.size,
                stale_location = %stale.location,
                "ledger entry replaced by a new allocation at the same address"
            );
        }

        Ok(block)
    }

    unsafe fn resize_at(
        &self,
        ptr: NonNull<u8>,
        new_size: usize,
        old_size: usize,
        location: CallSite,
    ) -> AllocResult<Block> {
        let operation = Operation::Resize {
            ptr,
            new_size,
            old_size,
        };
        // SAFETY: Forwarded from our caller's contract.
        let block = unsafe { self.backing.procedure(operation, location) }?;

        if let Some(entry) = self.ledger.borrow_mut().get_mut(&ptr) {
            #[cfg(feature = "logging")]
            trace!(address = ?ptr, old_size = entry.size, new_size, "ledger resize");

            entry.size = new_size;
        }
        Ok(block)
    }

    unsafe fn free_at(&self, ptr: NonNull<u8>, location: CallSite) -> AllocResult<()> {
        // SAFETY: Forwarded from our caller's contract.
        let result = unsafe { self.backing.procedure(Operation::Free { ptr }, location) };

        let logically_freed = match &result {
            Ok(_) => true,
            Err(err) => err.is_logical_free(),
        };
        if logically_freed && self.ledger.borrow_mut().shift_remove(&ptr).is_some() {
            #[cfg(feature = "logging")]
            trace!(address = ?ptr, %location, "ledger remove");
        }

        result.map(|_| ())
    }

    unsafe fn free_all_at(&self, location: CallSite) -> AllocResult<()> {
        // SAFETY: Forwarded from our caller's contract.
        match unsafe { self.backing.procedure(Operation::FreeAll, location) } {
            Ok(_) => {
                self.ledger.borrow_mut().clear();
                Ok(())
            }
            Err(_) => Err(AllocError::UnsupportedOperation),
        }
    }

    /// Checks the ledger for outstanding blocks.
    ///
    /// Purely diagnostic: leaked memory is reported, never released.
    ///
    /// # Errors
    ///
    /// A [`LeakReport`] listing every live block when the ledger is not empty.
    pub fn report(&self) -> Result<(), LeakReport> {
        let leaks = self.entries();
        if leaks.is_empty() {
            #[cfg(feature = "logging")]
            info!(created_at = %self.created_at, "no leaked allocations");
            return Ok(());
        }

        #[cfg(feature = "logging")]
        for leak in &leaks {
            warn!(
                address = leak.address,
                size = leak.size,
                location = %leak.location,
                "leaked allocation"
            );
        }

        Err(LeakReport {
            created_at: self.created_at,
            leaks,
        })
    }
}

impl fmt::Debug for TrackingAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingAllocator")
            .field("backing", &self.backing)
            .field("live_allocations", &self.live_allocations())
            .field("created_at", &self.created_at)
            .finish()
    }
}

unsafe impl RawAllocator for TrackingAllocator<'_> {
    unsafe fn procedure(&self, operation: Operation, location: CallSite) -> AllocResult<Block> {
        // SAFETY: pointer contracts forwarded from the handle caller.
        unsafe {
            match operation {
                Operation::Alloc { size, align } => self.alloc_at(size, align, location),
                Operation::Resize {
                    ptr,
                    new_size,
                    old_size,
                } => self.resize_at(ptr, new_size, old_size, location),
                Operation::Free { ptr } => self.free_at(ptr, location).map(|()| empty_block(1)),
                Operation::FreeAll => self.free_all_at(location).map(|()| empty_block(1)),
            }
        }
    }
}

impl MemoryUsage for TrackingAllocator<'_> {
    fn used_memory(&self) -> usize {
        self.live_bytes()
    }
}
