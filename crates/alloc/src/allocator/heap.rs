//! Heap adapter over the system allocator
//!
//! Every block carries a small header in front of it recording the layout it
//! was allocated with, so `free` needs nothing but the pointer. In-place
//! resize and bulk release are not offered.

use core::alloc::{GlobalAlloc, Layout};
use core::mem;
use core::ptr::NonNull;
use std::alloc::System;

use super::{Allocator, Block, CallSite, Operation, RawAllocator};
use crate::error::{AllocError, AllocResult};
use crate::utils::{align_up, assert_valid_alignment, checked_align_up, empty_block};

/// Layout of the underlying system allocation, stored right before the block.
#[repr(C)]
#[derive(Clone, Copy)]
struct Header {
    size: usize,
    align: usize,
}

const HEADER_SIZE: usize = mem::size_of::<Header>();
const HEADER_ALIGN: usize = mem::align_of::<Header>();

/// Distance from the start of the system allocation to the user block.
#[inline]
const fn block_offset(align: usize) -> usize {
    align_up(HEADER_SIZE, align)
}

/// Allocator backed by the process heap.
///
/// Stateless; every instance behaves the same. Use [`heap_allocator`] to get a
/// `'static` handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

static HEAP: HeapAllocator = HeapAllocator;

/// Handle to the process heap.
#[inline]
#[must_use]
pub fn heap_allocator() -> Allocator<'static> {
    HEAP.as_allocator()
}

impl HeapAllocator {
    /// Creates a new heap adapter.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Allocates `size` zeroed bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] when the system refuses the request or the
    /// padded size overflows.
    #[track_caller]
    pub fn alloc(&self, size: usize, align: usize) -> AllocResult<Block> {
        assert_valid_alignment(align);
        if size == 0 {
            return Ok(empty_block(align));
        }

        let align = align.max(HEADER_ALIGN);
        let offset = checked_align_up(HEADER_SIZE, align).ok_or(AllocError::OutOfMemory)?;
        let total = offset.checked_add(size).ok_or(AllocError::OutOfMemory)?;
        let layout = Layout::from_size_align(total, align).map_err(|_| AllocError::OutOfMemory)?;

        // SAFETY: layout has a non-zero size.
        let raw = NonNull::new(unsafe { System.alloc_zeroed(layout) }).ok_or(AllocError::OutOfMemory)?;

        // SAFETY: Writing the header and computing the user block.
        // - offset < total, so `user` stays inside the allocation
        // - offset >= HEADER_SIZE and both are multiples of HEADER_ALIGN, so
        //   the header slot is in bounds and aligned
        let user = unsafe {
            let user = raw.add(offset);
            user.sub(HEADER_SIZE)
                .cast::<Header>()
                .write(Header { size: total, align });
            user
        };

        Ok(NonNull::slice_from_raw_parts(user, size))
    }

    /// Returns a block to the system allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must be a non-empty block returned by [`HeapAllocator::alloc`]
    /// that has not been freed yet. Empty blocks carry no header; release
    /// them through [`Allocator::free_block`] or not at all.
    pub unsafe fn free(&self, ptr: NonNull<u8>) {
        // SAFETY: Caller guarantees `ptr` came from `alloc`, so a valid header
        // precedes it and the recorded layout is the one used to allocate.
        unsafe {
            let header = ptr.sub(HEADER_SIZE).cast::<Header>().read();
            let raw = ptr.sub(block_offset(header.align));
            let layout = Layout::from_size_align_unchecked(header.size, header.align);
            System.dealloc(raw.as_ptr(), layout);
        }
    }
}

unsafe impl RawAllocator for HeapAllocator {
    unsafe fn procedure(&self, operation: Operation, _location: CallSite) -> AllocResult<Block> {
        match operation {
            Operation::Alloc { size, align } => self.alloc(size, align),
            Operation::Free { ptr } => {
                // SAFETY: pointer contract forwarded from the handle caller.
                unsafe { self.free(ptr) };
                Ok(empty_block(1))
            }
            Operation::Resize { .. } | Operation::FreeAll => Err(AllocError::UnsupportedOperation),
        }
    }
}
