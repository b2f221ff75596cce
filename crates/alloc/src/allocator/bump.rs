//! Bump (linear) allocator
//!
//! Hands out memory by advancing an offset through a caller-supplied region.
//! Only the most recent allocation can be resized or freed; everything else is
//! reclaimed at once by [`BumpAllocator::reset`].
//!
//! # Safety
//!
//! - The region is borrowed mutably for `'a`, so no one else can touch it
//!   while the allocator lives
//! - All bookkeeping goes through `Cell`, which lets handles drive the
//!   allocator through `&self` and keeps the type `!Sync`
//! - Returned blocks are carved from disjoint ranges of the region

use core::cell::Cell;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use super::{Block, CallSite, MemoryUsage, Operation, RawAllocator};
use crate::error::{AllocError, AllocResult};
use crate::utils::{assert_valid_alignment, checked_align_up, empty_block};

/// The block most recently handed out by a [`BumpAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastAllocation {
    /// Start of the block.
    pub ptr: NonNull<u8>,
    /// Current length of the block in bytes.
    pub size: usize,
}

/// Linear allocator over a borrowed byte region.
pub struct BumpAllocator<'a> {
    region: NonNull<[u8]>,
    offset: Cell<usize>,
    last: Cell<Option<LastAllocation>>,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> BumpAllocator<'a> {
    /// Creates an allocator over `storage`.
    #[must_use]
    pub fn new(storage: &'a mut [u8]) -> Self {
        Self {
            region: NonNull::from(storage),
            offset: Cell::new(0),
            last: Cell::new(None),
            _marker: PhantomData,
        }
    }

    /// Creates an allocator with no storage; every allocation fails until
    /// [`set_storage`](Self::set_storage) is called.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            region: NonNull::slice_from_raw_parts(NonNull::dangling(), 0),
            offset: Cell::new(0),
            last: Cell::new(None),
            _marker: PhantomData,
        }
    }

    /// Creates an allocator over `len` bytes starting at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for reads and writes, and must not be
    /// accessed through any other path, for the whole of `'a`.
    #[must_use]
    pub unsafe fn from_raw_parts(base: NonNull<u8>, len: usize) -> Self {
        Self {
            region: NonNull::slice_from_raw_parts(base, len),
            offset: Cell::new(0),
            last: Cell::new(None),
            _marker: PhantomData,
        }
    }

    /// Replaces the backing region and starts over from offset zero.
    pub fn set_storage(&mut self, storage: &'a mut [u8]) {
        self.region = NonNull::from(storage);
        self.reset();
    }

    /// Size of the region in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Bytes consumed so far, padding included.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    /// Bytes left between the current offset and the end of the region.
    #[inline]
    #[must_use]
    pub fn available_space(&self) -> usize {
        self.capacity() - self.offset()
    }

    /// `true` when nothing has been allocated since the last reset.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offset() == 0
    }

    #[inline]
    #[must_use]
    pub fn last_allocation(&self) -> Option<LastAllocation> {
        self.last.get()
    }

    /// `true` when `ptr` points into the region.
    #[inline]
    #[must_use]
    pub fn owns_ptr(&self, ptr: NonNull<u8>) -> bool {
        let base = self.base().as_ptr().addr();
        let addr = ptr.as_ptr().addr();
        addr >= base && addr - base < self.capacity()
    }

    #[inline]
    pub(crate) fn base(&self) -> NonNull<u8> {
        self.region.cast()
    }

    /// Allocates `size` zeroed bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] when the request does not fit; the offset
    /// is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[track_caller]
    pub fn alloc(&self, size: usize, align: usize) -> AllocResult<Block> {
        let block = self.alloc_uninit(size, align)?;
        // SAFETY: block was just carved out of the region and is exclusive.
        unsafe { ptr::write_bytes(block.cast::<u8>().as_ptr(), 0, block.len()) };
        Ok(block)
    }

    /// Same as [`alloc`](Self::alloc) without zeroing the block.
    ///
    /// The bytes may hold data from earlier allocations.
    #[track_caller]
    pub fn alloc_uninit(&self, size: usize, align: usize) -> AllocResult<Block> {
        assert_valid_alignment(align);
        if size == 0 {
            return Ok(empty_block(align));
        }

        let offset = self.offset.get();
        let current = self.base().as_ptr().addr() + offset;
        let aligned = checked_align_up(current, align).ok_or(AllocError::OutOfMemory)?;
        let start = offset + (aligned - current);
        let end = start.checked_add(size).ok_or(AllocError::OutOfMemory)?;
        if end > self.capacity() {
            return Err(AllocError::OutOfMemory);
        }

        // SAFETY: start + size <= capacity, so the pointer stays in the region.
        let ptr = unsafe { self.base().add(start) };
        self.offset.set(end);
        self.last.set(Some(LastAllocation { ptr, size }));
        Ok(NonNull::slice_from_raw_parts(ptr, size))
    }

    /// Grows or shrinks the most recent allocation in place.
    ///
    /// Grown bytes are zeroed.
    ///
    /// # Errors
    ///
    /// - [`AllocError::CannotResize`] when `ptr` is not the most recent
    ///   allocation
    /// - [`AllocError::OutOfMemory`] when the new size runs past the region
    ///
    /// # Safety
    ///
    /// After a shrink the caller must not access bytes past `new_size`.
    pub unsafe fn resize(&self, ptr: NonNull<u8>, new_size: usize) -> AllocResult<Block> {
        let last = match self.last.get() {
            Some(last) if last.ptr == ptr => last,
            _ => return Err(AllocError::CannotResize),
        };

        let start = ptr.as_ptr().addr() - self.base().as_ptr().addr();
        let end = start.checked_add(new_size).ok_or(AllocError::OutOfMemory)?;
        if end > self.capacity() {
            return Err(AllocError::OutOfMemory);
        }

        if new_size > last.size {
            // SAFETY: [start + last.size, end) lies inside the region and past
            // every other live block.
            unsafe { ptr::write_bytes(ptr.add(last.size).as_ptr(), 0, new_size - last.size) };
        }

        self.offset.set(end);
        self.last.set(Some(LastAllocation {
            ptr,
            size: new_size,
        }));
        Ok(NonNull::slice_from_raw_parts(ptr, new_size))
    }

    /// Releases the most recent allocation, rewinding the offset to its start.
    ///
    /// # Errors
    ///
    /// [`AllocError::CannotFree`] for any other pointer.
    ///
    /// # Safety
    ///
    /// The block must not be used afterwards.
    pub unsafe fn free(&self, ptr: NonNull<u8>) -> AllocResult<()> {
        match self.last.get() {
            Some(last) if last.ptr == ptr => {
                self.offset
                    .set(ptr.as_ptr().addr() - self.base().as_ptr().addr());
                self.last.set(None);
                Ok(())
            }
            _ => Err(AllocError::CannotFree),
        }
    }

    /// Discards every allocation. The bytes are not scrubbed.
    pub fn reset(&mut self) {
        self.rewind();
    }

    /// Shared-reference reset for callers that already guarantee no block is
    /// still in use.
    pub(crate) fn rewind(&self) {
        self.offset.set(0);
        self.last.set(None);
    }
}

impl Default for BumpAllocator<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for BumpAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BumpAllocator")
            .field("base", &self.base())
            .field("capacity", &self.capacity())
            .field("offset", &self.offset())
            .field("last", &self.last.get())
            .finish()
    }
}

unsafe impl RawAllocator for BumpAllocator<'_> {
    unsafe fn procedure(&self, operation: Operation, _location: CallSite) -> AllocResult<Block> {
        match operation {
            Operation::Alloc { size, align } => self.alloc(size, align),
            // SAFETY: pointer contract forwarded from the handle caller.
            Operation::Resize { ptr, new_size, .. } => unsafe { self.resize(ptr, new_size) },
            Operation::Free { ptr } => {
                // SAFETY: pointer contract forwarded from the handle caller.
                unsafe { self.free(ptr) }?;
                Ok(empty_block(1))
            }
            Operation::FreeAll => {
                self.rewind();
                Ok(empty_block(1))
            }
        }
    }
}

impl MemoryUsage for BumpAllocator<'_> {
    fn used_memory(&self) -> usize {
        self.offset()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available_space())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}
