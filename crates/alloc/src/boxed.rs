//! Owning pointer for values placed through an allocator handle

use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

#[cfg(feature = "logging")]
use tracing::trace;

use crate::allocator::Allocator;
use crate::error::{AllocError, AllocResult};

/// RAII smart pointer for values allocated through an [`Allocator`]
///
/// Drops the value and frees its memory through the same handle. Strategies
/// that cannot free single blocks (arenas, non-last bump blocks) simply keep
/// the memory until they are reset.
pub struct AllocBox<'a, T: ?Sized> {
    ptr: NonNull<T>,
    allocator: Allocator<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T> AllocBox<'a, T> {
    /// Allocates room for `value` through `allocator` and moves it in.
    ///
    /// # Errors
    ///
    /// Whatever the allocator reports for the allocation.
    #[track_caller]
    pub fn new_in(value: T, allocator: Allocator<'a>) -> AllocResult<Self> {
        let layout = Layout::new::<T>();
        let ptr = allocator.alloc(layout.size(), layout.align())?.cast::<T>();

        // SAFETY: The block is at least size_of::<T>() bytes, aligned for T,
        // and exclusively ours.
        unsafe { ptr.write(value) };

        Ok(Self {
            ptr,
            allocator,
            _marker: PhantomData,
        })
    }
}

impl<'a, T: Clone> AllocBox<'a, [T]> {
    /// Allocates a slice of `count` clones of `value`.
    ///
    /// # Errors
    ///
    /// [`AllocError::OutOfMemory`] if the slice size overflows, otherwise
    /// whatever the allocator reports.
    #[track_caller]
    pub fn from_elem_in(value: T, count: usize, allocator: Allocator<'a>) -> AllocResult<Self> {
        let layout = Layout::array::<T>(count).map_err(|_| AllocError::OutOfMemory)?;
        let base = allocator.alloc(layout.size(), layout.align())?.cast::<T>();

        if count > 0 {
            // SAFETY: The block holds `count` properly aligned slots of T.
            unsafe {
                for index in 0..count - 1 {
                    base.add(index).write(value.clone());
                }
                base.add(count - 1).write(value);
            }
        }

        Ok(Self {
            ptr: NonNull::slice_from_raw_parts(base, count),
            allocator,
            _marker: PhantomData,
        })
    }
}

impl<'a, T: ?Sized> AllocBox<'a, T> {
    /// The handle the value was allocated through.
    #[inline]
    #[must_use]
    pub fn allocator(this: &Self) -> Allocator<'a> {
        this.allocator
    }

    /// Gives up ownership without dropping the value or freeing memory.
    #[must_use = "losing the pointer leaks the value"]
    pub fn into_raw(this: Self) -> (NonNull<T>, Allocator<'a>) {
        let this = ManuallyDrop::new(this);
        (this.ptr, this.allocator)
    }

    /// Takes ownership of a value previously released by
    /// [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialized value allocated through
    /// `allocator`, and nothing else may own it.
    #[must_use]
    pub unsafe fn from_raw_in(ptr: NonNull<T>, allocator: Allocator<'a>) -> Self {
        Self {
            ptr,
            allocator,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Deref for AllocBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: ptr is initialized and owned by this box.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: ?Sized> DerefMut for AllocBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: ptr is initialized and `&mut self` makes the access unique.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for AllocBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for AllocBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized> Drop for AllocBox<'_, T> {
    fn drop(&mut self) {
        let size = mem::size_of_val::<T>(&**self);

        // SAFETY: Value is initialized and dropped exactly once here.
        unsafe { ptr::drop_in_place(self.ptr.as_ptr()) };

        let block = NonNull::slice_from_raw_parts(self.ptr.cast::<u8>(), size);
        // SAFETY: The block came from `self.allocator` with this length and
        // the value is gone.
        if let Err(_err) = unsafe { self.allocator.free_block(block) } {
            #[cfg(feature = "logging")]
            trace!(error = %_err, size, "allocator kept the block of a dropped AllocBox");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::allocator::{BumpAllocator, RawAllocator, TrackingAllocator, heap_allocator};
    use crate::arena::ArenaAllocator;

    #[test]
    fn test_make_and_drop_frees() {
        let tracker = TrackingAllocator::new(heap_allocator());
        let handle = tracker.as_allocator();
        {
            let mut value = handle.make(41_u64).unwrap();
            *value += 1;
            assert_eq!(*value, 42);
            assert_eq!(tracker.live_allocations(), 1);
        }
        assert!(tracker.report().is_ok());
    }

    #[test]
    fn test_make_slice() {
        let mut storage = [0u8; 256];
        let bump = BumpAllocator::new(&mut storage);
        let handle = bump.as_allocator();

        let slice = handle.make_slice(5, 7_u8).unwrap();
        assert_eq!(&*slice, &[7, 7, 7, 7, 7]);
        assert_eq!(bump.offset(), 5);

        drop(slice);
        assert_eq!(bump.offset(), 0);
    }

    #[test]
    fn test_contents_are_dropped() {
        let marker = Rc::new(());
        let arena = ArenaAllocator::new(heap_allocator());
        let handle = arena.as_allocator();

        let slice = handle.make_slice(3, Rc::clone(&marker)).unwrap();
        assert_eq!(Rc::strong_count(&marker), 4);

        drop(slice);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_zero_sized_and_empty() {
        let tracker = TrackingAllocator::new(heap_allocator());
        let handle = tracker.as_allocator();

        let unit = handle.make(()).unwrap();
        let empty = handle.make_slice(0, 1_u8).unwrap();
        assert!(empty.is_empty());
        assert_eq!(tracker.live_allocations(), 0);

        drop(unit);
        drop(empty);
    }

    #[test]
    fn test_overflowing_slice() {
        let handle = heap_allocator();
        let result = handle.make_slice(usize::MAX, 0_u64);
        assert_eq!(result.err(), Some(AllocError::OutOfMemory));
    }

    #[test]
    fn test_raw_roundtrip() {
        let tracker = TrackingAllocator::new(heap_allocator());
        let boxed = tracker.as_allocator().make(String::from("nebula")).unwrap();

        let (ptr, allocator) = AllocBox::into_raw(boxed);
        assert_eq!(tracker.live_allocations(), 1);

        let boxed = unsafe { AllocBox::from_raw_in(ptr, allocator) };
        assert_eq!(boxed.as_str(), "nebula");
        drop(boxed);
        assert!(!tracker.has_leaks());
    }
}
