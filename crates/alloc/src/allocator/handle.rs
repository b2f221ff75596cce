//! The allocator handle
//!
//! An [`Allocator`] is a `(context, procedure)` pair: an opaque pointer to a
//! concrete strategy plus a plain function pointer that knows how to drive it.
//! Handles are `Copy` and passed by value; they are the single currency every
//! memory consumer accepts.
//!
//! Dispatch goes through a monomorphised function pointer created in
//! [`Allocator::new`], so a call costs one indirect jump and no vtable lookup.
//!
//! # Safety
//!
//! - The handle never owns the context; `'a` borrows the strategy it came from
//! - Blocks returned by `alloc` stay valid until freed, resized away, or until
//!   the strategy is reset or dropped
//! - `resize`, `free` and `free_all` are `unsafe`: they invalidate memory that
//!   other code may still reference

use core::fmt;
use core::marker::PhantomData;
use core::panic::Location;
use core::ptr::NonNull;

use super::RawAllocator;
use crate::boxed::AllocBox;
use crate::error::AllocResult;
use crate::utils::{assert_valid_alignment, empty_block};

/// A block of memory handed out by an allocator.
pub type Block = NonNull<[u8]>;

/// Source location attached to every operation for diagnostics.
pub type CallSite = &'static Location<'static>;

/// Dispatch function stored in a handle.
///
/// # Safety
///
/// `context` must be the context pointer the function was paired with, and the
/// `operation` must satisfy the contract documented on [`Operation`].
pub type Procedure = unsafe fn(NonNull<()>, Operation, CallSite) -> AllocResult<Block>;

/// The closed set of requests an allocator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Allocate a zero-initialized block.
    Alloc { size: usize, align: usize },
    /// Grow or shrink `ptr` in place.
    ///
    /// `ptr` must have been returned by the same allocator and still be live.
    Resize {
        ptr: NonNull<u8>,
        new_size: usize,
        old_size: usize,
    },
    /// Release the block starting at `ptr`.
    ///
    /// `ptr` must have been returned by the same allocator, still be live and
    /// belong to a non-empty block.
    Free { ptr: NonNull<u8> },
    /// Release every block owned by the allocator.
    FreeAll,
}

/// Type-erased handle to an allocator strategy.
#[derive(Clone, Copy)]
pub struct Allocator<'a> {
    context: NonNull<()>,
    procedure: Procedure,
    _marker: PhantomData<&'a ()>,
}

/// Monomorphised trampoline from a handle back to its strategy.
///
/// # Safety
///
/// `context` must come from `NonNull::from(&A)` for a value that is still
/// borrowed by the handle holding this function.
unsafe fn dispatch<A: RawAllocator>(
    context: NonNull<()>,
    operation: Operation,
    location: CallSite,
) -> AllocResult<Block> {
    // SAFETY: Reconstructing the shared borrow captured in `Allocator::new`.
    // - context was produced from `&'a A` and the handle keeps `'a` alive
    // - Strategies only mutate through Cell/RefCell, so `&A` is sufficient
    let allocator = unsafe { context.cast::<A>().as_ref() };
    // SAFETY: Operation contract is forwarded unchanged from our caller.
    unsafe { allocator.procedure(operation, location) }
}

impl<'a> Allocator<'a> {
    /// Creates a handle that borrows `allocator` for `'a`.
    #[inline]
    pub fn new<A: RawAllocator>(allocator: &'a A) -> Self {
        Self {
            context: NonNull::from(allocator).cast(),
            procedure: dispatch::<A>,
            _marker: PhantomData,
        }
    }

    /// Builds a handle from a raw context pointer and dispatch function.
    ///
    /// # Safety
    ///
    /// - `procedure` must accept `context` for the whole of `'a`
    /// - Blocks produced for [`Operation::Alloc`] must be valid, aligned and
    ///   zero-initialized as described on [`RawAllocator`]
    #[inline]
    pub const unsafe fn from_raw_parts(context: NonNull<()>, procedure: Procedure) -> Self {
        Self {
            context,
            procedure,
            _marker: PhantomData,
        }
    }

    /// Opaque context pointer.
    #[inline]
    pub fn context(&self) -> NonNull<()> {
        self.context
    }

    /// Dispatch function.
    #[inline]
    pub fn procedure_ptr(&self) -> Procedure {
        self.procedure
    }

    /// Raw entry point: sends `operation` to the strategy as is.
    ///
    /// # Safety
    ///
    /// For `Resize` and `Free`, `ptr` must be a live, non-empty block from
    /// this allocator. For `Resize`, `Free` and `FreeAll`, no reference into the
    /// affected memory may be used afterwards.
    #[inline]
    pub unsafe fn procedure(self, operation: Operation, location: CallSite) -> AllocResult<Block> {
        // SAFETY: context/procedure pairing is guaranteed by construction.
        unsafe { (self.procedure)(self.context, operation, location) }
    }

    /// Allocates a zero-initialized block of `size` bytes aligned to `align`.
    ///
    /// Zero-size requests return an empty block without reaching the strategy.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    #[inline]
    #[track_caller]
    pub fn alloc(self, size: usize, align: usize) -> AllocResult<Block> {
        assert_valid_alignment(align);
        if size == 0 {
            return Ok(empty_block(align));
        }
        // SAFETY: `Alloc` places no requirements on the caller.
        unsafe { self.procedure(Operation::Alloc { size, align }, Location::caller()) }
    }

    /// Resizes the block at `ptr` in place.
    ///
    /// On `CannotResize` the caller owns the fallback (allocate, copy, free).
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block from this allocator and `old_size` its size.
    /// Bytes beyond `new_size` must not be accessed after a shrink.
    #[inline]
    #[track_caller]
    pub unsafe fn resize(self, ptr: NonNull<u8>, new_size: usize, old_size: usize) -> AllocResult<Block> {
        let operation = Operation::Resize {
            ptr,
            new_size,
            old_size,
        };
        // SAFETY: Forwarded from our caller's contract.
        unsafe { self.procedure(operation, Location::caller()) }
    }

    /// Releases the block at `ptr`.
    ///
    /// Empty blocks from zero-size requests never reached the strategy and
    /// must not be passed here; [`Allocator::free_block`] skips them.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live, non-empty block from this allocator and must not
    /// be used afterwards.
    #[inline]
    #[track_caller]
    pub unsafe fn free(self, ptr: NonNull<u8>) -> AllocResult<()> {
        // SAFETY: Forwarded from our caller's contract.
        unsafe { self.procedure(Operation::Free { ptr }, Location::caller()) }.map(|_| ())
    }

    /// Releases a whole block as returned by [`Allocator::alloc`].
    ///
    /// Empty blocks are accepted and left alone.
    ///
    /// # Safety
    ///
    /// `block` must be a live block from this allocator, with the length it
    /// was handed out with, and must not be used afterwards.
    #[inline]
    #[track_caller]
    pub unsafe fn free_block(self, block: Block) -> AllocResult<()> {
        if block.is_empty() {
            return Ok(());
        }
        // SAFETY: Non-empty, and the rest is forwarded from our caller.
        unsafe { self.procedure(Operation::Free { ptr: block.cast() }, Location::caller()) }.map(|_| ())
    }

    /// Releases every block owned by the allocator.
    ///
    /// # Safety
    ///
    /// No block previously handed out by this allocator may be used afterwards.
    #[inline]
    #[track_caller]
    pub unsafe fn free_all(self) -> AllocResult<()> {
        // SAFETY: Forwarded from our caller's contract.
        unsafe { self.procedure(Operation::FreeAll, Location::caller()) }.map(|_| ())
    }

    /// Allocates room for `value` and moves it in.
    #[track_caller]
    pub fn make<T>(self, value: T) -> AllocResult<AllocBox<'a, T>> {
        AllocBox::new_in(value, self)
    }

    /// Allocates `count` clones of `value` as a contiguous slice.
    #[track_caller]
    pub fn make_slice<T: Clone>(self, count: usize, value: T) -> AllocResult<AllocBox<'a, [T]>> {
        AllocBox::from_elem_in(value, count, self)
    }
}

impl fmt::Debug for Allocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("context", &self.context)
            .field("procedure", &(self.procedure as *const ()))
            .finish()
    }
}
