//! Alignment helpers shared by the allocator strategies

use core::ptr::{self, NonNull};

use crate::allocator::Block;

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use nebula_alloc::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Like [`align_up`], but returns `None` instead of wrapping around.
///
/// # Examples
/// ```
/// use nebula_alloc::utils::checked_align_up;
///
/// assert_eq!(checked_align_up(9, 8), Some(16));
/// assert_eq!(checked_align_up(usize::MAX, 8), None);
/// ```
#[inline(always)]
pub const fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// Checks if a value is aligned to the given alignment
///
/// # Examples
/// ```
/// use nebula_alloc::utils::is_aligned;
///
/// assert!(is_aligned(16, 8));
/// assert!(!is_aligned(17, 8));
/// ```
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Panics unless `align` is a power of two.
///
/// Invalid alignment is a caller bug, never a recoverable allocator error.
#[inline]
#[track_caller]
pub(crate) fn assert_valid_alignment(align: usize) {
    assert!(
        align.is_power_of_two(),
        "invalid memory alignment {align}: must be a power of two"
    );
}

/// Zero-length block whose address satisfies `align`.
#[inline]
pub(crate) fn empty_block(align: usize) -> Block {
    let dangling = ptr::without_provenance_mut::<u8>(align.max(1));
    // SAFETY: `align.max(1)` is non-zero, so the pointer is non-null.
    let ptr = unsafe { NonNull::new_unchecked(dangling) };
    NonNull::slice_from_raw_parts(ptr, 0)
}
