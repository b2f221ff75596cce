//! End-to-end allocation scenarios
//!
//! Each test drives a strategy purely through the `Allocator` handle, the way
//! downstream containers use it.

use nebula_alloc::allocator::{
    Allocator, BumpAllocator, MemoryUsage, RawAllocator, TrackingAllocator, heap_allocator,
};
use nebula_alloc::arena::{ArenaAllocator, DEFAULT_MIN_POOL_SIZE, ResetMode};
use nebula_alloc::error::AllocError;

fn addr(block: nebula_alloc::Block) -> usize {
    block.cast::<u8>().as_ptr().addr()
}

/// 64-byte bump region: fill, overflow, free the last block
#[test]
fn test_bump_region_lifecycle() {
    let mut storage = [0u8; 64];
    let bump = BumpAllocator::new(&mut storage);
    let handle = bump.as_allocator();

    let block = handle.alloc(10, 1).unwrap();
    assert_eq!(bump.offset(), 10);

    assert_eq!(handle.alloc(60, 1), Err(AllocError::OutOfMemory));
    assert_eq!(bump.offset(), 10, "failed allocation must not move the offset");

    unsafe { handle.free(block.cast()) }.unwrap();
    assert_eq!(bump.offset(), 0);
}

/// Arena with the default minimum pool size over the heap
#[test]
fn test_arena_grows_by_pools() {
    let arena = ArenaAllocator::new(heap_allocator());
    let handle = arena.as_allocator();

    let big = handle.alloc(200, 1).unwrap();
    assert_eq!(big.len(), 200);
    assert_eq!(arena.pool_count(), 1);
    assert!(arena.pools()[0].capacity >= 200);

    let small = handle.alloc(50, 1).unwrap();
    assert_eq!(small.len(), 50);
    assert_eq!(arena.pool_count(), 2);
    assert!(arena.pools()[1].capacity >= DEFAULT_MIN_POOL_SIZE);

    assert!(arena.owns_ptr(big.cast()));
    assert!(arena.owns_ptr(small.cast()));
}

/// Tracker over the heap: three live blocks, then none
#[test]
fn test_tracker_reports_until_everything_is_freed() {
    let tracker = TrackingAllocator::new(heap_allocator());
    let handle = tracker.as_allocator();

    let blocks: Vec<_> = [16, 32, 64]
        .into_iter()
        .map(|size| handle.alloc(size, 8).unwrap())
        .collect();

    let report = tracker.report().unwrap_err();
    assert_eq!(report.leaks.len(), 3);
    assert_eq!(
        report.leaks.iter().map(|leak| leak.size).collect::<Vec<_>>(),
        vec![16, 32, 64]
    );

    for block in blocks {
        unsafe { handle.free(block.cast()) }.unwrap();
    }
    assert!(tracker.report().is_ok());
}

#[test]
fn test_arena_large_requests_get_one_pool_each() {
    let arena = ArenaAllocator::new(heap_allocator());
    let handle = arena.as_allocator();

    for size in [129, 300, 1024, 4096, 200] {
        let _ = handle.alloc(size, 8).unwrap();
    }
    assert_eq!(arena.pool_count(), 5);
}

#[test]
fn test_arena_small_requests_share_pools() {
    let arena = ArenaAllocator::new(heap_allocator());
    let handle = arena.as_allocator();

    for _ in 0..100 {
        let _ = handle.alloc(4, 4).unwrap();
    }
    // 32 four-byte blocks fit in each 128-byte pool
    assert_eq!(arena.pool_count(), 4);
}

#[test]
fn test_bump_reset_reuses_first_address() {
    let mut storage = [0u8; 256];
    let mut bump = BumpAllocator::new(&mut storage);

    let first = addr(bump.alloc(24, 8).unwrap());
    for _ in 0..5 {
        let _ = bump.alloc(16, 8).unwrap();
    }

    bump.reset();
    assert_eq!(bump.available_space(), 256);
    assert_eq!(addr(bump.alloc(24, 8).unwrap()), first);
}

/// Free-all through the handle keeps arena pools around for reuse
#[test]
fn test_arena_free_all_retains_capacity() {
    let arena = ArenaAllocator::new(heap_allocator());
    let handle = arena.as_allocator();

    let first = handle.alloc(100, 8).unwrap();
    let _ = handle.alloc(500, 8).unwrap();
    let total = arena.total_memory();

    unsafe { handle.free_all() }.unwrap();
    assert_eq!(arena.pool_count(), 2);
    assert_eq!(arena.used_memory(), 0);
    assert_eq!(arena.total_memory(), total);
    assert_eq!(addr(handle.alloc(100, 8).unwrap()), addr(first));
}

/// Strategies compose: tracker over an arena over the heap
#[test]
fn test_tracker_over_arena() {
    let arena = ArenaAllocator::new(heap_allocator());
    let tracker = TrackingAllocator::new(arena.as_allocator());
    let handle = tracker.as_allocator();

    let block = handle.alloc(32, 8).unwrap();
    assert_eq!(
        unsafe { handle.free(block.cast()) },
        Err(AllocError::UnsupportedOperation)
    );
    assert!(
        !tracker.has_leaks(),
        "unsupported free still counts as released by the tracker"
    );

    let _ = handle.alloc(32, 8).unwrap();
    unsafe { handle.free_all() }.unwrap();
    assert!(!tracker.has_leaks());
    assert_eq!(arena.used_memory(), 0);
}

/// Arena dropped while backed by a tracker gives everything back
#[test]
fn test_arena_drop_and_dealloc_all() {
    let tracker = TrackingAllocator::new(heap_allocator());

    let mut arena = ArenaAllocator::new(tracker.as_allocator());
    let _ = arena.alloc(1000, 16).unwrap();
    let _ = arena.alloc(1000, 16).unwrap();
    assert_eq!(tracker.live_allocations(), 2);

    arena.reset(ResetMode::DeallocAll);
    assert_eq!(arena.pool_count(), 0);
    assert!(!tracker.has_leaks());

    let _ = arena.alloc(8, 8).unwrap();
    assert_eq!(tracker.live_allocations(), 1);
    drop(arena);
    assert!(tracker.report().is_ok());
}

/// A container written only against the handle
fn collect_squares(allocator: Allocator<'_>, count: usize) -> Vec<u64> {
    let mut squares = allocator.make_slice(count, 0_u64).unwrap();
    for (index, slot) in squares.iter_mut().enumerate() {
        *slot = (index * index) as u64;
    }
    squares.to_vec()
}

#[test]
fn test_consumers_are_strategy_agnostic() {
    let expected: Vec<u64> = (0..10_u64).map(|i| i * i).collect();

    let mut storage = [0u8; 256];
    let bump = BumpAllocator::new(&mut storage);
    assert_eq!(collect_squares(bump.as_allocator(), 10), expected);
    assert!(bump.last_allocation().is_none());

    let arena = ArenaAllocator::new(heap_allocator());
    assert_eq!(collect_squares(arena.as_allocator(), 10), expected);

    let tracker = TrackingAllocator::new(heap_allocator());
    assert_eq!(collect_squares(tracker.as_allocator(), 10), expected);
    assert!(tracker.report().is_ok());

    assert_eq!(collect_squares(heap_allocator(), 10), expected);
}
