//! Allocator benchmarks
//!
//! Compares the strategies behind the handle across common workloads

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nebula_alloc::allocator::{BumpAllocator, RawAllocator, TrackingAllocator, heap_allocator};
use nebula_alloc::arena::{ArenaAllocator, ArenaConfig, ResetMode};
use std::hint::black_box;

/// Benchmark single allocation/free cycle
fn bench_single_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_allocation");

    group.bench_function("bump_64b", |b| {
        let mut storage = vec![0u8; 1024 * 1024];
        let bump = BumpAllocator::new(&mut storage);
        let handle = bump.as_allocator();

        b.iter(|| unsafe {
            let block = handle.alloc(64, 8).unwrap();
            handle.free(block.cast()).unwrap();
            black_box(block);
        });
    });

    group.bench_function("heap_64b", |b| {
        let handle = heap_allocator();

        b.iter(|| unsafe {
            let block = handle.alloc(64, 8).unwrap();
            handle.free(block.cast()).unwrap();
            black_box(block);
        });
    });

    group.bench_function("tracked_heap_64b", |b| {
        let tracker = TrackingAllocator::new(heap_allocator());
        let handle = tracker.as_allocator();

        b.iter(|| unsafe {
            let block = handle.alloc(64, 8).unwrap();
            handle.free(block.cast()).unwrap();
            black_box(block);
        });
    });

    // System allocator (baseline)
    group.bench_function("system_64b", |b| {
        let layout = std::alloc::Layout::from_size_align(64, 8).unwrap();

        b.iter(|| unsafe {
            let ptr = std::alloc::alloc_zeroed(layout);
            std::alloc::dealloc(ptr, layout);
            black_box(ptr);
        });
    });

    group.finish();
}

/// Benchmark many small allocations followed by a bulk release
fn bench_batch_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_allocation");

    for count in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("bump", count), &count, |b, &count| {
            let mut storage = vec![0u8; count * 32 + 8];
            let mut bump = BumpAllocator::new(&mut storage);

            b.iter(|| {
                for _ in 0..count {
                    black_box(bump.alloc(32, 8).unwrap());
                }
                bump.reset();
            });
        });

        group.bench_with_input(BenchmarkId::new("arena", count), &count, |b, &count| {
            let config = ArenaConfig::small_objects();
            let mut arena = ArenaAllocator::with_config(heap_allocator(), config).unwrap();

            b.iter(|| {
                for _ in 0..count {
                    black_box(arena.alloc(32, 8).unwrap());
                }
                arena.reset(ResetMode::RetainCapacity);
            });
        });

        group.bench_with_input(
            BenchmarkId::new("arena_dealloc_all", count),
            &count,
            |b, &count| {
                let config = ArenaConfig::small_objects();
                let mut arena = ArenaAllocator::with_config(heap_allocator(), config).unwrap();

                b.iter(|| {
                    for _ in 0..count {
                        black_box(arena.alloc(32, 8).unwrap());
                    }
                    arena.reset(ResetMode::DeallocAll);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark typed construction through the handle
fn bench_make(c: &mut Criterion) {
    let mut group = c.benchmark_group("make");

    group.bench_function("bump_make_u64", |b| {
        let mut storage = vec![0u8; 64];
        let bump = BumpAllocator::new(&mut storage);
        let handle = bump.as_allocator();

        b.iter(|| {
            let value = handle.make(black_box(42_u64)).unwrap();
            black_box(*value);
        });
    });

    group.bench_function("heap_make_slice_256", |b| {
        let handle = heap_allocator();

        b.iter(|| {
            let slice = handle.make_slice(256, black_box(7_u32)).unwrap();
            black_box(slice.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_allocation,
    bench_batch_allocation,
    bench_make
);
criterion_main!(benches);
