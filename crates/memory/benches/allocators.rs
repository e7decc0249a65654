//! Allocator and hash map benchmarks
//!
//! Compares the four strategies on small-block bump workloads and the hash
//! map against `std::collections::HashMap`.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sl_memory::allocator::{
    Allocator, ArenaAllocator, LinearAllocator, PoolAllocator, StackAllocator,
};
use sl_memory::collections::HashMap;
use sl_memory::global::{temp_alloc, temp_begin, temp_end};
use sl_memory::scope::ScopedAllocator;
use std::hint::black_box;

const BATCH: usize = 1000;

fn fill_and_reset(allocator: &dyn Allocator, size: usize) {
    for _ in 0..BATCH {
        black_box(allocator.allocate(size));
    }
    // SAFETY: the blocks are only passed to `black_box`, never dereferenced.
    unsafe { allocator.reset() };
}

/// Benchmark a batch of small allocations followed by a reset
fn bench_small_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_allocations");
    group.throughput(Throughput::Elements(BATCH as u64));

    for size in [16_usize, 64] {
        let linear = LinearAllocator::new(BATCH * size);
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, &size| {
            b.iter(|| fill_and_reset(&linear, size));
        });

        let stack = StackAllocator::new(BATCH * size);
        group.bench_with_input(BenchmarkId::new("stack", size), &size, |b, &size| {
            b.iter(|| fill_and_reset(&stack, size));
        });

        let arena = ArenaAllocator::new(64 * 1024);
        group.bench_with_input(BenchmarkId::new("arena", size), &size, |b, &size| {
            b.iter(|| fill_and_reset(&arena, size));
        });

        let pool = PoolAllocator::new(BATCH, size).expect("valid pool");
        group.bench_with_input(BenchmarkId::new("pool", size), &size, |b, &size| {
            b.iter(|| fill_and_reset(&pool, size));
        });
    }

    group.finish();
}

/// Benchmark snapshot/rewind against the thread's global arena
fn bench_temp_scope(c: &mut Criterion) {
    c.bench_function("temp_scope_32x64", |b| {
        b.iter(|| {
            let mark = temp_begin();
            for _ in 0..32 {
                black_box(temp_alloc(64));
            }
            // SAFETY: scratch blocks are not used after the mark.
            unsafe { temp_end(&mark) };
        });
    });
}

/// Benchmark hash map inserts and lookups
fn bench_hash_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_map");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("sl_insert_get", |b| {
        b.iter(|| {
            let mut map = HashMap::new();
            for i in 0..BATCH as u64 {
                map.insert(i, i);
            }
            for i in 0..BATCH as u64 {
                black_box(map.get(&i));
            }
        });
    });

    group.bench_function("sl_insert_get_arena", |b| {
        let mut arena = ArenaAllocator::new(256 * 1024);
        b.iter(|| {
            let scope = ScopedAllocator::new(&mut arena);
            let mut map = HashMap::with_allocator(scope.allocator());
            for i in 0..BATCH as u64 {
                map.insert(i, i);
            }
            for i in 0..BATCH as u64 {
                black_box(map.get(&i));
            }
        });
    });

    group.bench_function("std_insert_get", |b| {
        b.iter(|| {
            let mut map = std::collections::HashMap::new();
            for i in 0..BATCH as u64 {
                map.insert(i, i);
            }
            for i in 0..BATCH as u64 {
                black_box(map.get(&i));
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_small_allocations,
    bench_temp_scope,
    bench_hash_map
);
criterion_main!(benches);
