//! Basic benchmarks for the `block_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]
#![allow(
    clippy::undocumented_unsafe_blocks,
    reason = "benchmark code only releases pointers it just allocated"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use block_pool::{DropPolicy, DynamicPool, FixedPool};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

const ENTRIES_PER_BLOCK: usize = 128;

fn fixed_pool(capacity: usize) -> FixedPool<TestItem> {
    FixedPool::builder()
        .capacity(capacity)
        .drop_policy(DropPolicy::MayDropItems)
        .build()
}

fn dynamic_pool() -> DynamicPool<TestItem> {
    DynamicPool::builder()
        .entries_per_block(ENTRIES_PER_BLOCK)
        .drop_policy(DropPolicy::MayDropItems)
        .build()
}

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("bp_basic");

    group.bench_function("build_fixed", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(fixed_pool(ENTRIES_PER_BLOCK)));
            }

            start.elapsed()
        });
    });

    group.bench_function("build_dynamic", |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(dynamic_pool()));
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_first_fixed", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| fixed_pool(ENTRIES_PER_BLOCK))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.allocate(black_box(TEST_VALUE)));
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_release_fixed", |b| {
        b.iter_custom(|iters| {
            let mut pool = fixed_pool(ENTRIES_PER_BLOCK);

            let start = Instant::now();

            for _ in 0..iters {
                let ptr = pool.allocate(black_box(TEST_VALUE)).unwrap();
                unsafe { pool.release(black_box(ptr.as_ptr())) };
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_release_dynamic", |b| {
        b.iter_custom(|iters| {
            let mut pool = dynamic_pool();

            let start = Instant::now();

            for _ in 0..iters {
                let ptr = pool.allocate(black_box(TEST_VALUE)).unwrap();
                unsafe { pool.release(black_box(ptr.as_ptr())) };
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("bp_slow");

    group.bench_function("allocate_10k_dynamic", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(dynamic_pool)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &mut pools {
                for _ in 0..10_000 {
                    _ = black_box(pool.allocate(black_box(TEST_VALUE)));
                }
            }

            start.elapsed()
        });
    });

    group.bench_function("release_last_of_10k_dynamic", |b| {
        b.iter_custom(|iters| {
            let mut pool = dynamic_pool();

            let ptrs = (0..10_000)
                .map(|_| pool.allocate(TEST_VALUE).unwrap())
                .collect::<Vec<_>>();
            let last = *ptrs.last().unwrap();

            let start = Instant::now();

            // Releasing has to search the blocks, so the last block is the worst case.
            for _ in 0..iters {
                unsafe { pool.release(black_box(last.as_ptr())) };
                _ = black_box(pool.allocate(TEST_VALUE));
            }

            start.elapsed()
        });
    });

    group.bench_function("for_each_10k_fixed", |b| {
        b.iter_custom(|iters| {
            let mut pool = fixed_pool(10_000);

            for _ in 0..10_000 {
                _ = pool.allocate(TEST_VALUE);
            }

            let start = Instant::now();

            for _ in 0..iters {
                let mut count = 0_usize;
                pool.for_each(|ptr| {
                    _ = black_box(ptr);
                    count = count.wrapping_add(1);
                });
                _ = black_box(count);
            }

            start.elapsed()
        });
    });

    group.finish();
}
