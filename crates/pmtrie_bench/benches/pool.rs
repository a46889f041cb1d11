//! Durable pool benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pmtrie_core::node::{node_size, NODE_TYPE_NUM};
use pmtrie_pool::{DurablePool, InMemoryPool};

/// Benchmark an empty transaction.
fn bench_empty_transaction(c: &mut Criterion) {
    let pool = InMemoryPool::new();

    c.bench_function("empty_transaction", |b| {
        b.iter(|| {
            pool.begin().unwrap();
            pool.commit().unwrap();
        });
    });
}

/// Benchmark allocating and freeing a node-sized object.
fn bench_alloc_free(c: &mut Criterion) {
    let pool = InMemoryPool::new();

    c.bench_function("alloc_free_node", |b| {
        b.iter(|| {
            pool.begin().unwrap();
            let handle = pool.alloc(node_size(8), NODE_TYPE_NUM).unwrap();
            pool.free(black_box(handle)).unwrap();
            pool.commit().unwrap();
        });
    });
}

/// Benchmark snapshot-then-write of ranges of increasing size.
fn bench_logged_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("logged_write");
    let pool = InMemoryPool::new();
    pool.begin().unwrap();
    let handle = pool.alloc(4096, 1).unwrap();
    pool.commit().unwrap();

    for size in [8, 64, 512, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = vec![0xAB; size];
            b.iter(|| {
                pool.begin().unwrap();
                pool.snapshot(handle, 0, size).unwrap();
                pool.write(handle, 0, black_box(&data)).unwrap();
                pool.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark aborting a transaction that wrote one range.
fn bench_abort(c: &mut Criterion) {
    let pool = InMemoryPool::new();
    pool.begin().unwrap();
    let handle = pool.alloc(2048, 1).unwrap();
    pool.commit().unwrap();

    c.bench_function("abort_after_write", |b| {
        b.iter(|| {
            pool.begin().unwrap();
            pool.snapshot(handle, 0, 2048).unwrap();
            pool.write(handle, 0, &[1; 2048]).unwrap();
            pool.abort().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_empty_transaction,
    bench_alloc_free,
    bench_logged_write,
    bench_abort
);
criterion_main!(benches);
