//! Radix tree operation benchmarks.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use pmtrie_bench::utils::{populated_map, random_keys, shared_prefix_keys};
use pmtrie_core::RadixTreeMap;
use pmtrie_pool::{Handle, InMemoryPool};
use std::ops::ControlFlow;
use std::sync::Arc;

/// Benchmark filling an empty map.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for count in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*count as u64));

        let keys = random_keys(*count, 16);
        group.bench_with_input(BenchmarkId::new("random", count), &keys, |b, keys| {
            b.iter_batched(
                || RadixTreeMap::create(Arc::new(InMemoryPool::new())).unwrap(),
                |map| {
                    for (i, key) in keys.iter().enumerate() {
                        map.insert(black_box(key), Handle::from_raw(i as u64 + 1))
                            .unwrap();
                    }
                    map
                },
                BatchSize::SmallInput,
            );
        });

        let keys = shared_prefix_keys(*count, 32);
        group.bench_with_input(BenchmarkId::new("shared_prefix", count), &keys, |b, keys| {
            b.iter_batched(
                || RadixTreeMap::create(Arc::new(InMemoryPool::new())).unwrap(),
                |map| {
                    for (i, key) in keys.iter().enumerate() {
                        map.insert(black_box(key), Handle::from_raw(i as u64 + 1))
                            .unwrap();
                    }
                    map
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark overwriting an existing key.
fn bench_overwrite(c: &mut Criterion) {
    let keys = random_keys(1000, 16);
    let map = populated_map(&keys);
    let key = &keys[500];

    c.bench_function("overwrite", |b| {
        b.iter(|| map.insert(black_box(key), Handle::from_raw(7)).unwrap());
    });
}

/// Benchmark lookups of present and absent keys.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for count in [100, 10_000].iter() {
        let keys = random_keys(*count, 16);
        let map = populated_map(&keys);
        let missing = random_keys(1, 17).remove(0);

        group.bench_with_input(BenchmarkId::new("hit", count), &keys, |b, keys| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % keys.len();
                black_box(map.get(black_box(&keys[i])).unwrap())
            });
        });
        group.bench_with_input(BenchmarkId::new("miss", count), &missing, |b, missing| {
            b.iter(|| black_box(map.get(black_box(missing)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark removing every key.
fn bench_remove(c: &mut Criterion) {
    let keys = random_keys(1000, 16);

    c.bench_function("remove_all_1000", |b| {
        b.iter_batched(
            || populated_map(&keys),
            |map| {
                for key in &keys {
                    black_box(map.remove(key).unwrap());
                }
                map
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark full traversal and clearing.
fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");
    let keys = random_keys(10_000, 16);
    let map = populated_map(&keys);

    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("foreach", |b| {
        b.iter(|| {
            let mut count = 0usize;
            map.foreach(|entry| {
                count += entry.key.len();
                ControlFlow::Continue(())
            })
            .unwrap();
            black_box(count)
        });
    });

    group.sample_size(20);
    group.bench_function("clear", |b| {
        b.iter_batched(
            || populated_map(&keys),
            |map| {
                map.clear().unwrap();
                map
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_overwrite,
    bench_get,
    bench_remove,
    bench_traversal
);
criterion_main!(benches);
