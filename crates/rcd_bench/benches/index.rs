//! Index operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rcd_bench::utils::{generate_dictionaries, open_indexed};
use rcd_model::{ActivityFilter, Dictionary, FilterCriteria, FilterValue, SortOrder};
use tempfile::TempDir;

/// Benchmark committed single writes.
fn bench_single_write(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let service = open_indexed::<Dictionary>(temp.path(), Vec::new());
    let dictionaries = generate_dictionaries(1, 1);

    c.bench_function("single_write", |b| {
        b.iter(|| {
            let mut tx = service.begin().unwrap();
            tx.upsert(black_box(&dictionaries[0])).unwrap();
            tx.commit().unwrap();
        });
    });
}

/// Benchmark batch writes.
fn bench_batch_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_write");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let temp = TempDir::new().unwrap();
                let service = open_indexed::<Dictionary>(temp.path(), Vec::new());
                let dictionaries = generate_dictionaries(batch_size, 10);

                b.iter(|| {
                    let mut tx = service.begin().unwrap();
                    tx.upsert_all(&dictionaries).unwrap();
                    tx.commit().unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark criteria searches over indexes of growing size.
fn bench_find_by_criteria(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_by_criteria");

    for size in [1_000, 10_000].iter() {
        let temp = TempDir::new().unwrap();
        let service = open_indexed(temp.path(), generate_dictionaries(*size, 20));

        let first_page = FilterCriteria::new();
        group.bench_with_input(BenchmarkId::new("first_page", size), &first_page, |b, criteria| {
            b.iter(|| black_box(service.find_by_criteria(criteria).unwrap()));
        });

        let filtered = FilterCriteria::new()
            .filter("groupId", FilterValue::string_set(["group-1", "group-2"]))
            .sort("name", SortOrder::Desc);
        group.bench_with_input(BenchmarkId::new("filtered_sorted", size), &filtered, |b, criteria| {
            b.iter(|| black_box(service.find_by_criteria(criteria).unwrap()));
        });

        let searched = FilterCriteria::new().search("coun reg").activity(ActivityFilter::ALL);
        group.bench_with_input(BenchmarkId::new("search", size), &searched, |b, criteria| {
            b.iter(|| black_box(service.find_by_criteria(criteria).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark lookups by primary key.
fn bench_find_by_id(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let dictionaries = generate_dictionaries(10_000, 20);
    let id = dictionaries[5_000].id.clone();
    let service = open_indexed(temp.path(), dictionaries);

    c.bench_function("find_by_id", |b| {
        b.iter(|| black_box(service.find_by_id(black_box(&id)).unwrap()));
    });
}

/// Benchmark full rebuilds from the store.
fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(10);

    for size in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp = TempDir::new().unwrap();
            let service = open_indexed(temp.path(), generate_dictionaries(size, 20));

            b.iter(|| black_box(service.execute_rebuild().unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_write,
    bench_batch_write,
    bench_find_by_criteria,
    bench_find_by_id,
    bench_rebuild,
);
criterion_main!(benches);
