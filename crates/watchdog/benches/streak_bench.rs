//! 스트릭 카운터 벤치마크
//!
//! 관측 반영과 임계값 도달 시 제거 경로의 성능을 측정합니다.

use std::hint::black_box;

use autoheal_watchdog::tracker::StreakCounter;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn container_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{i:064x}")).collect()
}

fn bench_observe_single(c: &mut Criterion) {
    let id = "a".repeat(64);
    c.bench_function("observe_single_container", |b| {
        let mut counter = StreakCounter::new(3);
        b.iter(|| black_box(counter.observe(black_box(&id))));
    });
}

fn bench_observe_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe_poll_cycle");

    for size in [10usize, 100, 1_000] {
        let ids = container_ids(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            let mut counter = StreakCounter::new(3);
            b.iter(|| {
                for id in ids {
                    black_box(counter.observe(id));
                }
            });
        });
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let ids = container_ids(1_000);
    let mut counter = StreakCounter::new(u32::MAX);
    for id in &ids {
        counter.observe(id);
    }

    c.bench_function("count_lookup_1000", |b| {
        b.iter(|| {
            for id in &ids {
                black_box(counter.count(id));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_observe_single,
    bench_observe_cycle,
    bench_query
);
criterion_main!(benches);
