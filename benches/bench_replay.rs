//! Throughput benchmarks for the uniform and prioritized buffers.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use replay::collate::{Record, RecordCollate};
use replay::{PrioritizedBuffer, PrioritizedConfig, ReplayBuffer, ReplayBufferConfig};

fn record(v: f32) -> Record {
    let mut r = Record::new();
    r.insert("x".to_string(), vec![v]);
    r
}

fn bench_uniform_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("uniform_add");
    for capacity in [1024usize, 65536] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let config = ReplayBufferConfig::new(capacity).unwrap();
            let buffer = ReplayBuffer::new(config, RecordCollate);
            b.iter(|| {
                buffer.add(record(1.0));
            });
        });
    }
    group.finish();
}

fn bench_uniform_sample(c: &mut Criterion) {
    let config = ReplayBufferConfig::new(65536).unwrap();
    let buffer = ReplayBuffer::new(config, RecordCollate);
    for i in 0..65536 {
        buffer.add(record(i as f32));
    }
    c.bench_function("uniform_sample_256", |b| {
        b.iter(|| buffer.sample(256).unwrap());
    });
}

fn bench_prioritized_sample(c: &mut Criterion) {
    let config = PrioritizedConfig::new(65536, 0.6, 0.4).unwrap();
    let buffer = PrioritizedBuffer::new(config, RecordCollate);
    for i in 0..65536 {
        buffer.add(record(i as f32));
    }
    c.bench_function("prioritized_sample_256", |b| {
        b.iter(|| buffer.sample(256).unwrap());
    });
}

fn bench_segment_tree_scan(c: &mut Criterion) {
    use replay::segment_tree::SumTree;
    let mut tree = SumTree::new(65536);
    for i in 0..65536 {
        tree.set(i, (i + 1) as f64);
    }
    c.bench_function("sum_tree_scan_lower_bound", |b| {
        let total = tree.total();
        b.iter(|| tree.scan_lower_bound(total / 2.0).unwrap());
    });
}

criterion_group!(
    benches,
    bench_uniform_add,
    bench_uniform_sample,
    bench_prioritized_sample,
    bench_segment_tree_scan
);
criterion_main!(benches);
