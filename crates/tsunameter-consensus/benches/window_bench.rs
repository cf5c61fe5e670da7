//! Benchmarks for sensor-side smoothing and quorum checks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tsunameter_consensus::{similar_count, MovingWindow};

fn bench_window_push(c: &mut Criterion) {
    let samples: Vec<f64> = (0..1024).map(|i| 5000.0 + f64::from(i % 1800)).collect();

    let mut group = c.benchmark_group("window_push");
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("1024_samples", |b| {
        b.iter(|| {
            let mut window = MovingWindow::seeded([6000.0; 4]);
            for &s in &samples {
                window.push(black_box(s));
            }
            window.average()
        })
    });
    group.finish();
}

fn bench_similar_count(c: &mut Criterion) {
    let peers = [6050.0, 6300.0, 5950.0, 5800.0];
    c.bench_function("similar_count", |b| {
        b.iter(|| similar_count(black_box(6100.0), 200.0, peers))
    });
}

criterion_group!(benches, bench_window_push, bench_similar_count);
criterion_main!(benches);
