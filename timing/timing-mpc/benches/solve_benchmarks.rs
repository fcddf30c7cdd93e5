//! Benchmarks for timing MPC solves.
//!
//! Run with: cargo bench -p timing-mpc
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p timing-mpc -- --save-baseline main
//! 2. After changes: cargo bench -p timing-mpc -- --baseline main

#![allow(missing_docs, clippy::cast_precision_loss, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::DVector;
use timing_mpc::{TimingConfig, TimingMpc};

// =============================================================================
// Waypoint Generation
// =============================================================================

/// Zig-zag path in 3D with `n` waypoints.
fn zigzag(n: usize) -> Vec<DVector<f64>> {
    (0..n)
        .map(|i| {
            let x = (i + 1) as f64;
            let y = if i % 2 == 0 { 0.5 } else { -0.5 };
            DVector::from_vec(vec![x, y, 0.1 * x])
        })
        .collect()
}

// =============================================================================
// Cold vs Warm Solves
// =============================================================================

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("Solve");
    let start = DVector::zeros(3);

    for n in [3, 8, 16] {
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("cold", n), &n, |b, &n| {
            let config = TimingConfig::realtime().with_warm_starting(false);
            b.iter(|| {
                let mut mpc = TimingMpc::new(zigzag(n), config).unwrap();
                mpc.solve(black_box(&start), black_box(&start), 0).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("warm", n), &n, |b, &n| {
            let mut mpc = TimingMpc::new(zigzag(n), TimingConfig::realtime()).unwrap();
            mpc.solve(&start, &start, 0).unwrap();
            b.iter(|| mpc.solve(black_box(&start), black_box(&start), 0).unwrap())
        });
    }

    group.finish();
}

// =============================================================================
// Control Tick
// =============================================================================

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tick");
    let dt = 0.01;

    group.bench_function("solve_spline_progress", |b| {
        let waypoints = zigzag(8);
        b.iter(|| {
            let mut mpc = TimingMpc::new(waypoints.clone(), TimingConfig::realtime()).unwrap();
            let mut position = DVector::zeros(3);
            let mut velocity = DVector::zeros(3);
            for _ in 0..10 {
                mpc.solve(&position, &velocity, 0).unwrap();
                let spline = mpc.cubic_spline(&position, &velocity).unwrap();
                position = spline.position(dt);
                velocity = spline.velocity(dt);
                mpc.update_progress_time(dt).unwrap();
            }
            black_box(mpc.times())
        })
    });

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_solve, bench_tick);

criterion_main!(benches);
