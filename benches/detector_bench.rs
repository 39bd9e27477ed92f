// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Benchmarks for flood-fill obstacle detection.
//!
//! Measures:
//! - Cartesian search at various grid widths
//! - Detector reuse (queue kept across frames)
//!
//! Run with: cargo bench --bench detector_bench

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use edgefirst_terrainpub::{
    DetectorConfig, ObstacleDetector, Point3, grid::PointGrid, lidar::LANES,
};

/// Flat grid with `n_obstacles` square patches of alternating boulders and
/// craters spread across the columns.
fn generate_grid(width: usize, n_obstacles: usize) -> PointGrid {
    let mut data = Vec::with_capacity(LANES * width);
    let stride = width / n_obstacles.max(1);
    for row in 0..LANES {
        for col in 0..width {
            let x = col as f64 * 0.01;
            let y = 4.0 + row as f64 * 0.1;
            let slot = col / stride.max(1);
            let in_patch =
                n_obstacles > 0 && (2..14).contains(&row) && col % stride.max(1) < stride / 2;
            let z = match (in_patch, slot % 2) {
                (true, 0) => 0.4,
                (true, _) => -0.3,
                _ => 0.01,
            };
            data.push(Point3::new(x, y, z));
        }
    }
    PointGrid::from_rows(width, data).expect("grid shape")
}

fn bench_cartesian(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_cartesian");

    // quarter, half and full rotation at 0.10° resolution
    for &width in &[900, 1800, 3600] {
        let grid = generate_grid(width, 8);

        group.throughput(Throughput::Elements((width * LANES) as u64));
        group.bench_with_input(BenchmarkId::new("width", width), &grid, |b, grid| {
            let mut detector = ObstacleDetector::new(DetectorConfig::default());
            // Warmup: one call to grow the queue
            detector.find_cartesian(grid.clone());

            b.iter_batched(
                || grid.clone(),
                |grid| {
                    detector.clear();
                    detector.find_cartesian(grid)
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_flat(c: &mut Criterion) {
    let grid = generate_grid(3600, 0);

    c.bench_function("detect_cartesian_flat", |b| {
        let mut detector = ObstacleDetector::new(DetectorConfig::default());
        b.iter_batched(
            || grid.clone(),
            |grid| detector.find_cartesian(grid),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_cartesian, bench_flat);
criterion_main!(benches);
