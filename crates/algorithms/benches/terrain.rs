//! Benchmarks for terrain derivation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use georisk_algorithms::terrain::slope_aspect;
use georisk_core::{GeoTransform, Raster, CRS};

fn create_dem(size: usize) -> Raster<f64> {
    let mut dem: Raster<f64> = Raster::new(size, size)
        .with_transform(GeoTransform::new(500_000.0, 4_200_000.0, 30.0, -30.0))
        .with_crs(CRS::from_epsg(32610));

    // Tilted plane with a ridge pattern
    for row in 0..size {
        for col in 0..size {
            let base = (row + col) as f64 * 2.0;
            let variation = ((row * 7 + col * 13) % 100) as f64 / 10.0;
            dem.set(row, col, base + variation).unwrap();
        }
    }
    dem
}

fn bench_slope_aspect(c: &mut Criterion) {
    let mut group = c.benchmark_group("horn_slope_aspect");

    for size in [256, 512, 1024].iter() {
        let dem = create_dem(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| slope_aspect(black_box(&dem), 30.0).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_slope_aspect);
criterion_main!(benches);
