//! Benchmarks for change mask vectorization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use georisk_algorithms::change::vectorize_mask;
use georisk_core::GeoTransform;
use ndarray::Array2;

/// Scattered blobs of changed cells, some touching diagonally
fn create_mask(size: usize) -> Array2<u8> {
    Array2::from_shape_fn((size, size), |(row, col)| {
        let blob = (row / 8 + col / 8) % 3 == 0;
        let hole = row % 8 == 4 && col % 8 == 4;
        u8::from(blob && !hole)
    })
}

fn bench_vectorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize_mask");
    let transform = GeoTransform::new(500_000.0, 4_200_000.0, 10.0, -10.0);

    for size in [128, 256, 512].iter() {
        let mask = create_mask(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| vectorize_mask(black_box(&mask), &transform))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vectorize);
criterion_main!(benches);
