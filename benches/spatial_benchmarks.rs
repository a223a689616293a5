use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geokv::compute::covering::CoveringGenerator;
use geokv::compute::geohash::{bits_for_resolution, encode};
use geokv::prelude::*;
use geokv::{PartitionKeyMapper, Region};

fn manager(hash_key_length: u8, max_scan_concurrency: usize) -> GeoDataManager {
    let _ = env_logger::builder().is_test(true).try_init();
    GeoDataManager::builder()
        .config(
            GeoConfig::new("bench")
                .with_hash_key_length(hash_key_length)
                .with_max_scan_concurrency(max_scan_concurrency),
        )
        .in_memory()
        .create_table_if_missing(true)
        .build()
        .unwrap()
}

fn grid(count: usize) -> Vec<PutPointRequest> {
    (0..count)
        .map(|i| {
            let lat = 40.7128 + (i % 100) as f64 * 0.001;
            let lon = -74.0060 + (i / 100) as f64 * 0.001;
            PutPointRequest::new(GeoPoint::new(lat, lon), format!("pt:{}", i))
        })
        .collect()
}

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let nyc = GeoPoint::new(40.7128, -74.0060);
    group.bench_function("encode", |b| b.iter(|| encode(black_box(&nyc)).unwrap()));
    group.bench_function("bits_for_resolution", |b| {
        b.iter(|| bits_for_resolution(black_box(1_250.0), black_box(40.7)).unwrap())
    });

    group.finish();
}

fn benchmark_covering(c: &mut Criterion) {
    let mut group = c.benchmark_group("covering");
    let generator = CoveringGenerator::new(PartitionKeyMapper::new(16).unwrap());
    let center = GeoPoint::new(40.7128, -74.0060);

    for radius in [500.0, 5_000.0, 50_000.0] {
        let region = Region::Circle(GeoCircle::new(center, radius));
        let bits = bits_for_resolution(radius / 2.0, center.latitude())
            .unwrap()
            .max(16);
        group.bench_with_input(BenchmarkId::new("circle", radius as u64), &region, |b, r| {
            b.iter(|| generator.cover(black_box(r), bits).unwrap())
        });
    }

    let rect = Region::Rectangle(GeoRect::new(
        GeoPoint::new(40.5, -74.3),
        GeoPoint::new(40.9, -73.7),
    ));
    group.bench_function("rectangle", |b| {
        b.iter(|| generator.cover(black_box(&rect), 20).unwrap())
    });

    group.finish();
}

fn benchmark_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("writes");

    let m = manager(16, 4);
    group.bench_function("put_point", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            let lat = 40.7128 + (counter % 1000) as f64 * 0.001;
            let lon = -74.0060 + (counter % 997) as f64 * 0.001;
            counter += 1;
            m.put_point(black_box(PutPointRequest::new(
                GeoPoint::new(lat, lon),
                format!("single:{}", counter),
            )))
            .unwrap()
        })
    });

    group.bench_function("batch_put_100", |b| {
        b.iter(|| m.batch_put_points(black_box(grid(100))).unwrap())
    });

    group.finish();
}

fn benchmark_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let center = GeoPoint::new(40.75, -73.96);

    for workers in [1, 8] {
        let m = manager(16, workers);
        m.batch_put_points(grid(10_000)).unwrap();

        for radius in [1_000.0, 10_000.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("radius_{}_workers", workers), radius as u64),
                &radius,
                |b, &r| {
                    b.iter(|| {
                        m.query_radius(black_box(QueryRadiusRequest::new(center, r)))
                            .unwrap()
                    })
                },
            );
        }

        let rect = GeoRect::new(GeoPoint::new(40.72, -74.00), GeoPoint::new(40.78, -73.92));
        group.bench_function(format!("rectangle_{}_workers", workers), |b| {
            b.iter(|| {
                m.query_rectangle(black_box(QueryRectangleRequest::new(rect)))
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_codec,
    benchmark_covering,
    benchmark_writes,
    benchmark_queries
);
criterion_main!(benches);
