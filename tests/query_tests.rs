//! Query results checked against brute force over the same data.

mod common;

use geokv::compute::spatial::distance_meters;
use geokv::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::Arc;

struct Fixture {
    store: Arc<MemoryStore>,
    points: Vec<(String, GeoPoint)>,
}

fn random_fixture(seed: u64, count: usize, config: GeoConfig) -> (Fixture, GeoDataManager) {
    common::init_logging();
    let mut rng = StdRng::seed_from_u64(seed);
    let store = Arc::new(MemoryStore::new());
    let manager = GeoDataManager::builder()
        .store(store.clone())
        .config(config)
        .create_table_if_missing(true)
        .build()
        .unwrap();

    let points: Vec<(String, GeoPoint)> = (0..count)
        .map(|i| {
            let p = GeoPoint::new(rng.gen_range(30.0..50.0), rng.gen_range(-10.0..10.0));
            (format!("pt-{:05}", i), p)
        })
        .collect();
    let requests = points
        .iter()
        .map(|(key, p)| PutPointRequest::new(*p, key.clone()))
        .collect();
    manager.batch_put_points(requests).unwrap();

    (Fixture { store, points }, manager)
}

fn keys(records: &[GeoRecord]) -> BTreeSet<String> {
    records.iter().map(|r| r.range_key.clone()).collect()
}

#[test]
fn test_radius_matches_brute_force() {
    let (fixture, manager) = random_fixture(7, 2_000, GeoConfig::new("geo"));
    let mut rng = StdRng::seed_from_u64(11);

    for _ in 0..25 {
        let center = GeoPoint::new(rng.gen_range(32.0..48.0), rng.gen_range(-8.0..8.0));
        let radius = rng.gen_range(1_000.0..300_000.0);

        let expected: BTreeSet<String> = fixture
            .points
            .iter()
            .filter(|(_, p)| distance_meters(&center, p) <= radius)
            .map(|(k, _)| k.clone())
            .collect();

        let result = manager
            .query_radius(QueryRadiusRequest::new(center, radius))
            .unwrap();
        assert_eq!(keys(&result.records), expected, "center {} r={}", center, radius);
        assert_eq!(result.records.len(), expected.len(), "duplicates returned");
        assert_eq!(result.stats.matched, expected.len());
        assert!(result.stats.candidates >= result.stats.matched);
    }
}

#[test]
fn test_rectangle_matches_brute_force() {
    let (fixture, manager) = random_fixture(21, 2_000, GeoConfig::new("geo"));
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..25 {
        let lat = rng.gen_range(30.0..48.0);
        let lon = rng.gen_range(-10.0..8.0);
        let rect = GeoRect::new(
            GeoPoint::new(lat, lon),
            GeoPoint::new(lat + rng.gen_range(0.01..2.0), lon + rng.gen_range(0.01..2.0)),
        );

        let expected: BTreeSet<String> = fixture
            .points
            .iter()
            .filter(|(_, p)| rect.contains(p))
            .map(|(k, _)| k.clone())
            .collect();

        let result = manager
            .query_rectangle(QueryRectangleRequest::new(rect))
            .unwrap();
        assert_eq!(keys(&result.records), expected, "rect {:?}", rect);
        assert_eq!(result.records.len(), expected.len());
    }
}

#[test]
fn test_no_duplicates_with_coarse_partitions() {
    let config = GeoConfig::new("geo").with_hash_key_length(4);
    let (fixture, manager) = random_fixture(3, 500, config);

    let result = manager
        .query_radius(QueryRadiusRequest::new(GeoPoint::new(40.0, 0.0), 2_000_000.0))
        .unwrap();
    let unique = keys(&result.records);
    assert_eq!(unique.len(), result.records.len());
    assert_eq!(unique.len(), fixture.points.len());
}

#[test]
fn test_results_independent_of_concurrency() {
    let (fixture, _) = random_fixture(99, 1_000, GeoConfig::new("geo"));
    let store: Arc<dyn KeyValueStore> = fixture.store.clone();

    let serial = GeoDataManager::new(
        Arc::clone(&store),
        GeoConfig::new("geo").with_max_scan_concurrency(1),
    )
    .unwrap();
    let parallel = GeoDataManager::new(
        store,
        GeoConfig::new("geo").with_max_scan_concurrency(8),
    )
    .unwrap();

    let request = QueryRadiusRequest::new(GeoPoint::new(40.0, 0.0), 250_000.0);
    let a = serial.query_radius(request.clone()).unwrap();
    let b = parallel.query_radius(request).unwrap();
    assert!(a.stats.cells > 1);
    assert_eq!(a.records, b.records);
    assert_eq!(a.stats, b.stats);
}

#[test]
fn test_radius_boundary_is_inclusive() {
    let (_, manager) = random_fixture(1, 0, GeoConfig::new("geo"));
    let center = GeoPoint::new(45.0, 5.0);
    let edge = GeoPoint::new(45.01, 5.013);
    manager.put_point(PutPointRequest::new(edge, "edge")).unwrap();

    let radius = distance_meters(&center, &edge);
    let hit = manager
        .query_radius(QueryRadiusRequest::new(center, radius))
        .unwrap();
    assert_eq!(keys(&hit.records), BTreeSet::from(["edge".to_string()]));
    assert_eq!(hit.records[0].distance_meters, Some(radius));

    let miss = manager
        .query_radius(QueryRadiusRequest::new(center, radius * 0.999))
        .unwrap();
    assert!(miss.is_empty());
}

#[test]
fn test_rectangle_edges_are_inclusive() {
    let (_, manager) = random_fixture(1, 0, GeoConfig::new("geo"));
    let rect = GeoRect::new(GeoPoint::new(10.0, 20.0), GeoPoint::new(11.0, 21.0));
    for (key, lat, lon) in [
        ("sw", 10.0, 20.0),
        ("ne", 11.0, 21.0),
        ("n-edge", 11.0, 20.5),
        ("outside", 11.000001, 20.5),
    ] {
        manager
            .put_point(PutPointRequest::new(GeoPoint::new(lat, lon), key))
            .unwrap();
    }

    let result = manager
        .query_rectangle(QueryRectangleRequest::new(rect))
        .unwrap();
    let found: Vec<_> = result.records.iter().map(|r| r.range_key.as_str()).collect();
    assert_eq!(found, vec!["n-edge", "ne", "sw"]);
}

#[test]
fn test_limit_applies_after_ordering() {
    let (fixture, manager) = random_fixture(42, 800, GeoConfig::new("geo"));
    let center = GeoPoint::new(40.0, 0.0);

    let full = manager
        .query_radius(QueryRadiusRequest::new(center, 400_000.0).sorted_by_distance())
        .unwrap();
    assert!(full.len() > 10);
    let top = manager
        .query_radius(
            QueryRadiusRequest::new(center, 400_000.0)
                .sorted_by_distance()
                .with_limit(10),
        )
        .unwrap();
    assert_eq!(top.records, full.records[..10].to_vec());

    let nearest = fixture
        .points
        .iter()
        .map(|(_, p)| distance_meters(&center, p))
        .fold(f64::INFINITY, f64::min);
    assert_eq!(top.records[0].distance_meters, Some(nearest));

    let by_key = manager
        .query_radius(QueryRadiusRequest::new(center, 400_000.0).with_limit(5))
        .unwrap();
    let mut sorted = keys(&full.records).into_iter().collect::<Vec<_>>();
    sorted.truncate(5);
    let got: Vec<_> = by_key.records.iter().map(|r| r.range_key.clone()).collect();
    assert_eq!(got, sorted);
}

#[test]
fn test_empty_region_returns_nothing() {
    let (_, manager) = random_fixture(8, 200, GeoConfig::new("geo"));
    let result = manager
        .query_radius(QueryRadiusRequest::new(GeoPoint::new(-60.0, 120.0), 10_000.0))
        .unwrap();
    assert!(result.is_empty());
    assert!(result.stats.cells >= 1);
}
