use anyhow::Result;
use geo::{LineString, Point, Polygon};
use geoquery::{GeoQuery, GeoQueryOptions, Geometry, SpatialPredicates};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EXTENT: f64 = 50.0;

fn random_point(rng: &mut StdRng) -> (f64, f64) {
    (rng.random_range(0.0..EXTENT), rng.random_range(0.0..EXTENT))
}

fn random_geometry(rng: &mut StdRng) -> Geometry {
    let (x, y) = random_point(rng);
    match rng.random_range(0..3) {
        0 => Geometry::Point(Point::new(x, y)),
        1 => {
            let (dx, dy) = (rng.random_range(-5.0..5.0), rng.random_range(-5.0..5.0));
            Geometry::LineString(LineString::from(vec![(x, y), (x + dx, y + dy)]))
        }
        _ => {
            let size = rng.random_range(0.1..4.0);
            let ring = LineString::from(vec![(x, y), (x + size, y), (x + size / 2.0, y + size)]);
            Geometry::ClosedPolygon(Polygon::new(ring, Vec::new()))
        }
    }
}

fn random_geometries(seed: u64, count: usize) -> Vec<Geometry> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| random_geometry(&mut rng)).collect()
}

fn sequential() -> GeoQueryOptions {
    GeoQueryOptions::default().with_parallel(false)
}

#[test]
fn test_nearest_matches_brute_force() -> Result<()> {
    common_telemetry::init_test_logging();
    let targets = random_geometries(7, 500);
    let queries = random_geometries(8, 200);
    let engine = GeoQuery::try_new_with_options(targets.clone(), sequential())?;

    let nearest = engine.nearest_to(&queries)?;
    assert_eq!(nearest.len(), queries.len());
    for (query, found) in queries.iter().zip(nearest.iter()) {
        let best = targets
            .iter()
            .map(|target| query.distance(target))
            .fold(f64::INFINITY, f64::min);
        assert!(
            (found.distance - best).abs() < 1e-9,
            "nearest distance {} exceeds brute force {}",
            found.distance,
            best
        );
        let reported = query.distance(&targets[found.index as usize]);
        assert!((reported - found.distance).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_nearest_is_independent_of_initial_window() -> Result<()> {
    let targets = random_geometries(11, 300);
    let queries = random_geometries(12, 100);
    let narrow = GeoQuery::try_new_with_options(
        targets.clone(),
        sequential().with_nearest_window(1),
    )?;
    let wide = GeoQuery::try_new_with_options(targets, sequential().with_nearest_window(512))?;

    let narrow = narrow.nearest_to(&queries)?;
    let wide = wide.nearest_to(&queries)?;
    for (a, b) in narrow.iter().zip(wide.iter()) {
        assert!((a.distance - b.distance).abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn test_intersect_matches_brute_force() -> Result<()> {
    let targets = random_geometries(21, 400);
    let queries = random_geometries(22, 100);
    let engine = GeoQuery::try_new_with_options(targets.clone(), sequential())?;

    let result = engine.intersects_with(&queries)?;
    for (query, row) in queries.iter().zip(result.iter()) {
        let expected = (0..targets.len() as u32)
            .filter(|&i| query.intersects(&targets[i as usize]))
            .collect::<Vec<_>>();
        assert_eq!(row, &expected[..]);
    }
    Ok(())
}

#[test]
fn test_overlap_is_subset_of_intersect() -> Result<()> {
    let targets = random_geometries(31, 400);
    let queries = random_geometries(32, 150);
    let engine = GeoQuery::try_new(targets)?;

    let intersects = engine.intersects_with(&queries)?;
    let overlaps = engine.overlaps_with(&queries)?;
    for (overlap, intersect) in overlaps.iter().zip(intersects.iter()) {
        assert!(overlap.iter().all(|i| intersect.binary_search(i).is_ok()));
    }
    Ok(())
}

#[test]
fn test_radius_is_monotone() -> Result<()> {
    let targets = random_geometries(41, 400);
    let queries = random_geometries(42, 100);
    let engine = GeoQuery::try_new(targets.clone())?;

    let mut previous = engine.within_distance_of(&queries, 0.0)?;
    for radius in [0.5, 1.0, 2.5, 5.0] {
        let current = engine.within_distance_of(&queries, radius)?;
        for ((query, smaller), larger) in queries.iter().zip(previous.iter()).zip(current.iter()) {
            assert!(smaller.iter().all(|i| larger.binary_search(i).is_ok()));
            assert!(
                larger
                    .iter()
                    .all(|&i| query.distance(&targets[i as usize]) <= radius)
            );
        }
        previous = current;
    }
    Ok(())
}

#[test]
fn test_batch_results_are_well_formed() -> Result<()> {
    let targets = random_geometries(51, 300);
    let queries = random_geometries(52, 120);
    let engine = GeoQuery::try_new(targets)?;

    for result in [
        engine.intersects_with(&queries)?,
        engine.overlaps_with(&queries)?,
        engine.within_distance_of(&queries, 3.0)?,
    ] {
        let row_ptr = result.row_ptr();
        assert_eq!(row_ptr.len(), queries.len() + 1);
        assert_eq!(row_ptr[0], 0);
        assert_eq!(*row_ptr.last().unwrap() as usize, result.indices().len());
        assert!(row_ptr.windows(2).all(|pair| pair[0] <= pair[1]));
        for row in result.iter() {
            assert!(row.windows(2).all(|pair| pair[0] < pair[1]));
            assert!(row.iter().all(|&i| (i as usize) < engine.len()));
        }
    }
    Ok(())
}

#[test]
fn test_queries_are_idempotent() -> Result<()> {
    let engine = GeoQuery::try_new(random_geometries(61, 200))?;
    let queries = random_geometries(62, 50);

    assert_eq!(engine.intersects_with(&queries)?, engine.intersects_with(&queries)?);
    assert_eq!(engine.nearest_to(&queries)?, engine.nearest_to(&queries)?);
    assert_eq!(
        engine.within_distance_of(&queries, 2.0)?,
        engine.within_distance_of(&queries, 2.0)?
    );
    Ok(())
}

#[test]
fn test_parallel_matches_sequential() -> Result<()> {
    let targets = random_geometries(71, 500);
    let queries = random_geometries(72, 600);
    let serial = GeoQuery::try_new_with_options(targets.clone(), sequential())?;
    let pooled = GeoQuery::try_new_with_options(
        targets.clone(),
        GeoQueryOptions::default()
            .with_parallel_threshold(1)
            .with_num_threads(3),
    )?;
    let global = GeoQuery::try_new(targets)?;

    for parallel in [&pooled, &global] {
        assert_eq!(serial.intersects_with(&queries)?, parallel.intersects_with(&queries)?);
        assert_eq!(serial.overlaps_with(&queries)?, parallel.overlaps_with(&queries)?);
        assert_eq!(serial.nearest_to(&queries)?, parallel.nearest_to(&queries)?);
        assert_eq!(
            serial.within_distance_of(&queries, 1.5)?,
            parallel.within_distance_of(&queries, 1.5)?
        );
    }
    Ok(())
}
