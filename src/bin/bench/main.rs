use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use geoquery::{GeoQueryOptions, GeometryInput, GeometryKind, QueryContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tikv_jemallocator::Jemalloc;
use tracing::info;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const DEFAULT_GRID_SIZE: &str = "100";
const DEFAULT_RUNS: &str = "10";
const RADIUS: f64 = 1.0;
const RANDOM_SEED: u64 = 42;

fn env_usize(name: &str, default: &str) -> Result<usize> {
    std::env::var(name)
        .unwrap_or(default.to_owned())
        .parse()
        .with_context(|| format!("{name} must be a non-negative integer"))
}

fn grid_points(size: usize) -> Result<GeometryInput> {
    let coords = (0..size)
        .flat_map(|x| (0..size).flat_map(move |y| [x as f64, y as f64]))
        .collect();
    Ok(GeometryInput::new(GeometryKind::Point, coords, None, 2)?)
}

fn random_points(count: usize, extent: f64) -> Result<GeometryInput> {
    let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
    let coords = (0..count * 2)
        .map(|_| rng.random_range(-1.0..extent + 1.0))
        .collect();
    Ok(GeometryInput::new(GeometryKind::Point, coords, None, 2)?)
}

fn bench<F>(name: &str, runs: usize, mut run: F) -> Result<()>
where
    F: FnMut() -> Result<usize>,
{
    info!("-- {} --", name);
    let mut total = Duration::ZERO;
    for i in 0..runs {
        let start = Instant::now();
        let matches = run()?;
        let elapsed = start.elapsed();
        total += elapsed;
        info!("run {}: {:?} ({} matches)", i, elapsed, matches);
    }
    if let Some(avg) = average(total, runs) {
        info!("avg: {:?}", avg);
    }
    Ok(())
}

fn average(total: Duration, runs: usize) -> Option<Duration> {
    (runs > 0).then(|| total.div_f64(runs as f64))
}

fn main() -> Result<()> {
    let _guards = common_telemetry::init_logging();

    let grid_size = env_usize("GEOQUERY_BENCH_GRID", DEFAULT_GRID_SIZE)?;
    let runs = env_usize("GEOQUERY_BENCH_RUNS", DEFAULT_RUNS)?;
    let options = GeoQueryOptions::from_env()?;
    for entry in options.entries() {
        info!("{} = {} ({})", entry.key, entry.value, entry.description);
    }

    let grid = grid_points(grid_size)?;
    let random = random_points(grid.len(), grid_size as f64)?;
    info!("testing runtime for {} x {} grid", grid_size, grid_size);

    // Building the index is part of every run.
    bench("nearest_to", runs, || {
        let ctx = QueryContext::try_new_with_options(&grid, options.clone())?;
        Ok(ctx.nearest_to(&grid)?.len())
    })?;
    bench("within_distance_of", runs, || {
        let ctx = QueryContext::try_new_with_options(&grid, options.clone())?;
        Ok(ctx.within_distance_of(&grid, RADIUS)?.indices().len())
    })?;
    bench("nearest_to (random queries)", runs, || {
        let ctx = QueryContext::try_new_with_options(&grid, options.clone())?;
        Ok(ctx.nearest_to(&random)?.len())
    })?;
    bench("intersects_with (random queries)", runs, || {
        let ctx = QueryContext::try_new_with_options(&grid, options.clone())?;
        Ok(ctx.intersects_with(&random)?.indices().len())
    })?;

    Ok(())
}
