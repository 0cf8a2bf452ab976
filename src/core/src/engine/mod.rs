mod intersect;
mod nearest;
mod radius;

use std::time::Instant;

use common_exception::{GeoQueryError, Result};
use geo::Rect;
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::debug;

use crate::geometry::{Envelope, SpatialPredicates};
use crate::index::SpatialIndex;
use crate::option::GeoQueryOptions;
use crate::result::{BatchResult, NearestResult};

/// Spatial relationship queries against an indexed target collection.
///
/// The target collection and its index are built once and never mutated by
/// queries, so a `GeoQuery` can be shared between threads. Every answer
/// refers to targets by their position in the collection passed to
/// [`GeoQuery::try_new`].
pub struct GeoQuery<T> {
    targets: Vec<T>,
    index: SpatialIndex,
    options: GeoQueryOptions,
    pool: Option<ThreadPool>,
}

impl<T: Envelope> GeoQuery<T> {
    pub fn try_new(targets: Vec<T>) -> Result<Self> {
        Self::try_new_with_options(targets, GeoQueryOptions::default())
    }

    pub fn try_new_with_options(targets: Vec<T>, options: GeoQueryOptions) -> Result<Self> {
        options.validate()?;

        let boxes = targets
            .iter()
            .enumerate()
            .map(|(position, target)| {
                let index = u32::try_from(position).map_err(|_| {
                    GeoQueryError::invalid_input("target collection exceeds u32 indices")
                })?;
                let rect = target.envelope().map_err(|err| {
                    GeoQueryError::invalid_input(format!("target {position}: {err}"))
                })?;
                if !is_finite_rect(&rect) {
                    return Err(GeoQueryError::invalid_input(format!(
                        "target {position} has a non-finite bounding box"
                    )));
                }
                Ok((rect, index))
            })
            .collect::<Result<Vec<_>>>()?;
        let index = SpatialIndex::bulk_load(boxes);

        let pool = if options.parallel && options.num_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.num_threads)
                .thread_name(|i| format!("geoquery-worker-{i}"))
                .build()
                .map_err(|err| GeoQueryError::ThreadPool(err.to_string()))?;
            Some(pool)
        } else {
            None
        };

        debug!(
            "built spatial index over {} targets, options: {:?}",
            index.len(),
            options
        );
        Ok(Self {
            targets,
            index,
            options,
            pool,
        })
    }
}

impl<T> GeoQuery<T> {
    pub fn targets(&self) -> &[T] {
        &self.targets
    }

    pub fn options(&self) -> &GeoQueryOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<T: Sync> GeoQuery<T> {
    /// Targets intersecting each query, one row per query.
    pub fn intersects_with<Q>(&self, queries: &[Q]) -> Result<BatchResult>
    where
        Q: Envelope + SpatialPredicates<T> + Sync,
    {
        self.intersect_batch(queries, false)
    }

    /// Targets sharing interior points with each query. Targets that only
    /// touch a query's boundary are left out.
    pub fn overlaps_with<Q>(&self, queries: &[Q]) -> Result<BatchResult>
    where
        Q: Envelope + SpatialPredicates<T> + Sync,
    {
        self.intersect_batch(queries, true)
    }

    fn intersect_batch<Q>(&self, queries: &[Q], require_full_overlap: bool) -> Result<BatchResult>
    where
        Q: Envelope + SpatialPredicates<T> + Sync,
    {
        let start = Instant::now();
        let rows = self.run_batch(queries, |query| self.intersecting(query, require_full_overlap))?;
        let result = BatchResult::from_rows(rows)?;
        debug!(
            "intersect batch of {} queries (full overlap: {}) matched {} targets in {:?}",
            queries.len(),
            require_full_overlap,
            result.indices().len(),
            start.elapsed()
        );
        Ok(result)
    }

    /// The nearest target of each query, in query order.
    pub fn nearest_to<Q>(&self, queries: &[Q]) -> Result<NearestResult>
    where
        Q: Envelope + SpatialPredicates<T> + Sync,
    {
        if self.targets.is_empty() {
            return Err(GeoQueryError::EmptyTargetSet);
        }
        let start = Instant::now();
        let matches = self.run_batch(queries, |query| self.nearest(query))?;
        debug!(
            "nearest batch of {} queries in {:?}",
            queries.len(),
            start.elapsed()
        );
        Ok(NearestResult::from_matches(matches))
    }

    /// Targets within `radius` of each query, one row per query.
    pub fn within_distance_of<Q>(&self, queries: &[Q], radius: f64) -> Result<BatchResult>
    where
        Q: Envelope + SpatialPredicates<T> + Sync,
    {
        validate_radius(radius)?;
        let start = Instant::now();
        let rows = self.run_batch(queries, |query| self.within_distance(query, radius))?;
        let result = BatchResult::from_rows(rows)?;
        debug!(
            "radius batch of {} queries (radius: {}) matched {} targets in {:?}",
            queries.len(),
            radius,
            result.indices().len(),
            start.elapsed()
        );
        Ok(result)
    }

    /// Answer every query independently, keeping query order. Large batches
    /// run on the worker pool when parallelism is enabled.
    fn run_batch<Q, R, F>(&self, queries: &[Q], query_fn: F) -> Result<Vec<R>>
    where
        Q: Sync,
        R: Send,
        F: Fn(&Q) -> Result<R> + Sync + Send,
    {
        if !self.options.parallel || queries.len() < self.options.parallel_threshold {
            return queries.iter().map(query_fn).collect();
        }

        let run = || queries.par_iter().map(&query_fn).collect::<Result<Vec<_>>>();
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

fn is_finite_rect(rect: &Rect) -> bool {
    let (min, max) = (rect.min(), rect.max());
    [min.x, min.y, max.x, max.y].iter().all(|v| v.is_finite())
}

pub(crate) fn validate_radius(radius: f64) -> Result<()> {
    if radius.is_nan() || radius < 0.0 {
        return Err(GeoQueryError::invalid_input(format!(
            "radius must be a non-negative number, got {radius}"
        )));
    }
    Ok(())
}
