use common_exception::Result;
use tracing::debug;

use crate::engine::GeoQuery;
use crate::geometry::{Geometry, GeometryKind};
use crate::input::GeometryInput;
use crate::option::GeoQueryOptions;
use crate::result::{BatchResult, NearestResult};

/// Query entry point for geometry batches of any kind.
///
/// Targets and queries arrive as [`GeometryInput`] and are dispatched on
/// their kind tag, so callers holding flat arrays never name a concrete
/// geometry type.
pub struct QueryContext {
    inner: GeoQuery<Geometry>,
    target_kind: GeometryKind,
}

impl QueryContext {
    pub fn try_new(targets: &GeometryInput) -> Result<Self> {
        Self::try_new_with_options(targets, GeoQueryOptions::default())
    }

    pub fn try_new_with_options(targets: &GeometryInput, options: GeoQueryOptions) -> Result<Self> {
        let inner = GeoQuery::try_new_with_options(targets.to_geometries(), options)?;
        debug!(
            "query context ready with {} {} targets",
            inner.len(),
            targets.kind()
        );
        Ok(Self {
            inner,
            target_kind: targets.kind(),
        })
    }

    pub fn target_kind(&self) -> GeometryKind {
        self.target_kind
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn engine(&self) -> &GeoQuery<Geometry> {
        &self.inner
    }

    pub fn intersects_with(&self, queries: &GeometryInput) -> Result<BatchResult> {
        self.inner.intersects_with(&queries.to_geometries())
    }

    pub fn overlaps_with(&self, queries: &GeometryInput) -> Result<BatchResult> {
        self.inner.overlaps_with(&queries.to_geometries())
    }

    pub fn nearest_to(&self, queries: &GeometryInput) -> Result<NearestResult> {
        self.inner.nearest_to(&queries.to_geometries())
    }

    pub fn within_distance_of(&self, queries: &GeometryInput, radius: f64) -> Result<BatchResult> {
        self.inner
            .within_distance_of(&queries.to_geometries(), radius)
    }
}
