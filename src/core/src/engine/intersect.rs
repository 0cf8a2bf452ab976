use common_exception::Result;
use tracing::trace;

use super::GeoQuery;
use crate::geometry::{Envelope, SpatialPredicates};

impl<T> GeoQuery<T> {
    /// Targets intersecting `query`, ascending.
    ///
    /// Candidates whose boxes intersect the query box are refined with the
    /// exact predicate. With `require_full_overlap`, targets that only touch
    /// the query are dropped as well.
    pub fn intersecting<Q>(&self, query: &Q, require_full_overlap: bool) -> Result<Vec<u32>>
    where
        Q: Envelope + SpatialPredicates<T>,
    {
        let query_box = query.envelope()?;
        let mut candidates = self.index.query_intersecting(&query_box);
        let num_candidates = candidates.len();

        candidates.retain(|&index| {
            let target = &self.targets[index as usize];
            query.intersects(target) && !(require_full_overlap && query.touches(target))
        });
        candidates.sort_unstable();

        trace!(
            "intersect query kept {} of {} box candidates",
            candidates.len(),
            num_candidates
        );
        Ok(candidates)
    }
}
