use common_exception::{GeoQueryError, Result};
use tracing::trace;

use super::GeoQuery;
use crate::geometry::{Envelope, SpatialPredicates};
use crate::result::NearestMatch;

impl<T> GeoQuery<T> {
    /// The target nearest to `query` with its exact distance.
    ///
    /// Candidates are pulled from the index in order of box distance, which
    /// never exceeds the exact distance. Once the next candidate's box is at
    /// least as far as the best exact distance seen so far, no remaining
    /// target can be closer. The candidate window doubles whenever it runs
    /// out before that point is reached. Ties keep the first candidate in box
    /// order.
    pub fn nearest<Q>(&self, query: &Q) -> Result<NearestMatch>
    where
        Q: Envelope + SpatialPredicates<T>,
    {
        if self.targets.is_empty() {
            return Err(GeoQueryError::EmptyTargetSet);
        }

        let query_box = query.envelope()?;
        let mut window = self.options.nearest_window;
        let mut visited = 0;
        let mut best: Option<(u32, f64)> = None;

        loop {
            let candidates = self.index.nearest_boxes(&query_box, window);
            let mut proven = false;
            for candidate in candidates.iter().skip(visited) {
                if let Some((_, best_distance)) = best
                    && candidate.box_distance >= best_distance
                {
                    proven = true;
                    break;
                }
                let distance =
                    query.comparable_distance(&self.targets[candidate.index as usize]);
                if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                    best = Some((candidate.index, distance));
                }
                visited += 1;
            }

            if proven || visited >= self.targets.len() {
                break;
            }
            window = window.saturating_mul(2);
            trace!("nearest query widened its window to {}", window);
        }

        let (index, _) = best.ok_or(GeoQueryError::EmptyTargetSet)?;
        trace!("nearest query examined {} candidates", visited);
        Ok(NearestMatch {
            index,
            distance: query.distance(&self.targets[index as usize]),
        })
    }
}
