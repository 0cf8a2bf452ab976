use common_exception::Result;
use tracing::trace;

use super::{GeoQuery, validate_radius};
use crate::geometry::{Envelope, SpatialPredicates, expand_box};

impl<T> GeoQuery<T> {
    /// Targets whose exact distance to `query` is at most `radius`, ascending.
    pub fn within_distance<Q>(&self, query: &Q, radius: f64) -> Result<Vec<u32>>
    where
        Q: Envelope + SpatialPredicates<T>,
    {
        validate_radius(radius)?;
        let search_box = expand_box(&query.envelope()?, radius);
        let mut candidates = self.index.query_intersecting(&search_box);
        let num_candidates = candidates.len();

        candidates.retain(|&index| query.distance(&self.targets[index as usize]) <= radius);
        candidates.sort_unstable();

        trace!(
            "radius query ({}) kept {} of {} box candidates",
            radius,
            candidates.len(),
            num_candidates
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use common_exception::GeoQueryError;
    use geo::{Point, Polygon, polygon};

    use crate::engine::GeoQuery;

    fn grid_points() -> Vec<Point> {
        (0..25)
            .map(|i| Point::new(f64::from(i % 5), f64::from(i / 5)))
            .collect()
    }

    fn around_twelve() -> Polygon {
        polygon![
            (x: 1.9, y: 1.9),
            (x: 2.1, y: 1.9),
            (x: 2.1, y: 2.1),
            (x: 1.9, y: 2.1),
        ]
    }

    #[test]
    fn test_radius_filters_box_corners() {
        let engine = GeoQuery::try_new(grid_points()).unwrap();
        let query = around_twelve();
        assert_eq!(engine.within_distance(&query, 0.0).unwrap(), vec![12]);
        // Diagonal neighbours fall inside the expanded box but not the radius.
        assert_eq!(engine.within_distance(&query, 1.0).unwrap(), vec![
            7, 11, 12, 13, 17
        ]);
    }

    #[test]
    fn test_invalid_radius() {
        let engine = GeoQuery::try_new(grid_points()).unwrap();
        for radius in [-1.0, f64::NAN] {
            assert!(matches!(
                engine.within_distance(&Point::new(0.0, 0.0), radius),
                Err(GeoQueryError::InvalidInput(_))
            ));
        }
    }
}
