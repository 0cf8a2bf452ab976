mod context;
mod engine;
mod geometry;
mod index;
mod input;
mod option;
mod result;

pub use common_exception::{GeoQueryError, Result};
pub use context::QueryContext;
pub use engine::GeoQuery;
pub use geometry::{
    Envelope, Geometry, GeometryKind, SpatialPredicates, box_comparable_distance, expand_box,
};
pub use index::{IndexCandidate, IndexParams, NODE_CAPACITY, SpatialIndex};
pub use input::GeometryInput;
pub use option::{ConfigEntry, GeoQueryOptions};
pub use result::{BatchResult, NearestMatch, NearestResult};
