use std::fmt::Display;
use std::str::FromStr;

use common_exception::{GeoQueryError, Result};
use geo::{
    BoundingRect, CoordsIter, Distance, Euclidean, Intersects, LineString, Point, Polygon, Rect,
    Relate, coord,
};

/// The geometry kinds accepted as query or target input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    /// Polygon whose ring does not repeat its first vertex.
    OpenPolygon,
    /// Polygon whose ring ends on its first vertex.
    ClosedPolygon,
}

impl GeometryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::LineString => "linestring",
            GeometryKind::OpenPolygon => "open_polygon",
            GeometryKind::ClosedPolygon => "closed_polygon",
        }
    }

    /// Whether inputs of this kind are delimited into rows of vertices. Point
    /// inputs are one geometry per coordinate tuple.
    pub fn uses_row_delimiters(&self) -> bool {
        !matches!(self, GeometryKind::Point)
    }
}

impl FromStr for GeometryKind {
    type Err = GeoQueryError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "point" => Ok(GeometryKind::Point),
            "linestring" => Ok(GeometryKind::LineString),
            "open_polygon" => Ok(GeometryKind::OpenPolygon),
            "closed_polygon" => Ok(GeometryKind::ClosedPolygon),
            _ => {
                Err(GeoQueryError::invalid_input(format!(
                    "unknown geometry kind '{value}'. Expected: point, linestring, open_polygon, closed_polygon"
                )))
            }
        }
    }
}

impl Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single query or target geometry.
///
/// Open and closed polygons share the same in-memory ring representation; the
/// geometry library closes open rings on construction. They are kept apart so
/// a collection remembers the kind it was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(LineString),
    OpenPolygon(Polygon),
    ClosedPolygon(Polygon),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::OpenPolygon(_) => GeometryKind::OpenPolygon,
            Geometry::ClosedPolygon(_) => GeometryKind::ClosedPolygon,
        }
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Geometry::Point(point) => Shape::Point(point),
            Geometry::LineString(line) => Shape::Line(line),
            Geometry::OpenPolygon(polygon) | Geometry::ClosedPolygon(polygon) => {
                Shape::Area(polygon)
            }
        }
    }
}

impl From<Point> for Geometry {
    fn from(point: Point) -> Self {
        Geometry::Point(point)
    }
}

impl From<LineString> for Geometry {
    fn from(line: LineString) -> Self {
        Geometry::LineString(line)
    }
}

impl From<Polygon> for Geometry {
    fn from(polygon: Polygon) -> Self {
        Geometry::ClosedPolygon(polygon)
    }
}

/// Borrowed view used to pair up the concrete types of two [`Geometry`]
/// values.
enum Shape<'a> {
    Point(&'a Point),
    Line(&'a LineString),
    Area(&'a Polygon),
}

/// Axis-aligned bounding box of a geometry.
///
/// Implementations only return boxes with finite corners; geometries with a
/// NaN or infinite coordinate fail with `InvalidInput`.
pub trait Envelope {
    fn envelope(&self) -> Result<Rect>;
}

fn ensure_finite(geometry: &impl CoordsIter<Scalar = f64>) -> Result<()> {
    match geometry
        .coords_iter()
        .position(|c| !(c.x.is_finite() && c.y.is_finite()))
    {
        Some(vertex) => {
            Err(GeoQueryError::invalid_input(format!(
                "vertex {vertex} has a non-finite coordinate"
            )))
        }
        None => Ok(()),
    }
}

impl Envelope for Point {
    fn envelope(&self) -> Result<Rect> {
        ensure_finite(self)?;
        Ok(self.bounding_rect())
    }
}

impl Envelope for LineString {
    fn envelope(&self) -> Result<Rect> {
        ensure_finite(self)?;
        self.bounding_rect().ok_or(GeoQueryError::EmptyGeometry)
    }
}

impl Envelope for Polygon {
    fn envelope(&self) -> Result<Rect> {
        ensure_finite(self)?;
        self.bounding_rect().ok_or(GeoQueryError::EmptyGeometry)
    }
}

impl Envelope for Geometry {
    fn envelope(&self) -> Result<Rect> {
        match self.shape() {
            Shape::Point(point) => point.envelope(),
            Shape::Line(line) => line.envelope(),
            Shape::Area(polygon) => polygon.envelope(),
        }
    }
}

/// The exact predicates the query engine applies to index candidates.
///
/// `comparable_distance` must be strictly monotone in `distance` and share
/// units with [`box_comparable_distance`], since the nearest search compares
/// the two directly. Both are squared Euclidean distances.
pub trait SpatialPredicates<Rhs: ?Sized = Self> {
    fn intersects(&self, other: &Rhs) -> bool;

    /// True when the geometries share boundary points but no interior points.
    fn touches(&self, other: &Rhs) -> bool;

    fn distance(&self, other: &Rhs) -> f64;

    fn comparable_distance(&self, other: &Rhs) -> f64 {
        let distance = self.distance(other);
        distance * distance
    }
}

impl SpatialPredicates for Point {
    fn intersects(&self, other: &Point) -> bool {
        Intersects::intersects(self, other)
    }

    fn touches(&self, other: &Point) -> bool {
        self.relate(other).is_touches()
    }

    fn distance(&self, other: &Point) -> f64 {
        Euclidean.distance(self, other)
    }

    fn comparable_distance(&self, other: &Point) -> f64 {
        let delta = self.0 - other.0;
        delta.x * delta.x + delta.y * delta.y
    }
}

macro_rules! impl_spatial_predicates {
    ($($lhs:ty => $rhs:ty),* $(,)?) => {
        $(
            impl SpatialPredicates<$rhs> for $lhs {
                fn intersects(&self, other: &$rhs) -> bool {
                    Intersects::intersects(self, other)
                }

                fn touches(&self, other: &$rhs) -> bool {
                    self.relate(other).is_touches()
                }

                fn distance(&self, other: &$rhs) -> f64 {
                    Euclidean.distance(self, other)
                }
            }
        )*
    };
}

impl_spatial_predicates!(
    Point => LineString,
    Point => Polygon,
    LineString => Point,
    LineString => LineString,
    LineString => Polygon,
    Polygon => Point,
    Polygon => LineString,
    Polygon => Polygon,
);

/// Expands to a match over both operands' concrete types, calling the same
/// [`SpatialPredicates`] method on the resolved pair.
macro_rules! dispatch_pair {
    ($lhs:expr, $rhs:expr, $method:ident) => {
        match ($lhs.shape(), $rhs.shape()) {
            (Shape::Point(a), Shape::Point(b)) => SpatialPredicates::$method(a, b),
            (Shape::Point(a), Shape::Line(b)) => SpatialPredicates::$method(a, b),
            (Shape::Point(a), Shape::Area(b)) => SpatialPredicates::$method(a, b),
            (Shape::Line(a), Shape::Point(b)) => SpatialPredicates::$method(a, b),
            (Shape::Line(a), Shape::Line(b)) => SpatialPredicates::$method(a, b),
            (Shape::Line(a), Shape::Area(b)) => SpatialPredicates::$method(a, b),
            (Shape::Area(a), Shape::Point(b)) => SpatialPredicates::$method(a, b),
            (Shape::Area(a), Shape::Line(b)) => SpatialPredicates::$method(a, b),
            (Shape::Area(a), Shape::Area(b)) => SpatialPredicates::$method(a, b),
        }
    };
}

impl SpatialPredicates for Geometry {
    fn intersects(&self, other: &Geometry) -> bool {
        dispatch_pair!(self, other, intersects)
    }

    fn touches(&self, other: &Geometry) -> bool {
        dispatch_pair!(self, other, touches)
    }

    fn distance(&self, other: &Geometry) -> f64 {
        dispatch_pair!(self, other, distance)
    }

    fn comparable_distance(&self, other: &Geometry) -> f64 {
        dispatch_pair!(self, other, comparable_distance)
    }
}

/// Grow `rect` by `radius` on every side.
pub fn expand_box(rect: &Rect, radius: f64) -> Rect {
    let min = rect.min();
    let max = rect.max();
    Rect::new(
        coord! { x: min.x - radius, y: min.y - radius },
        coord! { x: max.x + radius, y: max.y + radius },
    )
}

/// Squared Euclidean gap between two boxes, zero when they intersect.
///
/// This lower-bounds the comparable distance between any two geometries the
/// boxes enclose.
pub fn box_comparable_distance(a: &Rect, b: &Rect) -> f64 {
    let dx = axis_gap(a.min().x, a.max().x, b.min().x, b.max().x);
    let dy = axis_gap(a.min().y, a.max().y, b.min().y, b.max().y);
    dx * dx + dy * dy
}

pub(crate) fn axis_gap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
    if a_max < b_min {
        b_min - a_max
    } else if b_max < a_min {
        a_min - b_max
    } else {
        0.0
    }
}
