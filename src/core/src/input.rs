use arrow::array::{Array, Float64Array, UInt32Array};
use common_exception::{GeoQueryError, Result};
use geo::{Coord, LineString, Point, Polygon};

use crate::geometry::{Geometry, GeometryKind};

/// A batch of geometries in flat array form.
///
/// `coords` holds `dimension` values per vertex; only x and y take part in
/// queries. For every kind except points, `row_ptr` delimits the vertices of
/// each geometry: geometry `i` owns vertices `row_ptr[i]..row_ptr[i + 1]`.
/// Points are one geometry per vertex and carry no delimiters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInput {
    kind: GeometryKind,
    coords: Vec<f64>,
    row_ptr: Option<Vec<u32>>,
    dimension: usize,
}

impl GeometryInput {
    /// Validate and wrap a flat geometry batch.
    ///
    /// Point batches accept no delimiters or the trivial `[0]`. The other
    /// kinds require `len + 1` non-decreasing delimiters starting at zero and
    /// ending at the vertex count, and every row needs at least one vertex.
    /// Closed polygon rows must end on their first vertex. Only finite x and y
    /// values are accepted.
    pub fn new(
        kind: GeometryKind, coords: Vec<f64>, row_ptr: Option<Vec<u32>>, dimension: usize,
    ) -> Result<Self> {
        if !(2..=3).contains(&dimension) {
            return Err(GeoQueryError::invalid_input(format!(
                "dimension must be 2 or 3, got {dimension}"
            )));
        }
        if coords.len() % dimension != 0 {
            return Err(GeoQueryError::invalid_input(format!(
                "{} coordinate values do not divide into vertices of dimension {dimension}",
                coords.len()
            )));
        }
        let num_vertices = coords.len() / dimension;
        if let Some(vertex) = (0..num_vertices).find(|vertex| {
            coords[vertex * dimension..vertex * dimension + 2]
                .iter()
                .any(|value| !value.is_finite())
        }) {
            return Err(GeoQueryError::invalid_input(format!(
                "vertex {vertex} has a non-finite coordinate"
            )));
        }

        let row_ptr = if kind.uses_row_delimiters() {
            let Some(row_ptr) = row_ptr else {
                return Err(GeoQueryError::invalid_input(format!(
                    "{kind} input requires row delimiters"
                )));
            };
            validate_row_ptr(&row_ptr, num_vertices)?;
            Some(row_ptr)
        } else {
            match row_ptr.as_deref() {
                None | Some([0]) => None,
                Some(_) => {
                    return Err(GeoQueryError::invalid_input(
                        "point input does not take row delimiters",
                    ));
                }
            }
        };

        let input = Self {
            kind,
            coords,
            row_ptr,
            dimension,
        };
        input.validate_rows()?;
        Ok(input)
    }

    /// Like [`GeometryInput::new`] with the kind given by its tag, e.g.
    /// `"closed_polygon"`.
    pub fn from_kind_tag(
        tag: &str, coords: Vec<f64>, row_ptr: Option<Vec<u32>>, dimension: usize,
    ) -> Result<Self> {
        Self::new(tag.parse()?, coords, row_ptr, dimension)
    }

    /// Build an input from Arrow arrays. Null slots are rejected.
    pub fn from_arrow(
        coords: &Float64Array, row_ptr: Option<&UInt32Array>, kind: GeometryKind,
        dimension: usize,
    ) -> Result<Self> {
        if coords.null_count() > 0 {
            return Err(GeoQueryError::invalid_input("coordinates contain nulls"));
        }
        let row_ptr = match row_ptr {
            Some(array) if array.null_count() > 0 => {
                return Err(GeoQueryError::invalid_input("row delimiters contain nulls"));
            }
            Some(array) => Some(array.values().to_vec()),
            None => None,
        };
        Self::new(kind, coords.values().to_vec(), row_ptr, dimension)
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of geometries.
    pub fn len(&self) -> usize {
        match &self.row_ptr {
            Some(row_ptr) => row_ptr.len() - 1,
            None => self.num_vertices(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn num_vertices(&self) -> usize {
        self.coords.len() / self.dimension
    }

    fn vertex(&self, i: usize) -> Coord {
        let offset = i * self.dimension;
        Coord {
            x: self.coords[offset],
            y: self.coords[offset + 1],
        }
    }

    fn rows(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_ptr
            .iter()
            .flat_map(|row_ptr| row_ptr.windows(2))
            .map(|bounds| (bounds[0] as usize, bounds[1] as usize))
    }

    fn ring(&self, start: usize, end: usize) -> LineString {
        (start..end).map(|i| self.vertex(i)).collect()
    }

    fn validate_rows(&self) -> Result<()> {
        for (row, (start, end)) in self.rows().enumerate() {
            if start == end {
                return Err(GeoQueryError::invalid_input(format!(
                    "{} {row} has no vertices",
                    self.kind
                )));
            }
            if self.kind == GeometryKind::ClosedPolygon && self.vertex(start) != self.vertex(end - 1)
            {
                return Err(GeoQueryError::invalid_input(format!(
                    "closed_polygon {row} does not end on its first vertex"
                )));
            }
        }
        Ok(())
    }

    /// Materialize the typed geometries, in input order.
    pub fn to_geometries(&self) -> Vec<Geometry> {
        match self.kind {
            GeometryKind::Point => {
                (0..self.num_vertices())
                    .map(|i| Geometry::Point(Point::from(self.vertex(i))))
                    .collect()
            }
            GeometryKind::LineString => {
                self.rows()
                    .map(|(start, end)| Geometry::LineString(self.ring(start, end)))
                    .collect()
            }
            GeometryKind::OpenPolygon => {
                self.rows()
                    .map(|(start, end)| {
                        Geometry::OpenPolygon(Polygon::new(self.ring(start, end), Vec::new()))
                    })
                    .collect()
            }
            GeometryKind::ClosedPolygon => {
                self.rows()
                    .map(|(start, end)| {
                        Geometry::ClosedPolygon(Polygon::new(self.ring(start, end), Vec::new()))
                    })
                    .collect()
            }
        }
    }
}

fn validate_row_ptr(row_ptr: &[u32], num_vertices: usize) -> Result<()> {
    let (Some(&first), Some(&last)) = (row_ptr.first(), row_ptr.last()) else {
        return Err(GeoQueryError::invalid_input(
            "row delimiters need at least one entry",
        ));
    };
    if first != 0 {
        return Err(GeoQueryError::invalid_input(format!(
            "row delimiters must start at 0, got {first}"
        )));
    }
    if let Some(pair) = row_ptr.windows(2).find(|pair| pair[0] > pair[1]) {
        return Err(GeoQueryError::invalid_input(format!(
            "row delimiters must be non-decreasing, got {} followed by {}",
            pair[0], pair[1]
        )));
    }
    if last as usize != num_vertices {
        return Err(GeoQueryError::invalid_input(format!(
            "row delimiters end at {last} but the input holds {num_vertices} vertices"
        )));
    }
    Ok(())
}
