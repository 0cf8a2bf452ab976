use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, ListArray, UInt32Array};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use common_exception::{GeoQueryError, Result};

/// Matches of a batch of queries in compressed sparse row layout.
///
/// `row_ptr` holds one offset per query plus a leading zero; the matches of
/// query `i` are `indices[row_ptr[i]..row_ptr[i + 1]]`, sorted ascending.
/// Queries without matches still own a (zero-length) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    indices: Vec<u32>,
    row_ptr: Vec<u32>,
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::empty(0)
    }
}

impl BatchResult {
    /// A result for `num_queries` queries that all matched nothing.
    pub fn empty(num_queries: usize) -> Self {
        Self {
            indices: Vec::new(),
            row_ptr: vec![0; num_queries + 1],
        }
    }

    /// Concatenate per-query match lists, keeping their order.
    pub fn from_rows(rows: impl IntoIterator<Item = Vec<u32>>) -> Result<Self> {
        let mut indices = Vec::new();
        let mut row_ptr = vec![0];
        for row in rows {
            indices.extend(row);
            let offset = u32::try_from(indices.len()).map_err(|_| {
                GeoQueryError::invalid_input("batch result exceeds u32 offsets")
            })?;
            row_ptr.push(offset);
        }
        Ok(Self { indices, row_ptr })
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn row_ptr(&self) -> &[u32] {
        &self.row_ptr
    }

    /// Number of queries.
    pub fn len(&self) -> usize {
        self.row_ptr.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matches of query `i`.
    pub fn row(&self, i: usize) -> Option<&[u32]> {
        let start = *self.row_ptr.get(i)? as usize;
        let end = *self.row_ptr.get(i + 1)? as usize;
        Some(&self.indices[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.row_ptr
            .windows(2)
            .map(|bounds| &self.indices[bounds[0] as usize..bounds[1] as usize])
    }

    pub fn into_parts(self) -> (Vec<u32>, Vec<u32>) {
        (self.indices, self.row_ptr)
    }

    /// One list of matches per query. The CSR offsets become the list
    /// offsets unchanged.
    pub fn to_list_array(&self) -> Result<ListArray> {
        let offsets = self
            .row_ptr
            .iter()
            .map(|offset| i32::try_from(*offset))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| GeoQueryError::invalid_input("batch result exceeds i32 list offsets"))?;
        let values: ArrayRef = Arc::new(UInt32Array::from(self.indices.clone()));
        let field = Arc::new(Field::new("item", DataType::UInt32, false));
        Ok(ListArray::try_new(
            field,
            OffsetBuffer::new(ScalarBuffer::from(offsets)),
            values,
            None,
        )?)
    }
}

/// The nearest target of one query and its exact distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestMatch {
    pub index: u32,
    pub distance: f64,
}

/// Nearest matches of a batch of queries; position `i` answers query `i`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NearestResult {
    indices: Vec<u32>,
    distances: Vec<f64>,
}

impl NearestResult {
    pub fn from_matches(matches: impl IntoIterator<Item = NearestMatch>) -> Self {
        let (indices, distances) = matches
            .into_iter()
            .map(|found| (found.index, found.distance))
            .unzip();
        Self { indices, distances }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<NearestMatch> {
        Some(NearestMatch {
            index: *self.indices.get(i)?,
            distance: *self.distances.get(i)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = NearestMatch> + '_ {
        self.indices
            .iter()
            .zip(&self.distances)
            .map(|(index, distance)| {
                NearestMatch {
                    index: *index,
                    distance: *distance,
                }
            })
    }

    /// A two column batch: `index` (UInt32) and `distance` (Float64).
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("index", DataType::UInt32, false),
            Field::new("distance", DataType::Float64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(self.indices.clone())),
            Arc::new(Float64Array::from(self.distances.clone())),
        ];
        Ok(RecordBatch::try_new(schema, columns)?)
    }
}
