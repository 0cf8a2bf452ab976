use std::cmp::Ordering;
use std::collections::BinaryHeap;

use geo::Rect;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, ParentNode, RStarInsertionStrategy, RTree, RTreeNode, RTreeObject, RTreeParams};

use crate::geometry::axis_gap;

/// Maximum number of children per R-tree node. The nearest search starts with
/// a window of the same size.
pub const NODE_CAPACITY: usize = 10;

/// R*-tree parameters with a node capacity of [`NODE_CAPACITY`].
pub struct IndexParams;

impl RTreeParams for IndexParams {
    const MIN_SIZE: usize = 4;
    const MAX_SIZE: usize = NODE_CAPACITY;
    const REINSERTION_COUNT: usize = 3;
    type DefaultInsertionStrategy = RStarInsertionStrategy;
}

type IndexEntry = GeomWithData<Rectangle<[f64; 2]>, u32>;

/// A candidate yielded by [`SpatialIndex::nearest_boxes`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexCandidate {
    /// Position of the target geometry in its collection.
    pub index: u32,
    /// Squared distance between the candidate's box and the query box.
    pub box_distance: f64,
}

/// Bounding-box index over a target geometry collection.
///
/// The index is bulk loaded once and never mutated afterwards, so it can be
/// shared freely between threads answering independent queries.
pub struct SpatialIndex {
    tree: RTree<IndexEntry, IndexParams>,
}

impl SpatialIndex {
    /// Build the index from (box, target position) pairs.
    pub fn bulk_load(boxes: impl IntoIterator<Item = (Rect, u32)>) -> Self {
        let entries = boxes
            .into_iter()
            .map(|(rect, index)| {
                let min = rect.min();
                let max = rect.max();
                GeomWithData::new(Rectangle::from_corners([min.x, min.y], [max.x, max.y]), index)
            })
            .collect();
        Self {
            tree: RTree::bulk_load_with_params(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Target positions whose boxes intersect `rect`. Boxes that only share an
    /// edge or a corner with `rect` are included.
    pub fn query_intersecting(&self, rect: &Rect) -> Vec<u32> {
        let min = rect.min();
        let max = rect.max();
        let envelope = AABB::from_corners([min.x, min.y], [max.x, max.y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect()
    }

    /// The first `k` entries ordered by non-decreasing box distance to `rect`.
    ///
    /// The ordering is produced by a best-first traversal and does not depend
    /// on `k`: a call with a larger `k` returns the result of a smaller call as
    /// its prefix. Callers widening their search therefore only need to keep a
    /// count of the entries they already consumed. Fewer than `k` entries are
    /// returned once the index is exhausted.
    pub fn nearest_boxes(&self, rect: &Rect, k: usize) -> Vec<IndexCandidate> {
        let mut candidates = Vec::with_capacity(k.min(self.len()));
        if k == 0 || self.is_empty() {
            return candidates;
        }

        let mut queue = BinaryHeap::new();
        let mut sequence = 0;
        push_children(&mut queue, &mut sequence, self.tree.root(), rect);

        while let Some(item) = queue.pop() {
            match item.entry {
                QueueEntry::Leaf(entry) => {
                    candidates.push(IndexCandidate {
                        index: entry.data,
                        box_distance: item.distance,
                    });
                    if candidates.len() == k {
                        break;
                    }
                }
                QueueEntry::Node(node) => push_children(&mut queue, &mut sequence, node, rect),
            }
        }
        candidates
    }
}

fn push_children<'a>(
    queue: &mut BinaryHeap<QueueItem<'a>>, sequence: &mut usize,
    node: &'a ParentNode<IndexEntry>, rect: &Rect,
) {
    for child in node.children() {
        let (distance, entry) = match child {
            RTreeNode::Leaf(entry) => (envelope_distance(&entry.envelope(), rect), QueueEntry::Leaf(entry)),
            RTreeNode::Parent(parent) => {
                (envelope_distance(&parent.envelope(), rect), QueueEntry::Node(parent))
            }
        };
        queue.push(QueueItem {
            distance,
            sequence: *sequence,
            entry,
        });
        *sequence += 1;
    }
}

fn envelope_distance(envelope: &AABB<[f64; 2]>, rect: &Rect) -> f64 {
    let lower = envelope.lower();
    let upper = envelope.upper();
    let dx = axis_gap(lower[0], upper[0], rect.min().x, rect.max().x);
    let dy = axis_gap(lower[1], upper[1], rect.min().y, rect.max().y);
    dx * dx + dy * dy
}

enum QueueEntry<'a> {
    Node(&'a ParentNode<IndexEntry>),
    Leaf(&'a IndexEntry),
}

struct QueueItem<'a> {
    distance: f64,
    sequence: usize,
    entry: QueueEntry<'a>,
}

impl QueueItem<'_> {
    fn is_leaf(&self) -> bool {
        matches!(self.entry, QueueEntry::Leaf(_))
    }
}

// `BinaryHeap` pops the greatest item: smaller distances rank higher, leaves
// outrank nodes at equal distance, earlier pushes outrank later ones.
impl Ord for QueueItem<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| self.is_leaf().cmp(&other.is_leaf()))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem<'_> {}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;

    fn point_box(x: f64, y: f64) -> Rect {
        Rect::new(coord! { x: x, y: y }, coord! { x: x, y: y })
    }

    fn grid_index(size: u32) -> SpatialIndex {
        SpatialIndex::bulk_load((0..size * size).map(|i| {
            let x = f64::from(i % size);
            let y = f64::from(i / size);
            (point_box(x, y), i)
        }))
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::bulk_load(std::iter::empty());
        assert!(index.is_empty());
        assert!(index.query_intersecting(&point_box(0.0, 0.0)).is_empty());
        assert!(index.nearest_boxes(&point_box(0.0, 0.0), 10).is_empty());
    }

    #[test]
    fn test_query_intersecting_includes_boundary() {
        let index = grid_index(5);
        let query = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let mut found = index.query_intersecting(&query);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1, 5, 6]);
    }

    #[test]
    fn test_nearest_boxes_sorted_by_distance() {
        let index = grid_index(20);
        let query = point_box(7.3, 11.6);
        let candidates = index.nearest_boxes(&query, 400);
        assert_eq!(candidates.len(), 400);
        assert!(
            candidates
                .windows(2)
                .all(|pair| pair[0].box_distance <= pair[1].box_distance)
        );
        assert_eq!(candidates[0].index, 12 * 20 + 7);

        let mut seen = candidates.iter().map(|c| c.index).collect::<Vec<_>>();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn test_nearest_boxes_is_prefix_consistent() {
        let index = grid_index(15);
        let query = Rect::new(coord! { x: 3.2, y: 4.1 }, coord! { x: 5.7, y: 4.4 });
        let all = index.nearest_boxes(&query, 225);
        for k in [1, 10, 20, 40, 80, 160] {
            assert_eq!(index.nearest_boxes(&query, k), all[..k]);
        }
    }

    #[test]
    fn test_nearest_boxes_exhausts() {
        let index = grid_index(3);
        assert_eq!(index.nearest_boxes(&point_box(1.0, 1.0), 100).len(), 9);
        assert!(index.nearest_boxes(&point_box(1.0, 1.0), 0).is_empty());
    }

    #[test]
    fn test_nearest_boxes_overlapping_boxes_have_zero_distance() {
        let index = SpatialIndex::bulk_load([
            (
                Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 }),
                0,
            ),
            (point_box(20.0, 20.0), 1),
        ]);
        let candidates = index.nearest_boxes(&point_box(5.0, 5.0), 2);
        assert_eq!(candidates[0], IndexCandidate {
            index: 0,
            box_distance: 0.0
        });
        assert_eq!(candidates[1].index, 1);
        assert_eq!(candidates[1].box_distance, 15.0 * 15.0 * 2.0);
    }
}
