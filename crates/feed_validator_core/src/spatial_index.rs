use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::geometry::Envelope;

type IndexedEnvelope<T> = GeomWithData<Rectangle<[f64; 2]>, T>;

fn corners(envelope: &Envelope) -> ([f64; 2], [f64; 2]) {
    (
        [envelope.min_x, envelope.min_y],
        [envelope.max_x, envelope.max_y],
    )
}

/// Collects envelopes before the tree is bulk loaded.
///
/// Splitting build from query keeps the tree immutable once shared.
#[derive(Debug)]
pub struct SpatialIndexBuilder<T> {
    entries: Vec<IndexedEnvelope<T>>,
}

impl<T> Default for SpatialIndexBuilder<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> SpatialIndexBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, envelope: Envelope, payload: T) {
        let (lower, upper) = corners(&envelope);
        self.entries
            .push(GeomWithData::new(Rectangle::from_corners(lower, upper), payload));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> SpatialIndex<T> {
        SpatialIndex {
            tree: RTree::bulk_load(self.entries),
        }
    }
}

pub struct SpatialIndex<T> {
    tree: RTree<IndexedEnvelope<T>>,
}

impl<T> SpatialIndex<T> {
    /// Payloads whose envelope intersects `envelope`, in tree order.
    pub fn query<'a>(&'a self, envelope: &Envelope) -> impl Iterator<Item = &'a T> + 'a {
        let (lower, upper) = corners(envelope);
        let aabb = AABB::from_corners(lower, upper);
        self.tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|entry| &entry.data)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
