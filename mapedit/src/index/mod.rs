//! Per-tile spatial index.
//!
//! Each tile owns a small R-tree bucket over the bounding boxes of the
//! features indexed in it. Feature counts per tile are bounded, so the
//! bucket stays cheap to rebuild and query.
//!
//! # Ghost entries
//!
//! A feature close enough to a tile boundary is also indexed in the
//! neighboring tiles as a *ghost* reference, so queries issued against
//! either tile can see it. The provider deduplicates query results by id,
//! which is what keeps ghosts from ever appearing twice in one result set.

use crate::geom::Rect;
use crate::geom::FeatureId;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// One indexed feature reference inside a tile bucket.
#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    id: FeatureId,
    bbox: Rect,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_lon, self.bbox.min_lat],
            [self.bbox.max_lon, self.bbox.max_lat],
        )
    }
}

/// Spatial index over one tile's features.
///
/// Keeps an id side-map next to the R-tree so removal does not need the
/// original geometry, and so `contains`/`is_ghost` are O(1).
#[derive(Debug, Default)]
pub struct TileIndex {
    tree: RTree<IndexEntry>,
    entries: HashMap<FeatureId, (Rect, bool)>,
}

impl TileIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a feature reference.
    ///
    /// Re-inserting an id replaces its previous entry (the feature moved).
    pub fn insert(&mut self, id: FeatureId, bbox: Rect, ghost: bool) {
        if self.entries.contains_key(&id) {
            self.remove(&id);
        }
        self.tree.insert(IndexEntry {
            id: id.clone(),
            bbox,
        });
        self.entries.insert(id, (bbox, ghost));
    }

    /// Removes a feature reference. Returns true if it was present.
    pub fn remove(&mut self, id: &FeatureId) -> bool {
        let Some((bbox, _)) = self.entries.remove(id) else {
            return false;
        };
        self.tree
            .remove(&IndexEntry {
                id: id.clone(),
                bbox,
            })
            .is_some()
    }

    /// Returns true if the id is indexed here (owned or ghost).
    pub fn contains(&self, id: &FeatureId) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns true if the id is indexed here as a ghost reference.
    pub fn is_ghost(&self, id: &FeatureId) -> bool {
        self.entries.get(id).is_some_and(|(_, ghost)| *ghost)
    }

    /// Ids whose bounding boxes intersect `rect`.
    pub fn query_rect(&self, rect: &Rect) -> Vec<FeatureId> {
        let envelope = AABB::from_corners(
            [rect.min_lon, rect.min_lat],
            [rect.max_lon, rect.max_lat],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Iterates over every indexed id.
    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.entries.keys()
    }

    /// Number of indexed references (owned + ghost).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
