//! R-tree over node positions.

use crate::coord::LatLon;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// Index entry: a node key at a `[lon, lat]` point.
#[derive(Debug, Clone, PartialEq)]
struct IndexedNode {
    key: String,
    point: [f64; 2],
}

impl RTreeObject for IndexedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for IndexedNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = point[0] - self.point[0];
        let dy = point[1] - self.point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index of the nodes discovered through tiles.
#[derive(Debug, Default)]
pub(crate) struct SpatialIndex {
    tree: RTree<IndexedNode>,
    /// Indexed point per key, needed for removal
    points: HashMap<String, [f64; 2]>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a node. Re-inserting a key moves it.
    pub fn insert(&mut self, key: &str, position: &LatLon) {
        self.remove(key);
        let point = [position.lon, position.lat];
        self.points.insert(key.to_string(), point);
        self.tree.insert(IndexedNode {
            key: key.to_string(),
            point,
        });
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.points.remove(key) {
            Some(point) => self
                .tree
                .remove(&IndexedNode {
                    key: key.to_string(),
                    point,
                })
                .is_some(),
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.points.contains_key(key)
    }

    /// Keys of all nodes inside the box spanned by `sw` and `ne`.
    pub fn search(&self, sw: &LatLon, ne: &LatLon) -> Vec<String> {
        let envelope = AABB::from_corners([sw.lon, sw.lat], [ne.lon, ne.lat]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn clear(&mut self) {
        self.tree = RTree::new();
        self.points.clear();
    }
}
