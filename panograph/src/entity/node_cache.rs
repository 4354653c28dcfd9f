//! Asset payload attached to a node once it is cache-initialized.

use std::sync::Arc;

/// Byte progress of an asset download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LoadStatus {
    pub loaded: u64,
    pub total: u64,
}

impl LoadStatus {
    pub fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }

    /// True when the download finished (or reported no size at all).
    pub fn is_complete(&self) -> bool {
        self.total == 0 || self.loaded == self.total
    }
}

/// Triangulated reconstruction mesh of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Flat list of xyz vertex coordinates
    pub vertices: Vec<f32>,
    /// Flat list of vertex indices, three per triangle
    pub faces: Vec<u32>,
}

/// Image, mesh and load progress of a node.
///
/// Created empty by the graph when a node is cache-initialized and filled by
/// [`Node::cache_assets`](super::Node::cache_assets).
#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    image: Option<Arc<Vec<u8>>>,
    mesh: Option<Arc<Mesh>>,
    load_status: LoadStatus,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<Arc<Vec<u8>>> {
        self.image.clone()
    }

    pub fn mesh(&self) -> Option<Arc<Mesh>> {
        self.mesh.clone()
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub(crate) fn set_image(&mut self, image: Vec<u8>) {
        self.image = Some(Arc::new(image));
    }

    pub(crate) fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = Some(Arc::new(mesh));
    }

    pub(crate) fn set_load_status(&mut self, status: LoadStatus) {
        self.load_status = status;
    }

    /// True once both image and mesh are present.
    pub fn is_complete(&self) -> bool {
        self.image.is_some() && self.mesh.is_some()
    }

    /// Releases the held assets.
    pub(crate) fn dispose(&mut self) {
        self.image = None;
        self.mesh = None;
        self.load_status = LoadStatus::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_is_empty() {
        let cache = NodeCache::new();
        assert!(!cache.is_complete());
        assert!(cache.image().is_none());
        assert_eq!(cache.load_status(), LoadStatus::default());
    }

    #[test]
    fn test_complete_requires_image_and_mesh() {
        let mut cache = NodeCache::new();
        cache.set_image(vec![1, 2, 3]);
        assert!(!cache.is_complete());

        cache.set_mesh(Mesh::default());
        assert!(cache.is_complete());

        cache.dispose();
        assert!(!cache.is_complete());
    }

    #[test]
    fn test_load_status_complete() {
        assert!(LoadStatus::new(0, 0).is_complete());
        assert!(LoadStatus::new(10, 10).is_complete());
        assert!(!LoadStatus::new(5, 10).is_complete());
    }
}
