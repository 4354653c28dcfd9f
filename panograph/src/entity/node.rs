//! Capture point entity.
//!
//! A [`Node`] is a cheap, clonable handle: every clone refers to the same
//! underlying state, so a handle held by a higher layer observes
//! `make_full`, `uncache` and `dispose` performed through the graph.
//!
//! # Lifecycle
//!
//! ```text
//! Core ──make_full──► Full ──dispose──► Disposed
//!   │                  │
//!   └──────dispose─────┴──────────────► Disposed
//! ```
//!
//! Independently of the metadata state, the asset cache moves between
//! absent and initialized through `initialize_cache` / `uncache`.

use super::edge::{Edge, EdgeStatus};
use super::node_cache::{LoadStatus, Mesh, NodeCache};
use crate::api::{
    AssetLoader, CoreNodeRecord, FillNodeRecord, FullNodeRecord, PanoramaRecord, ProgressCallback,
};
use crate::coord::LatLon;
use crate::error::GraphError;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

enum NodeState {
    Core(CoreNodeRecord),
    Full(CoreNodeRecord, Box<FillNodeRecord>),
    Disposed,
}

struct NodeInner {
    state: NodeState,
    cache: Option<NodeCache>,
    /// Bumped whenever the cache is attached or detached, so an asset load
    /// that straddles an `uncache` does not write into a newer cache.
    cache_epoch: u64,
    sequence_edges: EdgeStatus,
    spatial_edges: EdgeStatus,
}

/// Handle to a capture point.
#[derive(Clone)]
pub struct Node {
    key: Arc<str>,
    inner: Arc<RwLock<NodeInner>>,
}

impl Node {
    /// Creates a core-only node discovered through a tile scan.
    pub fn new(core: CoreNodeRecord) -> Self {
        Self::with_state(core.key.clone(), NodeState::Core(core))
    }

    /// Creates a node directly from a full record.
    pub fn from_full(record: FullNodeRecord) -> Self {
        let FullNodeRecord { core, fill } = record;
        Self::with_state(core.key.clone(), NodeState::Full(core, Box::new(fill)))
    }

    fn with_state(key: String, state: NodeState) -> Self {
        Self {
            key: Arc::from(key),
            inner: Arc::new(RwLock::new(NodeInner {
                state,
                cache: None,
                cache_epoch: 0,
                sequence_edges: EdgeStatus::default(),
                spatial_edges: EdgeStatus::default(),
            })),
        }
    }

    /// Globally unique key. Stays readable after disposal.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True if both handles refer to the same node instance.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_full(&self) -> bool {
        matches!(self.inner.read().state, NodeState::Full(..))
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.inner.read().state, NodeState::Disposed)
    }

    fn core_attr<T>(&self, read: impl FnOnce(&CoreNodeRecord) -> T) -> Result<T, GraphError> {
        match &self.inner.read().state {
            NodeState::Core(core) | NodeState::Full(core, _) => Ok(read(core)),
            NodeState::Disposed => Err(GraphError::Disposed(self.key.to_string())),
        }
    }

    fn fill_attr<T>(&self, read: impl FnOnce(&FillNodeRecord) -> T) -> Result<T, GraphError> {
        match &self.inner.read().state {
            NodeState::Full(_, fill) => Ok(read(fill)),
            NodeState::Core(_) => Err(GraphError::contract(format!(
                "Node is not full ({})",
                self.key
            ))),
            NodeState::Disposed => Err(GraphError::Disposed(self.key.to_string())),
        }
    }

    /// Computed position when available, otherwise the original one.
    pub fn lat_lon(&self) -> Result<LatLon, GraphError> {
        self.core_attr(|core| core.computed_lat_lon.unwrap_or(core.original_lat_lon))
    }

    /// Position as uploaded. Tiles are always derived from this one.
    pub fn original_lat_lon(&self) -> Result<LatLon, GraphError> {
        self.core_attr(|core| core.original_lat_lon)
    }

    pub fn sequence_key(&self) -> Result<Option<String>, GraphError> {
        self.core_attr(|core| core.sequence_key.clone())
    }

    pub fn captured_at(&self) -> Result<i64, GraphError> {
        self.fill_attr(|fill| fill.captured_at)
    }

    /// Computed compass angle, falling back to the original one.
    pub fn compass_angle(&self) -> Result<Option<f64>, GraphError> {
        self.fill_attr(|fill| fill.computed_compass_angle.or(fill.compass_angle))
    }

    pub fn altitude(&self) -> Result<Option<f64>, GraphError> {
        self.fill_attr(|fill| fill.computed_altitude)
    }

    pub fn camera_rotation(&self) -> Result<Option<[f64; 3]>, GraphError> {
        self.fill_attr(|fill| fill.camera_rotation)
    }

    pub fn camera_translation(&self) -> Result<Option<[f64; 3]>, GraphError> {
        self.fill_attr(|fill| fill.camera_translation)
    }

    pub fn scale(&self) -> Result<Option<f64>, GraphError> {
        self.fill_attr(|fill| fill.atomic_scale)
    }

    pub fn focal(&self) -> Result<Option<f64>, GraphError> {
        self.fill_attr(|fill| fill.focal)
    }

    pub fn orientation(&self) -> Result<u8, GraphError> {
        self.fill_attr(|fill| fill.orientation)
    }

    pub fn gpano(&self) -> Result<Option<PanoramaRecord>, GraphError> {
        self.fill_attr(|fill| fill.gpano.clone())
    }

    pub fn merge_cc(&self) -> Result<Option<u64>, GraphError> {
        self.fill_attr(|fill| fill.merge_cc)
    }

    pub fn merge_version(&self) -> Result<Option<u64>, GraphError> {
        self.fill_attr(|fill| fill.merge_version)
    }

    pub fn user_key(&self) -> Result<String, GraphError> {
        self.fill_attr(|fill| fill.user.key.clone())
    }

    pub fn username(&self) -> Result<String, GraphError> {
        self.fill_attr(|fill| fill.user.username.clone())
    }

    pub fn project_key(&self) -> Result<Option<String>, GraphError> {
        self.fill_attr(|fill| fill.project.as_ref().map(|p| p.key.clone()))
    }

    pub fn private(&self) -> Result<bool, GraphError> {
        self.fill_attr(|fill| fill.private)
    }

    pub fn width(&self) -> Result<u32, GraphError> {
        self.fill_attr(|fill| fill.width)
    }

    pub fn height(&self) -> Result<u32, GraphError> {
        self.fill_attr(|fill| fill.height)
    }

    /// True for panoramas, i.e. nodes carrying panorama crop metadata.
    pub fn pano(&self) -> Result<bool, GraphError> {
        self.fill_attr(|fill| fill.gpano.is_some())
    }

    /// True for uncropped 360° panoramas.
    pub fn full_pano(&self) -> Result<bool, GraphError> {
        self.fill_attr(|fill| {
            fill.gpano.as_ref().is_some_and(|gpano| {
                gpano.cropped_area_left_pixels == 0
                    && gpano.cropped_area_top_pixels == 0
                    && gpano.cropped_area_image_width_pixels == gpano.full_pano_width_pixels
                    && gpano.cropped_area_image_height_pixels == gpano.full_pano_height_pixels
            })
        })
    }

    /// True if the node belongs to a merged reconstruction.
    pub fn merged(&self) -> Result<bool, GraphError> {
        self.fill_attr(|fill| fill.merge_version.is_some_and(|version| version > 0))
    }

    /// Completes a core node with fill data.
    ///
    /// Fails if the node is already full or disposed.
    pub fn make_full(&self, fill: FillNodeRecord) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        match std::mem::replace(&mut inner.state, NodeState::Disposed) {
            NodeState::Core(core) => {
                inner.state = NodeState::Full(core, Box::new(fill));
                Ok(())
            }
            full @ NodeState::Full(..) => {
                inner.state = full;
                Err(GraphError::contract(format!(
                    "Cannot make node full, it is already full ({})",
                    self.key
                )))
            }
            NodeState::Disposed => Err(GraphError::Disposed(self.key.to_string())),
        }
    }

    /// Attaches an empty asset cache.
    ///
    /// Fails if a cache is already attached or the node is disposed.
    pub fn initialize_cache(&self, cache: NodeCache) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        if matches!(inner.state, NodeState::Disposed) {
            return Err(GraphError::Disposed(self.key.to_string()));
        }
        if inner.cache.is_some() {
            return Err(GraphError::contract(format!(
                "Node cache already initialized ({})",
                self.key
            )));
        }
        inner.cache = Some(cache);
        inner.cache_epoch += 1;
        Ok(())
    }

    pub fn has_initialized_cache(&self) -> bool {
        self.inner.read().cache.is_some()
    }

    /// True when the attached cache holds both image and mesh.
    pub fn assets_cached(&self) -> bool {
        self.inner
            .read()
            .cache
            .as_ref()
            .is_some_and(NodeCache::is_complete)
    }

    pub fn image(&self) -> Option<Arc<Vec<u8>>> {
        self.inner.read().cache.as_ref().and_then(NodeCache::image)
    }

    pub fn mesh(&self) -> Option<Arc<Mesh>> {
        self.inner.read().cache.as_ref().and_then(NodeCache::mesh)
    }

    pub fn load_status(&self) -> Option<LoadStatus> {
        self.inner.read().cache.as_ref().map(NodeCache::load_status)
    }

    /// Loads image and mesh into the attached cache.
    ///
    /// Non-merged nodes get an empty mesh without a fetch. If the cache is
    /// detached while loading, the loaded assets are discarded and the call
    /// resolves to [`GraphError::Aborted`].
    pub async fn cache_assets<A: AssetLoader>(
        &self,
        loader: &A,
        on_progress: ProgressCallback,
    ) -> Result<(), GraphError> {
        let (epoch, merged) = {
            let inner = self.inner.read();
            if inner.cache.is_none() {
                return Err(GraphError::contract(format!(
                    "Node cache not initialized ({})",
                    self.key
                )));
            }
            let merged = match &inner.state {
                NodeState::Full(_, fill) => fill.merge_version.is_some_and(|v| v > 0),
                NodeState::Core(_) => false,
                NodeState::Disposed => return Err(GraphError::Disposed(self.key.to_string())),
            };
            (inner.cache_epoch, merged)
        };

        let progress: ProgressCallback = {
            let node = self.clone();
            Arc::new(move |status: LoadStatus| {
                node.update_load_status(epoch, status);
                on_progress(status);
            })
        };

        let asset_error = |e: crate::api::DataSourceError| GraphError::Asset {
            key: self.key.to_string(),
            reason: e.to_string(),
        };

        let image = loader
            .load_image(&self.key, progress)
            .await
            .map_err(asset_error)?;
        let mesh = if merged {
            loader.load_mesh(&self.key).await.map_err(asset_error)?
        } else {
            Mesh::default()
        };

        let mut inner = self.inner.write();
        if inner.cache_epoch != epoch {
            debug!(key = %self.key, "Discarding assets loaded for a detached cache");
            return Err(GraphError::Aborted);
        }
        let cache = inner.cache.as_mut().ok_or(GraphError::Aborted)?;
        cache.set_image(image);
        cache.set_mesh(mesh);
        Ok(())
    }

    fn update_load_status(&self, epoch: u64, status: LoadStatus) {
        let mut inner = self.inner.write();
        if inner.cache_epoch != epoch {
            return;
        }
        if let Some(cache) = inner.cache.as_mut() {
            cache.set_load_status(status);
        }
    }

    pub fn sequence_edges(&self) -> EdgeStatus {
        self.inner.read().sequence_edges.clone()
    }

    pub fn spatial_edges(&self) -> EdgeStatus {
        self.inner.read().spatial_edges.clone()
    }

    /// Stores computed sequence edges. Fails if already cached.
    pub fn cache_sequence_edges(&self, edges: Vec<Edge>) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        if inner.sequence_edges.cached {
            return Err(GraphError::contract(format!(
                "Sequence edges already cached ({})",
                self.key
            )));
        }
        inner.sequence_edges = EdgeStatus::cached(edges);
        Ok(())
    }

    /// Stores computed spatial edges. Fails if already cached.
    pub fn cache_spatial_edges(&self, edges: Vec<Edge>) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        if inner.spatial_edges.cached {
            return Err(GraphError::contract(format!(
                "Spatial edges already cached ({})",
                self.key
            )));
        }
        inner.spatial_edges = EdgeStatus::cached(edges);
        Ok(())
    }

    pub fn reset_sequence_edges(&self) {
        self.inner.write().sequence_edges = EdgeStatus::default();
    }

    pub fn reset_spatial_edges(&self) {
        self.inner.write().spatial_edges = EdgeStatus::default();
    }

    /// Detaches the asset cache, keeping metadata so the node can be
    /// re-initialized later.
    pub fn uncache(&self) {
        let mut inner = self.inner.write();
        if let Some(mut cache) = inner.cache.take() {
            cache.dispose();
            inner.cache_epoch += 1;
        }
    }

    /// Irreversibly clears all attributes, edges and the asset cache.
    pub fn dispose(&self) {
        let mut inner = self.inner.write();
        if let Some(mut cache) = inner.cache.take() {
            cache.dispose();
        }
        inner.cache_epoch += 1;
        inner.state = NodeState::Disposed;
        inner.sequence_edges = EdgeStatus::default();
        inner.spatial_edges = EdgeStatus::default();
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        let state = match inner.state {
            NodeState::Core(_) => "core",
            NodeState::Full(..) => "full",
            NodeState::Disposed => "disposed",
        };
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("state", &state)
            .field("cache_initialized", &inner.cache.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UserRecord;
    use crate::api::DataSourceError;

    fn core(key: &str) -> CoreNodeRecord {
        CoreNodeRecord {
            key: key.to_string(),
            original_lat_lon: LatLon::new(55.0, 13.0),
            computed_lat_lon: None,
            sequence_key: Some("s1".to_string()),
        }
    }

    fn fill(captured_at: i64) -> FillNodeRecord {
        FillNodeRecord {
            captured_at,
            compass_angle: Some(10.0),
            computed_compass_angle: None,
            computed_altitude: None,
            camera_rotation: None,
            camera_translation: None,
            atomic_scale: None,
            focal: None,
            orientation: 1,
            gpano: None,
            merge_cc: None,
            merge_version: None,
            private: false,
            project: None,
            user: UserRecord {
                key: "u1".to_string(),
                username: "user".to_string(),
            },
            width: 4,
            height: 3,
        }
    }

    struct StaticLoader;

    impl AssetLoader for StaticLoader {
        async fn load_image(
            &self,
            _key: &str,
            progress: ProgressCallback,
        ) -> Result<Vec<u8>, DataSourceError> {
            progress(LoadStatus::new(5, 10));
            progress(LoadStatus::new(10, 10));
            Ok(vec![0xFF, 0xD8])
        }

        async fn load_mesh(&self, _key: &str) -> Result<Mesh, DataSourceError> {
            Ok(Mesh {
                vertices: vec![0.0, 0.0, 1.0],
                faces: vec![0, 0, 0],
            })
        }
    }

    #[test]
    fn test_core_node_is_not_full() {
        let node = Node::new(core("n1"));
        assert!(!node.is_full());
        assert_eq!(node.lat_lon().unwrap(), LatLon::new(55.0, 13.0));
        assert!(node.captured_at().is_err());
    }

    #[test]
    fn test_make_full_once() {
        let node = Node::new(core("n1"));
        node.make_full(fill(7)).unwrap();
        assert!(node.is_full());
        assert_eq!(node.captured_at().unwrap(), 7);

        let again = node.make_full(fill(8));
        assert!(matches!(again, Err(GraphError::Contract(_))));
        assert_eq!(node.captured_at().unwrap(), 7, "failed make_full keeps data");
    }

    #[test]
    fn test_computed_position_preferred() {
        let mut record = core("n1");
        record.computed_lat_lon = Some(LatLon::new(55.1, 13.1));
        let node = Node::new(record);
        assert_eq!(node.lat_lon().unwrap(), LatLon::new(55.1, 13.1));
        assert_eq!(node.original_lat_lon().unwrap(), LatLon::new(55.0, 13.0));
    }

    #[test]
    fn test_pano_flags() {
        let mut data = fill(1);
        data.gpano = Some(PanoramaRecord {
            cropped_area_image_height_pixels: 100,
            cropped_area_image_width_pixels: 200,
            cropped_area_left_pixels: 0,
            cropped_area_top_pixels: 0,
            full_pano_height_pixels: 100,
            full_pano_width_pixels: 200,
        });
        data.merge_version = Some(1);
        let node = Node::from_full(FullNodeRecord {
            core: core("n1"),
            fill: data,
        });

        assert!(node.pano().unwrap());
        assert!(node.full_pano().unwrap());
        assert!(node.merged().unwrap());
    }

    #[test]
    fn test_cropped_pano_is_not_full_pano() {
        let mut data = fill(1);
        data.gpano = Some(PanoramaRecord {
            cropped_area_image_height_pixels: 50,
            cropped_area_image_width_pixels: 200,
            cropped_area_left_pixels: 0,
            cropped_area_top_pixels: 25,
            full_pano_height_pixels: 100,
            full_pano_width_pixels: 200,
        });
        let node = Node::from_full(FullNodeRecord {
            core: core("n1"),
            fill: data,
        });

        assert!(node.pano().unwrap());
        assert!(!node.full_pano().unwrap());
        assert!(!node.merged().unwrap());
    }

    #[test]
    fn test_dispose_fails_accessors() {
        let node = Node::from_full(FullNodeRecord {
            core: core("n1"),
            fill: fill(1),
        });
        let handle = node.clone();
        node.dispose();

        assert!(handle.is_disposed());
        assert_eq!(handle.key(), "n1");
        assert!(matches!(handle.lat_lon(), Err(GraphError::Disposed(_))));
        assert!(matches!(handle.captured_at(), Err(GraphError::Disposed(_))));
        assert!(matches!(handle.sequence_key(), Err(GraphError::Disposed(_))));
        assert!(handle.initialize_cache(NodeCache::new()).is_err());
        assert!(handle.make_full(fill(2)).is_err());
    }

    #[test]
    fn test_initialize_cache_twice_fails() {
        let node = Node::new(core("n1"));
        node.initialize_cache(NodeCache::new()).unwrap();
        assert!(node.initialize_cache(NodeCache::new()).is_err());
    }

    #[tokio::test]
    async fn test_cache_assets_and_reinitialize() {
        let node = Node::from_full(FullNodeRecord {
            core: core("n1"),
            fill: fill(1),
        });
        node.initialize_cache(NodeCache::new()).unwrap();

        let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        node.cache_assets(&StaticLoader, Arc::new(move |s| sink.lock().push(s)))
            .await
            .unwrap();

        assert!(node.assets_cached());
        assert_eq!(node.load_status(), Some(LoadStatus::new(10, 10)));
        assert_eq!(reported.lock().len(), 2);
        assert_eq!(node.mesh().unwrap().vertices.len(), 0, "non-merged node skips mesh");

        node.uncache();
        assert!(!node.assets_cached());
        assert!(node.is_full(), "metadata survives uncache");

        node.initialize_cache(NodeCache::new()).unwrap();
        assert!(!node.assets_cached(), "new cache starts empty");
    }

    #[tokio::test]
    async fn test_cache_assets_requires_initialized_cache() {
        let node = Node::new(core("n1"));
        let result = node.cache_assets(&StaticLoader, Arc::new(|_| {})).await;
        assert!(matches!(result, Err(GraphError::Contract(_))));
    }

    #[test]
    fn test_edges_cached_once_until_reset() {
        let node = Node::new(core("n1"));
        node.cache_sequence_edges(Vec::new()).unwrap();
        assert!(node.sequence_edges().cached);
        assert!(node.cache_sequence_edges(Vec::new()).is_err());

        node.reset_sequence_edges();
        assert!(!node.sequence_edges().cached);
        node.cache_sequence_edges(Vec::new()).unwrap();

        node.cache_spatial_edges(Vec::new()).unwrap();
        node.reset_spatial_edges();
        assert!(!node.spatial_edges().cached);
        assert!(node.sequence_edges().cached, "spatial reset keeps sequence edges");
    }
}
