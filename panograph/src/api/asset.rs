//! Image and mesh transport abstraction.

use super::source::DataSourceError;
use crate::entity::{LoadStatus, Mesh};
use std::future::Future;
use std::sync::Arc;

/// Callback receiving byte progress while an image downloads.
pub type ProgressCallback = Arc<dyn Fn(LoadStatus) + Send + Sync>;

/// Loads the binary assets of a node.
pub trait AssetLoader: Send + Sync + 'static {
    /// Downloads the node's image, reporting progress as bytes arrive.
    fn load_image(
        &self,
        key: &str,
        progress: ProgressCallback,
    ) -> impl Future<Output = Result<Vec<u8>, DataSourceError>> + Send;

    /// Downloads the node's reconstruction mesh.
    fn load_mesh(&self, key: &str) -> impl Future<Output = Result<Mesh, DataSourceError>> + Send;
}
