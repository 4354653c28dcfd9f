//! Remote data source abstraction.

use super::types::{CoreNodeRecord, FillNodeRecord, FullNodeRecord, SequenceRecord};
use crate::coord::LatLon;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use thiserror::Error;

/// Most node keys the graph will put into a single full/fill request.
pub const MAX_KEYS_PER_REQUEST: usize = 200;

/// Errors reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    /// Transport or remote failure
    #[error("HTTP error: {0}")]
    Http(String),
    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// Requested entity does not exist remotely
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Node records of one tile, keyed by their index within the tile.
pub type TileNodes = BTreeMap<u32, CoreNodeRecord>;

/// Async client for the paged, keyed metadata API.
///
/// The graph issues at most one outstanding request per entity and
/// operation kind; retry policy, if any, belongs to the implementor.
pub trait DataSource: Send + Sync + 'static {
    /// Fetches full node records. Called with at most
    /// [`MAX_KEYS_PER_REQUEST`] keys.
    fn fetch_full_by_keys(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<HashMap<String, FullNodeRecord>, DataSourceError>> + Send;

    /// Fetches fill records completing core nodes. Called with at most
    /// [`MAX_KEYS_PER_REQUEST`] keys.
    fn fetch_fill_by_keys(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<HashMap<String, FillNodeRecord>, DataSourceError>> + Send;

    /// Fetches the core nodes of each tile.
    fn fetch_by_tiles(
        &self,
        tiles: &[String],
    ) -> impl Future<Output = Result<HashMap<String, TileNodes>, DataSourceError>> + Send;

    /// Fetches the ordered node keys of a sequence.
    fn fetch_sequence_by_key(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<SequenceRecord, DataSourceError>> + Send;

    /// Fetches the node closest to a position, if any exists nearby.
    fn fetch_node_close_to(
        &self,
        position: LatLon,
    ) -> impl Future<Output = Result<Option<FullNodeRecord>, DataSourceError>> + Send;
}
