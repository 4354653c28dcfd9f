//! Error types shared by the graph, its entities and the service layer.

use crate::api::DataSourceError;
use crate::coord::CoordError;
use thiserror::Error;

/// Errors raised by graph operations.
///
/// The type is `Clone` so a single in-flight fetch can deliver its outcome
/// to every caller that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The caller asked for something the graph state does not allow
    /// (e.g. fetching a node that already exists). Never retried.
    #[error("{0}")]
    Contract(String),

    /// The node is not part of the graph.
    #[error("Node does not exist in graph: {0}")]
    NodeNotFound(String),

    /// The sequence is not part of the graph.
    #[error("Sequence does not exist in graph: {0}")]
    SequenceNotFound(String),

    /// An attribute was read from a node after `dispose()`.
    #[error("Node has been disposed: {0}")]
    Disposed(String),

    /// A response lacked data the graph requires.
    #[error("Invalid data for {key}: {reason}")]
    InvalidData { key: String, reason: String },

    /// The remote data source failed.
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    /// Image or mesh loading failed.
    #[error("Asset loading failed for {key}: {reason}")]
    Asset { key: String, reason: String },

    /// A position or bounding box was invalid.
    #[error("Coordinate error: {0}")]
    Coord(#[from] CoordError),

    /// The operation was cancelled by a reset or a graph mode switch.
    #[error("Operation aborted")]
    Aborted,
}

impl GraphError {
    /// Shorthand for a contract violation with a formatted message.
    pub(crate) fn contract(message: impl Into<String>) -> Self {
        Self::Contract(message.into())
    }

    /// Returns true if the operation was cancelled rather than failed.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
