//! Edge computation
//!
//! The graph treats edge computation as an external capability: given a
//! node and its context it asks an [`EdgeCalculator`] for directed edges
//! and stores the result on the node.

mod calculator;

pub use calculator::DefaultEdgeCalculator;

use crate::entity::{Edge, Node, Sequence};
use crate::error::GraphError;

/// Computes navigation edges for a node.
pub trait EdgeCalculator: Send + Sync {
    /// Edges to the node's neighbours in its sequence.
    fn compute_sequence_edges(
        &self,
        node: &Node,
        sequence: &Sequence,
    ) -> Result<Vec<Edge>, GraphError>;

    /// Edges to nearby nodes.
    ///
    /// `candidates` are the full nodes around `node` that passed the active
    /// filter. `fallback_keys` are the node's sequence neighbours.
    fn compute_spatial_edges(
        &self,
        node: &Node,
        candidates: &[Node],
        fallback_keys: &[String],
    ) -> Result<Vec<Edge>, GraphError>;
}
