//! Graph entities: nodes, sequences, edges and per-node asset caches.

mod edge;
mod node;
mod node_cache;
mod sequence;

pub use edge::{Edge, EdgeData, EdgeDirection, EdgeStatus};
pub use node::Node;
pub use node_cache::{LoadStatus, Mesh, NodeCache};
pub use sequence::Sequence;
