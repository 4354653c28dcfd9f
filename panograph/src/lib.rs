//! Panograph - graph caching engine for panoramic street-level imagery
//!
//! Keeps a bounded, lazily fetched graph of capture points (nodes) and the
//! capture paths (sequences) they belong to. Nodes are discovered through
//! geohash tiles, completed on demand, linked by sequence and spatial
//! navigation edges and evicted least recently used first.
//!
//! # High-Level API
//!
//! The [`service`] module drives the per-node caching pipeline:
//!
//! ```ignore
//! use panograph::{Graph, GraphService};
//!
//! let graph = Graph::new(Arc::new(my_data_source));
//! let service = GraphService::new(graph, Arc::new(my_asset_loader));
//!
//! let node = service.cache_node("node-key").await?;
//! for edge in node.spatial_edges().edges {
//!     println!("{:?} -> {}", edge.data.direction, edge.to);
//! }
//! ```

pub mod api;
pub mod config;
pub mod coord;
pub mod edge;
pub mod entity;
pub mod error;
pub mod filter;
pub mod graph;
pub mod logging;
pub mod service;

pub use api::{AssetLoader, DataSource, DataSourceError};
pub use coord::LatLon;
pub use entity::{Edge, EdgeDirection, Node, Sequence};
pub use error::GraphError;
pub use graph::{Graph, GraphConfig, TileCalculator};
pub use service::{GraphMode, GraphService, ImageLoadingService};

/// Version of the library, injected from `Cargo.toml` at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
