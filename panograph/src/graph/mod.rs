//! Graph caching engine
//!
//! [`Graph`] owns every cached node and sequence, the spatial index over
//! nodes discovered through tiles, and the in-flight state of all fetches.
//!
//! # Node states
//!
//! ```text
//! unknown ──cache_full──► pre-stored ──initialize_cache──► cache-initialized
//!    │                        ▲                                  │
//!    └──cache_tiles──► core ──┘ cache_fill            uncache()  │
//!                                 (in tile)    ◄─────────────────┘
//! ```
//!
//! Fetch operations check their preconditions synchronously and return a
//! [`CacheFuture`]. Concurrent requests for the same entity share one
//! future. Dropping every handle to a future cancels the work it performs
//! and clears the corresponding in-flight flag.

mod batch;
mod calculator;
mod coalesce;
mod config;
mod eviction;
mod fetch;
mod spatial;
mod spatial_index;
mod state;

pub use batch::{sequence_batches, BATCH_SIZE, MAX_CONCURRENT_BATCHES, PRIORITY_WINDOW};
pub use calculator::{GraphCalculator, TileCalculator, TILE_PRECISION, TILE_THRESHOLD_METERS};
pub use coalesce::{CacheFuture, CoalesceResult, CoalescerStats, GraphTask, RequestCoalescer};
pub use config::{
    GraphConfig, DEFAULT_MAX_SEQUENCES, DEFAULT_MAX_UNUSED_NODES,
    DEFAULT_MAX_UNUSED_PRE_STORED_NODES, DEFAULT_MAX_UNUSED_TILES,
};

use crate::api::DataSource;
use crate::edge::{DefaultEdgeCalculator, EdgeCalculator};
use crate::entity::{Node, NodeCache, Sequence};
use crate::error::GraphError;
use crate::filter::FilterCreator;
use parking_lot::Mutex;
use serde_json::Value;
use state::GraphState;
use std::sync::Arc;
use tracing::debug;

struct GraphInner<D> {
    source: Arc<D>,
    calculator: Arc<dyn TileCalculator>,
    edge_calculator: Arc<dyn EdgeCalculator>,
    filter_creator: FilterCreator,
    config: GraphConfig,
    state: Mutex<GraphState>,
    caching_full: RequestCoalescer<String>,
    caching_fill: RequestCoalescer<String>,
    caching_tiles: RequestCoalescer<String>,
    caching_sequence: RequestCoalescer<String>,
    caching_sequence_nodes: RequestCoalescer<String>,
    caching_spatial_area: RequestCoalescer<String>,
}

/// Handle to a graph. Clones share the same state.
pub struct Graph<D: DataSource> {
    inner: Arc<GraphInner<D>>,
}

impl<D: DataSource> Clone for Graph<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// In-flight fetch statistics per operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub full: CoalescerStats,
    pub fill: CoalescerStats,
    pub tiles: CoalescerStats,
    pub sequences: CoalescerStats,
    pub sequence_nodes: CoalescerStats,
}

impl<D: DataSource> Graph<D> {
    /// Creates a graph with default limits and edge calculator.
    pub fn new(source: Arc<D>) -> Self {
        Self::with_options(
            source,
            GraphConfig::default(),
            Arc::new(DefaultEdgeCalculator::new()),
        )
    }

    pub fn with_options(
        source: Arc<D>,
        config: GraphConfig,
        edge_calculator: Arc<dyn EdgeCalculator>,
    ) -> Self {
        Self::from_parts(
            source,
            config,
            Arc::new(GraphCalculator::new()),
            edge_calculator,
        )
    }

    /// Creates a graph from all of its collaborators.
    pub fn from_parts(
        source: Arc<D>,
        config: GraphConfig,
        calculator: Arc<dyn TileCalculator>,
        edge_calculator: Arc<dyn EdgeCalculator>,
    ) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                source,
                calculator,
                edge_calculator,
                filter_creator: FilterCreator::new(),
                config,
                state: Mutex::new(GraphState::new()),
                caching_full: RequestCoalescer::new("full"),
                caching_fill: RequestCoalescer::new("fill"),
                caching_tiles: RequestCoalescer::new("tiles"),
                caching_sequence: RequestCoalescer::new("sequence"),
                caching_sequence_nodes: RequestCoalescer::new("sequence_nodes"),
                caching_spatial_area: RequestCoalescer::new("spatial_area"),
            }),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    pub fn calculator(&self) -> &dyn TileCalculator {
        self.inner.calculator.as_ref()
    }

    /// Checks if the node is in the graph, recording an access.
    pub fn has_node(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock();
        let exists = state.nodes.contains_key(key);
        if exists {
            state.touch_node(key);
        }
        exists
    }

    /// Returns the node, recording an access.
    pub fn get_node(&self, key: &str) -> Result<Node, GraphError> {
        let mut state = self.inner.state.lock();
        let node = state.node(key)?;
        state.touch_node(key);
        Ok(node)
    }

    pub fn has_sequence(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock();
        let exists = state.sequences.contains_key(key);
        if exists {
            state.touch_sequence(key);
        }
        exists
    }

    /// Returns the sequence, recording an access.
    pub fn get_sequence(&self, key: &str) -> Result<Arc<Sequence>, GraphError> {
        let mut state = self.inner.state.lock();
        let sequence = state
            .sequences
            .get(key)
            .map(|cached| Arc::clone(&cached.sequence))
            .ok_or_else(|| GraphError::SequenceNotFound(key.to_string()))?;
        state.touch_sequence(key);
        Ok(sequence)
    }

    pub fn node_count(&self) -> usize {
        self.inner.state.lock().nodes.len()
    }

    pub fn sequence_count(&self) -> usize {
        self.inner.state.lock().sequences.len()
    }

    pub fn is_caching_full(&self, key: &str) -> bool {
        self.inner.caching_full.is_in_flight(&key.to_string())
    }

    pub fn is_caching_fill(&self, key: &str) -> bool {
        self.inner.caching_fill.is_in_flight(&key.to_string())
    }

    pub fn is_caching_sequence(&self, sequence_key: &str) -> bool {
        self.inner
            .caching_sequence
            .is_in_flight(&sequence_key.to_string())
    }

    pub fn is_caching_sequence_nodes(&self, sequence_key: &str) -> bool {
        self.inner
            .caching_sequence_nodes
            .is_in_flight(&sequence_key.to_string())
    }

    pub fn is_caching_spatial_area(&self, key: &str) -> bool {
        self.inner.caching_spatial_area.is_in_flight(&key.to_string())
    }

    /// True if the sequence of the node is being fetched.
    pub fn is_caching_node_sequence(&self, key: &str) -> bool {
        let sequence_key = {
            let state = self.inner.state.lock();
            state.nodes.get(key).and_then(|n| n.sequence_key().ok().flatten())
        };
        sequence_key.is_some_and(|s| self.is_caching_sequence(&s))
    }

    /// True if the sequence of the node is cached.
    pub fn has_node_sequence(&self, key: &str) -> bool {
        let state = self.inner.state.lock();
        state
            .nodes
            .get(key)
            .and_then(|n| n.sequence_key().ok().flatten())
            .is_some_and(|s| state.sequences.contains_key(&s))
    }

    pub fn has_sequence_nodes(&self, sequence_key: &str) -> bool {
        self.inner
            .state
            .lock()
            .cached_sequence_nodes
            .contains(sequence_key)
    }

    pub fn has_initialized_cache(&self, key: &str) -> bool {
        self.inner.state.lock().cached_nodes.contains(key)
    }

    /// Attaches an empty asset cache to the node.
    pub fn initialize_cache(&self, key: &str) -> Result<(), GraphError> {
        let mut state = self.inner.state.lock();
        let node = state.node(key)?;
        if state.cached_nodes.contains(key) {
            return Err(GraphError::contract(format!(
                "Node already in cache ({key})"
            )));
        }
        node.initialize_cache(NodeCache::new())?;
        state.cached_nodes.insert(key.to_string());
        state.touch_node(key);
        Ok(())
    }

    /// Compiles and installs a filter for spatial edge candidates.
    ///
    /// Already computed spatial edges are kept; call
    /// [`reset_spatial_edges`](Self::reset_spatial_edges) to recompute them.
    pub fn set_filter(&self, expression: &Value) {
        let filter = self.inner.filter_creator.create_filter(expression);
        self.inner.state.lock().filter = filter;
        debug!(filter = %expression, "Filter set");
    }

    /// Clears spatial edges of every node and forgets the memoized tiles
    /// and spatial areas.
    pub fn reset_spatial_edges(&self) {
        let mut state = self.inner.state.lock();
        let keys: Vec<String> = state.cached_spatial_edges.drain().collect();
        for key in &keys {
            if let Some(node) = state.nodes.get(key) {
                node.reset_spatial_edges();
            }
        }
        state.memoized_tiles.clear();
        state.cached_node_tiles.clear();
        state.required_spatial_area.clear();
        debug!(nodes = keys.len(), "Spatial edges reset");
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            full: self.inner.caching_full.stats(),
            fill: self.inner.caching_fill.stats(),
            tiles: self.inner.caching_tiles.stats(),
            sequences: self.inner.caching_sequence.stats(),
            sequence_nodes: self.inner.caching_sequence_nodes.stats(),
        }
    }

    /// Fails with `Aborted` if a reset happened since `generation`.
    fn check_generation(state: &GraphState, generation: u64) -> Result<(), GraphError> {
        if state.generation != generation {
            debug!(
                started = generation,
                current = state.generation,
                "Discarding response from before reset"
            );
            return Err(GraphError::Aborted);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::api::mock::MockDataSource;

    pub fn graph() -> (Graph<MockDataSource>, Arc<MockDataSource>) {
        graph_with_config(GraphConfig::default())
    }

    pub fn graph_with_config(
        config: GraphConfig,
    ) -> (Graph<MockDataSource>, Arc<MockDataSource>) {
        let source = Arc::new(MockDataSource::new());
        let graph = Graph::with_options(
            Arc::clone(&source),
            config,
            Arc::new(DefaultEdgeCalculator::new()),
        );
        (graph, source)
    }

    pub fn graph_with_calculator(
        calculator: Arc<dyn TileCalculator>,
    ) -> (Graph<MockDataSource>, Arc<MockDataSource>) {
        let source = Arc::new(MockDataSource::new());
        let graph = Graph::from_parts(
            Arc::clone(&source),
            GraphConfig::default(),
            calculator,
            Arc::new(DefaultEdgeCalculator::new()),
        );
        (graph, source)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::graph;
    use crate::api::mock::full_record;
    use crate::error::GraphError;

    #[tokio::test]
    async fn test_initialize_cache_once() {
        let (graph, source) = graph();
        source.add_full(full_record("a", 55.0, 13.0, "s1"));
        graph.cache_full("a").unwrap().await.unwrap();

        assert!(!graph.has_initialized_cache("a"));
        graph.initialize_cache("a").unwrap();
        assert!(graph.has_initialized_cache("a"));
        assert!(matches!(
            graph.initialize_cache("a"),
            Err(GraphError::Contract(_))
        ));
    }

    #[test]
    fn test_missing_node() {
        let (graph, _) = graph();
        assert!(!graph.has_node("a"));
        assert!(matches!(graph.get_node("a"), Err(GraphError::NodeNotFound(_))));
        assert!(matches!(
            graph.get_sequence("s"),
            Err(GraphError::SequenceNotFound(_))
        ));
        assert!(graph.initialize_cache("a").is_err());
    }
}
