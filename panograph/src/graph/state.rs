//! Mutable graph state guarded by the graph's lock.

use super::calculator::TileCalculator;
use super::spatial_index::SpatialIndex;
use crate::entity::{Node, Sequence};
use crate::error::GraphError;
use crate::filter::{accept_all, FilterFunction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A fetched tile and the nodes it contained.
pub(crate) struct CachedTile {
    pub accessed: u64,
    pub nodes: Vec<Node>,
}

/// Nodes around a node that spatial edges are computed from.
pub(crate) struct SpatialArea {
    pub all: HashMap<String, Node>,
    /// Keys in `all` that still need fill data
    pub cache_keys: Vec<String>,
}

pub(crate) struct CachedSequence {
    pub accessed: u64,
    pub sequence: Arc<Sequence>,
}

pub(crate) struct GraphState {
    /// Logical access clock, strictly increasing
    clock: u64,
    /// Bumped on reset; work started under an older generation is discarded
    pub generation: u64,

    pub nodes: HashMap<String, Node>,
    pub node_access: HashMap<String, u64>,
    pub node_index: SpatialIndex,
    /// Full nodes outside of cached tiles, with their tile
    pub pre_stored: HashMap<String, String>,
    /// Cache-initialized node keys
    pub cached_nodes: HashSet<String>,

    pub cached_tiles: HashMap<String, CachedTile>,
    pub node_to_tile: HashMap<String, String>,
    /// Memoized covering tiles per node, kept until spatial edges are reset
    pub memoized_tiles: HashMap<String, Vec<String>>,
    /// Nodes whose covering tiles are all cached
    pub cached_node_tiles: HashSet<String>,
    pub required_spatial_area: HashMap<String, SpatialArea>,
    pub cached_spatial_edges: HashSet<String>,

    pub sequences: HashMap<String, CachedSequence>,
    pub cached_sequence_nodes: HashSet<String>,

    pub filter: FilterFunction,
}

impl GraphState {
    pub fn new() -> Self {
        Self {
            clock: 0,
            generation: 0,
            nodes: HashMap::new(),
            node_access: HashMap::new(),
            node_index: SpatialIndex::new(),
            pre_stored: HashMap::new(),
            cached_nodes: HashSet::new(),
            cached_tiles: HashMap::new(),
            node_to_tile: HashMap::new(),
            memoized_tiles: HashMap::new(),
            cached_node_tiles: HashSet::new(),
            required_spatial_area: HashMap::new(),
            cached_spatial_edges: HashSet::new(),
            sequences: HashMap::new(),
            cached_sequence_nodes: HashSet::new(),
            filter: accept_all(),
        }
    }

    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    pub fn node(&self, key: &str) -> Result<Node, GraphError> {
        self.nodes
            .get(key)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(key.to_string()))
    }

    /// Records an access to a node and to the tile holding it.
    pub fn touch_node(&mut self, key: &str) {
        let now = self.tick();
        if let Some(accessed) = self.node_access.get_mut(key) {
            *accessed = now;
        }
        if let Some(tile) = self
            .node_to_tile
            .get(key)
            .and_then(|h| self.cached_tiles.get_mut(h))
        {
            tile.accessed = now;
        }
    }

    pub fn touch_sequence(&mut self, key: &str) {
        let now = self.tick();
        if let Some(cached) = self.sequences.get_mut(key) {
            cached.accessed = now;
        }
    }

    pub fn node_accessed(&self, key: &str) -> u64 {
        self.node_access.get(key).copied().unwrap_or(0)
    }

    pub fn insert_node(&mut self, node: Node) {
        let now = self.tick();
        let key = node.key().to_string();
        self.node_access.insert(key.clone(), now);
        self.nodes.insert(key, node);
    }

    pub fn pre_store(&mut self, h: String, key: &str) {
        self.pre_stored.insert(key.to_string(), h);
    }

    /// Covering tiles of a node, computed once.
    pub fn node_tiles(
        &mut self,
        key: &str,
        calculator: &dyn TileCalculator,
    ) -> Result<Vec<String>, GraphError> {
        if let Some(hs) = self.memoized_tiles.get(key) {
            return Ok(hs.clone());
        }
        let node = self.node(key)?;
        let hs = calculator.encode_hs(&node.original_lat_lon()?)?;
        self.memoized_tiles.insert(key.to_string(), hs.clone());
        Ok(hs)
    }

    /// True if every covering tile of the node is cached.
    pub fn tiles_cached(
        &mut self,
        key: &str,
        calculator: &dyn TileCalculator,
    ) -> Result<bool, GraphError> {
        if self.cached_node_tiles.contains(key) {
            return Ok(true);
        }
        let hs = self.node_tiles(key, calculator)?;
        if hs.iter().all(|h| self.cached_tiles.contains_key(h)) {
            self.cached_node_tiles.insert(key.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    /// Disposes a node and drops every reference the graph holds to it.
    pub fn remove_node(&mut self, key: &str) {
        if let Some(node) = self.nodes.remove(key) {
            node.dispose();
        }
        self.node_access.remove(key);
        self.node_index.remove(key);
        self.pre_stored.remove(key);
        self.cached_nodes.remove(key);
        self.node_to_tile.remove(key);
        self.memoized_tiles.remove(key);
        self.cached_node_tiles.remove(key);
        self.required_spatial_area.remove(key);
        self.cached_spatial_edges.remove(key);
    }

    /// Drops the asset cache and edges of a cache-initialized node.
    pub fn uncache_node(&mut self, key: &str) {
        if let Some(node) = self.nodes.get(key) {
            node.uncache();
            node.reset_sequence_edges();
            node.reset_spatial_edges();
        }
        self.cached_nodes.remove(key);
        self.cached_spatial_edges.remove(key);
    }

    /// Evicts a tile. Full nodes of `keep_sequence_key` survive as
    /// pre-stored nodes, every other member is removed.
    pub fn uncache_tile(&mut self, h: &str, keep_sequence_key: Option<&str>) {
        let Some(tile) = self.cached_tiles.remove(h) else {
            return;
        };
        let covered: Vec<String> = self
            .memoized_tiles
            .iter()
            .filter(|(_, hs)| hs.iter().any(|covering| covering == h))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &covered {
            self.cached_node_tiles.remove(key);
        }
        for node in tile.nodes {
            let key = node.key().to_string();
            self.node_to_tile.remove(&key);
            self.node_index.remove(&key);

            let keep = keep_sequence_key.is_some()
                && node.sequence_key().ok().flatten().as_deref() == keep_sequence_key
                && node.is_full();
            if keep {
                self.uncache_node(&key);
                self.pre_store(h.to_string(), &key);
            } else {
                self.remove_node(&key);
            }
        }
    }

    /// Drops everything except the filter and clocks.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.node_access.clear();
        self.node_index.clear();
        self.pre_stored.clear();
        self.cached_nodes.clear();
        self.cached_tiles.clear();
        self.node_to_tile.clear();
        self.memoized_tiles.clear();
        self.cached_node_tiles.clear();
        self.required_spatial_area.clear();
        self.cached_spatial_edges.clear();
        self.sequences.clear();
        self.cached_sequence_nodes.clear();
    }
}
