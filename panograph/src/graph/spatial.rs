//! Tiles, spatial areas and edges.

use super::batch::BATCH_SIZE;
use super::coalesce::CacheFuture;
use super::state::{CachedTile, GraphState, SpatialArea};
use super::Graph;
use crate::api::DataSource;
use crate::coord::LatLon;
use crate::entity::Node;
use crate::error::GraphError;
use futures::future::{join_all, try_join_all};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

impl<D: DataSource> Graph<D> {
    /// True if every tile covering the node is cached.
    ///
    /// The covering tiles are computed once per node and reused until the
    /// spatial edges are reset.
    pub fn has_tiles(&self, key: &str) -> Result<bool, GraphError> {
        let mut state = self.inner.state.lock();
        state.node(key)?;
        state.tiles_cached(key, self.inner.calculator.as_ref())
    }

    /// True if any tile covering the node is being fetched.
    pub fn is_caching_tiles(&self, key: &str) -> bool {
        let mut state = self.inner.state.lock();
        if state.cached_node_tiles.contains(key) {
            return false;
        }
        match state.node_tiles(key, self.inner.calculator.as_ref()) {
            Ok(hs) => hs.iter().any(|h| self.inner.caching_tiles.is_in_flight(h)),
            Err(_) => false,
        }
    }

    /// Fetches the uncached tiles covering the node.
    ///
    /// Returns one future per tile that is not cached yet; tiles already in
    /// flight are joined rather than requested again.
    pub fn cache_tiles(&self, key: &str) -> Result<Vec<CacheFuture>, GraphError> {
        let mut state = self.inner.state.lock();
        state.node(key)?;
        if state.cached_node_tiles.contains(key) {
            return Err(GraphError::contract(format!("Tiles already cached ({key})")));
        }
        let hs = state.node_tiles(key, self.inner.calculator.as_ref())?;
        Ok(hs
            .iter()
            .filter(|h| !state.cached_tiles.contains_key(*h))
            .map(|h| self.tile_task(&state, h))
            .collect())
    }

    /// Fetches a single tile unless it is cached.
    pub(crate) fn cache_tile(&self, h: &str) -> CacheFuture {
        let state = self.inner.state.lock();
        if state.cached_tiles.contains_key(h) {
            return async { Ok(()) }.boxed().shared();
        }
        self.tile_task(&state, h)
    }

    fn tile_task(&self, state: &GraphState, h: &str) -> CacheFuture {
        let generation = state.generation;
        let graph = self.clone();
        let owned = h.to_string();
        self.inner
            .caching_tiles
            .register(h.to_string(), move || {
                async move { graph.load_tile(owned, generation).await }.boxed()
            })
            .into_future()
    }

    async fn load_tile(&self, h: String, generation: u64) -> Result<(), GraphError> {
        debug!(tile = %h, "Fetching tile");
        let mut tiles = self
            .inner
            .source
            .fetch_by_tiles(std::slice::from_ref(&h))
            .await?;
        let records = tiles.remove(&h).unwrap_or_default();

        let mut state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        if state.cached_tiles.contains_key(&h) {
            return Ok(());
        }

        let mut nodes = Vec::with_capacity(records.len());
        for (index, core) in records {
            if core.sequence_key.is_none() {
                warn!(tile = %h, index, key = %core.key, "Skipping tile node without sequence key");
                continue;
            }
            if state.node_to_tile.contains_key(&core.key) {
                continue;
            }
            let node = match state.nodes.get(&core.key) {
                Some(existing) => existing.clone(),
                None => {
                    let node = Node::new(core);
                    state.insert_node(node.clone());
                    node
                }
            };
            let key = node.key().to_string();
            let Ok(position) = node.lat_lon() else {
                continue;
            };
            state.pre_stored.remove(&key);
            state.node_index.insert(&key, &position);
            state.node_to_tile.insert(key, h.clone());
            nodes.push(node);
        }

        debug!(tile = %h, nodes = nodes.len(), "Tile cached");
        let accessed = state.tick();
        state.cached_tiles.insert(h, CachedTile { accessed, nodes });
        Ok(())
    }

    /// True if the node's tiles are cached and every node around it is
    /// full, i.e. spatial edges can be computed.
    ///
    /// The nodes around the node are determined once and reused until the
    /// spatial edges are cached or reset.
    pub fn has_spatial_area(&self, key: &str) -> Result<bool, GraphError> {
        let mut state = self.inner.state.lock();
        let node = state.node(key)?;
        if state.cached_spatial_edges.contains(key) {
            return Ok(true);
        }
        if !state.tiles_cached(key, self.inner.calculator.as_ref())? {
            return Ok(false);
        }
        if let Some(area) = state.required_spatial_area.get(key) {
            return Ok(area.cache_keys.is_empty());
        }

        let calculator = self.inner.calculator.as_ref();
        let (sw, ne) = calculator.bounding_box_corners(&node.lat_lon()?, calculator.threshold());
        let mut area = SpatialArea {
            all: HashMap::new(),
            cache_keys: Vec::new(),
        };
        for area_key in state.node_index.search(&sw, &ne) {
            let Some(area_node) = state.nodes.get(&area_key) else {
                continue;
            };
            if !area_node.is_full() {
                area.cache_keys.push(area_key.clone());
            }
            area.all.insert(area_key, area_node.clone());
        }

        let complete = area.cache_keys.is_empty();
        state.required_spatial_area.insert(key.to_string(), area);
        Ok(complete)
    }

    /// Fills the core nodes around the node, in batches.
    ///
    /// Requires [`has_spatial_area`](Self::has_spatial_area) to have
    /// determined the area. Nodes whose batch fails are dropped from the
    /// area so spatial edges can still be computed over the others; the
    /// first batch error is returned.
    pub fn cache_spatial_area(&self, key: &str) -> Result<CacheFuture, GraphError> {
        let state = self.inner.state.lock();
        state.node(key)?;
        if state.cached_spatial_edges.contains(key) {
            return Err(GraphError::contract(format!(
                "Spatial edges already cached ({key})"
            )));
        }
        let area = state.required_spatial_area.get(key).ok_or_else(|| {
            GraphError::contract(format!("Spatial area not determined ({key})"))
        })?;
        if let Some(existing) = self.inner.caching_spatial_area.get(&key.to_string()) {
            return Ok(existing);
        }
        if area.cache_keys.is_empty() {
            return Err(GraphError::contract(format!(
                "Spatial area already cached ({key})"
            )));
        }

        let generation = state.generation;
        let mut waits = Vec::new();
        let mut to_fetch = Vec::new();
        for area_key in &area.cache_keys {
            if let Some(existing) = self.inner.caching_fill.get(area_key) {
                waits.push(existing);
            } else if let Some(existing) = self.inner.caching_full.get(area_key) {
                waits.push(existing);
            } else {
                to_fetch.push(area_key.clone());
            }
        }
        waits.extend(self.fill_batches(to_fetch, generation));

        let graph = self.clone();
        let owned = key.to_string();
        let result = self
            .inner
            .caching_spatial_area
            .register(key.to_string(), move || {
                async move {
                    let results = join_all(waits).await;
                    graph.settle_spatial_area(&owned, generation);
                    results.into_iter().collect::<Result<Vec<()>, GraphError>>()?;
                    Ok(())
                }
                .boxed()
            });
        Ok(result.into_future())
    }

    /// Registers fill requests for `keys`, at most [`BATCH_SIZE`] per batch.
    fn fill_batches(&self, keys: Vec<String>, generation: u64) -> Vec<CacheFuture> {
        keys.chunks(BATCH_SIZE)
            .map(|batch| {
                let graph = self.clone();
                let batch = batch.to_vec();
                let owned = batch.clone();
                self.inner.caching_fill.register_batch(
                    batch,
                    async move { graph.load_fill(owned, generation).await }.boxed(),
                )
            })
            .collect()
    }

    /// Drops area nodes that are still not full after filling.
    fn settle_spatial_area(&self, key: &str, generation: u64) {
        let mut state = self.inner.state.lock();
        if state.generation != generation {
            return;
        }
        let Some(area) = state.required_spatial_area.get_mut(key) else {
            return;
        };
        let pending = std::mem::take(&mut area.cache_keys);
        let mut dropped = 0;
        for area_key in pending {
            let full = area.all.get(&area_key).is_some_and(Node::is_full);
            if !full {
                area.all.remove(&area_key);
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(key = %key, dropped, "Dropped unfilled nodes from spatial area");
        }
    }

    /// Computes and stores the node's spatial edges.
    ///
    /// Candidates are the full nodes of the node's spatial area accepted by
    /// the active filter.
    pub fn cache_spatial_edges(&self, key: &str) -> Result<(), GraphError> {
        let (node, candidates, fallback_keys) = {
            let state = self.inner.state.lock();
            let node = state.node(key)?;
            if state.cached_spatial_edges.contains(key) {
                return Err(GraphError::contract(format!(
                    "Spatial edges already cached ({key})"
                )));
            }
            let area = state.required_spatial_area.get(key).ok_or_else(|| {
                GraphError::contract(format!("Spatial area not determined ({key})"))
            })?;
            if !area.cache_keys.is_empty() {
                return Err(GraphError::contract(format!(
                    "Spatial area not cached ({key})"
                )));
            }

            let filter = Arc::clone(&state.filter);
            let mut candidates: Vec<Node> = area
                .all
                .values()
                .filter(|n| !n.is_disposed() && filter(*n))
                .cloned()
                .collect();
            candidates.sort_by(|a, b| a.key().cmp(b.key()));

            let fallback_keys = node
                .sequence_key()?
                .and_then(|s| state.sequences.get(&s))
                .map(|cached| {
                    let sequence = &cached.sequence;
                    [sequence.find_prev_key(key), sequence.find_next_key(key)]
                        .into_iter()
                        .flatten()
                        .map(str::to_string)
                        .collect::<Vec<String>>()
                })
                .unwrap_or_default();
            (node, candidates, fallback_keys)
        };

        let edges = self.inner.edge_calculator.compute_spatial_edges(
            &node,
            &candidates,
            &fallback_keys,
        )?;
        node.cache_spatial_edges(edges)?;

        let mut state = self.inner.state.lock();
        state.cached_spatial_edges.insert(key.to_string());
        state.required_spatial_area.remove(key);
        Ok(())
    }

    /// Computes and stores the node's sequence edges.
    pub fn cache_sequence_edges(&self, key: &str) -> Result<(), GraphError> {
        let (node, sequence) = {
            let state = self.inner.state.lock();
            let node = state.node(key)?;
            let sequence = node
                .sequence_key()?
                .and_then(|s| state.sequences.get(&s))
                .map(|cached| Arc::clone(&cached.sequence))
                .ok_or_else(|| GraphError::contract(format!("Sequence is not cached ({key})")))?;
            (node, sequence)
        };

        let edges = self
            .inner
            .edge_calculator
            .compute_sequence_edges(&node, &sequence)?;
        node.cache_sequence_edges(edges)
    }

    /// Caches every tile overlapping the box and returns the nodes inside
    /// it, all completed to full nodes.
    pub async fn cache_bounding_box(
        &self,
        sw: LatLon,
        ne: LatLon,
    ) -> Result<Vec<Node>, GraphError> {
        let hs = self.inner.calculator.encode_hs_from_bounding_box(&sw, &ne)?;
        let tiles: Vec<CacheFuture> = hs.iter().map(|h| self.cache_tile(h)).collect();
        try_join_all(tiles).await?;

        let (nodes, waits) = {
            let state = self.inner.state.lock();
            let generation = state.generation;
            let nodes: Vec<Node> = state
                .node_index
                .search(&sw, &ne)
                .iter()
                .filter_map(|k| state.nodes.get(k).cloned())
                .collect();

            let mut waits = Vec::new();
            let mut to_fetch = Vec::new();
            for node in nodes.iter().filter(|n| !n.is_full()) {
                let key = node.key().to_string();
                if let Some(existing) = self.inner.caching_fill.get(&key) {
                    waits.push(existing);
                } else if let Some(existing) = self.inner.caching_full.get(&key) {
                    waits.push(existing);
                } else {
                    to_fetch.push(key);
                }
            }
            waits.extend(self.fill_batches(to_fetch, generation));
            (nodes, waits)
        };

        try_join_all(waits).await?;
        Ok(nodes)
    }
}
