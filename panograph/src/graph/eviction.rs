//! Least-recently-used eviction of nodes, tiles and sequences.
//!
//! `uncache` runs four passes, each keeping the most recently accessed
//! entries up to its limit:
//!
//! 1. Tiles not covering any node in use. Members of an evicted tile are
//!    removed, except full nodes of the kept sequence which become
//!    pre-stored.
//! 2. Pre-stored nodes without an asset cache. Evicted nodes are disposed.
//! 3. Cache-initialized nodes. Evicted nodes only lose their assets and
//!    edges.
//! 4. Sequences.
//!
//! A node is in use if it is protected by the caller, has a fetch in flight
//! or is part of an ongoing tile or spatial area computation.

use super::Graph;
use crate::api::DataSource;
use crate::error::GraphError;
use std::collections::HashSet;
use tracing::{debug, info};

impl<D: DataSource> Graph<D> {
    /// Evicts least recently used entities beyond the configured limits.
    ///
    /// Nodes in `keep_keys` and nodes of `keep_sequence_key` are never
    /// disposed; the kept sequence itself is never evicted.
    pub fn uncache(&self, keep_keys: &[String], keep_sequence_key: Option<&str>) {
        let config = self.inner.config;
        let mut state = self.inner.state.lock();

        let mut keys_in_use: HashSet<String> = keep_keys.iter().cloned().collect();
        keys_in_use.extend(self.inner.caching_full.keys());
        keys_in_use.extend(self.inner.caching_fill.keys());
        keys_in_use.extend(self.inner.caching_spatial_area.keys());
        keys_in_use.extend(
            state
                .memoized_tiles
                .keys()
                .filter(|key| !state.cached_node_tiles.contains(*key))
                .cloned(),
        );
        for (key, area) in &state.required_spatial_area {
            keys_in_use.insert(key.clone());
            keys_in_use.extend(area.all.keys().cloned());
        }

        let mut keep_hs: HashSet<String> = HashSet::new();
        for key in &keys_in_use {
            let Some(position) = state
                .nodes
                .get(key)
                .and_then(|n| n.original_lat_lon().ok())
            else {
                continue;
            };
            if let Ok(hs) = self.inner.calculator.encode_hs(&position) {
                keep_hs.extend(hs);
            }
        }

        let in_keep_sequence = |sequence_key: Option<String>| {
            keep_sequence_key.is_some() && sequence_key.as_deref() == keep_sequence_key
        };

        // Tiles
        let mut tiles: Vec<(u64, String)> = state
            .cached_tiles
            .iter()
            .filter(|(h, _)| !keep_hs.contains(*h) && !self.inner.caching_tiles.is_in_flight(h))
            .map(|(h, tile)| (tile.accessed, h.clone()))
            .collect();
        tiles.sort_unstable_by(|a, b| b.cmp(a));
        let evicted_tiles: Vec<String> = tiles
            .into_iter()
            .skip(config.max_unused_tiles)
            .map(|(_, h)| h)
            .collect();
        for h in &evicted_tiles {
            state.uncache_tile(h, keep_sequence_key);
        }

        // Pre-stored nodes
        let mut pre_stored: Vec<(u64, String)> = state
            .pre_stored
            .keys()
            .filter(|key| !state.cached_nodes.contains(*key) && !keys_in_use.contains(*key))
            .filter(|key| {
                let sequence_key = state
                    .nodes
                    .get(*key)
                    .and_then(|n| n.sequence_key().ok().flatten());
                !in_keep_sequence(sequence_key)
            })
            .map(|key| (state.node_accessed(key), key.clone()))
            .collect();
        pre_stored.sort_unstable_by(|a, b| b.cmp(a));
        let disposed: Vec<String> = pre_stored
            .into_iter()
            .skip(config.max_unused_pre_stored_nodes)
            .map(|(_, key)| key)
            .collect();
        for key in &disposed {
            state.remove_node(key);
        }

        // Cache-initialized nodes
        let mut cached: Vec<(u64, String)> = state
            .cached_nodes
            .iter()
            .filter(|key| !keys_in_use.contains(*key))
            .filter(|key| {
                let sequence_key = state
                    .nodes
                    .get(*key)
                    .and_then(|n| n.sequence_key().ok().flatten());
                !in_keep_sequence(sequence_key)
            })
            .map(|key| (state.node_accessed(key), key.clone()))
            .collect();
        cached.sort_unstable_by(|a, b| b.cmp(a));
        let uncached: Vec<String> = cached
            .into_iter()
            .skip(config.max_unused_nodes)
            .map(|(_, key)| key)
            .collect();
        for key in &uncached {
            state.uncache_node(key);
        }

        // Sequences
        let mut sequences: Vec<(u64, String)> = state
            .sequences
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != keep_sequence_key)
            .filter(|(key, _)| {
                !self.inner.caching_sequence.is_in_flight(key)
                    && !self.inner.caching_sequence_nodes.is_in_flight(key)
            })
            .map(|(key, cached)| (cached.accessed, key.clone()))
            .collect();
        sequences.sort_unstable_by(|a, b| b.cmp(a));
        let evicted_sequences: Vec<String> = sequences
            .into_iter()
            .skip(config.max_sequences)
            .map(|(_, key)| key)
            .collect();
        for key in &evicted_sequences {
            state.sequences.remove(key);
            state.cached_sequence_nodes.remove(key);
        }

        debug!(
            tiles = evicted_tiles.len(),
            pre_stored = disposed.len(),
            nodes = uncached.len(),
            sequences = evicted_sequences.len(),
            "Uncached graph"
        );
    }

    /// Drops every node except `keep_keys` and every sequence.
    ///
    /// Kept nodes lose their edges and become pre-stored. Fetches started
    /// before the reset resolve to [`GraphError::Aborted`].
    pub fn reset(&self, keep_keys: &[String]) -> Result<(), GraphError> {
        let mut state = self.inner.state.lock();
        let kept = keep_keys
            .iter()
            .map(|key| state.node(key))
            .collect::<Result<Vec<_>, _>>()?;
        let kept_keys: HashSet<&str> = keep_keys.iter().map(String::as_str).collect();

        for node in &kept {
            node.reset_sequence_edges();
            node.reset_spatial_edges();
        }
        for (key, node) in &state.nodes {
            if !kept_keys.contains(key.as_str()) {
                node.dispose();
            }
        }

        let initialized: Vec<bool> = kept
            .iter()
            .map(|node| state.cached_nodes.contains(node.key()))
            .collect();
        state.clear();
        state.generation += 1;

        for (node, initialized) in kept.into_iter().zip(initialized) {
            let key = node.key().to_string();
            let h = self.inner.calculator.encode_h(&node.original_lat_lon()?)?;
            state.insert_node(node);
            state.pre_store(h, &key);
            if initialized {
                state.cached_nodes.insert(key);
            }
        }

        for coalescer in [
            &self.inner.caching_full,
            &self.inner.caching_fill,
            &self.inner.caching_tiles,
            &self.inner.caching_sequence,
            &self.inner.caching_sequence_nodes,
            &self.inner.caching_spatial_area,
        ] {
            coalescer.clear();
        }

        info!(
            kept = keep_keys.len(),
            generation = state.generation,
            "Graph reset"
        );
        Ok(())
    }
}
