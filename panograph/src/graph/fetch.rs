//! Node and sequence fetches.

use super::batch::{sequence_batches, MAX_CONCURRENT_BATCHES};
use super::coalesce::CacheFuture;
use super::state::{CachedSequence, GraphState};
use super::Graph;
use crate::api::{DataSource, DataSourceError, FullNodeRecord};
use crate::coord::LatLon;
use crate::entity::{Node, Sequence};
use crate::error::GraphError;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

impl<D: DataSource> Graph<D> {
    /// Fetches a node that is not in the graph.
    ///
    /// Joins an in-flight fetch for the same key. Fails immediately if the
    /// node already exists or is being filled. A node that shows up through
    /// a tile while the fetch is in flight is completed in place.
    pub fn cache_full(&self, key: &str) -> Result<CacheFuture, GraphError> {
        let state = self.inner.state.lock();
        // An in-flight fetch is joined even if a tile inserted the node
        // as core meanwhile.
        if !self.is_caching_full(key) && state.nodes.contains_key(key) {
            return Err(GraphError::contract(format!(
                "Cannot cache full node that already exist in graph ({key})"
            )));
        }
        if self.is_caching_fill(key) {
            return Err(GraphError::contract(format!(
                "Cannot cache full node while filling it ({key})"
            )));
        }

        let generation = state.generation;
        let graph = self.clone();
        let owned = key.to_string();
        let result = self.inner.caching_full.register(key.to_string(), move || {
            async move { graph.load_full(owned, generation).await }.boxed()
        });
        Ok(result.into_future())
    }

    async fn load_full(&self, key: String, generation: u64) -> Result<(), GraphError> {
        debug!(key = %key, "Fetching full node");
        let mut records = self
            .inner
            .source
            .fetch_full_by_keys(std::slice::from_ref(&key))
            .await?;
        let record = records
            .remove(&key)
            .ok_or_else(|| DataSourceError::NotFound(key.clone()))?;

        let mut state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        self.store_full_record(&mut state, record)?;
        state.touch_node(&key);
        Ok(())
    }

    /// Inserts a full record as a pre-stored node, or completes an existing
    /// core node with it.
    fn store_full_record(
        &self,
        state: &mut GraphState,
        record: FullNodeRecord,
    ) -> Result<Node, GraphError> {
        if let Some(node) = state.nodes.get(record.key()).cloned() {
            if !node.is_full() {
                node.make_full(record.fill)?;
            }
            return Ok(node);
        }

        if record.core.sequence_key.is_none() {
            return Err(GraphError::InvalidData {
                key: record.key().to_string(),
                reason: "Node has no sequence key".to_string(),
            });
        }

        let h = self.inner.calculator.encode_h(&record.core.original_lat_lon)?;
        let key = record.key().to_string();
        let node = Node::from_full(record);
        state.insert_node(node.clone());
        state.pre_store(h, &key);
        Ok(node)
    }

    /// Completes a core node discovered through a tile.
    ///
    /// Fails immediately if the node does not exist, is already full or is
    /// being fetched through [`cache_full`](Self::cache_full).
    pub fn cache_fill(&self, key: &str) -> Result<CacheFuture, GraphError> {
        let state = self.inner.state.lock();
        if self.is_caching_full(key) {
            return Err(GraphError::contract(format!(
                "Cannot fill node while caching it full ({key})"
            )));
        }
        let node = state.node(key)?;
        if let Some(existing) = self.inner.caching_fill.get(&key.to_string()) {
            return Ok(existing);
        }
        if node.is_full() {
            return Err(GraphError::contract(format!(
                "Cannot fill node that is already full ({key})"
            )));
        }

        let generation = state.generation;
        let graph = self.clone();
        let keys = vec![key.to_string()];
        let result = self.inner.caching_fill.register(key.to_string(), move || {
            async move { graph.load_fill(keys, generation).await }.boxed()
        });
        Ok(result.into_future())
    }

    /// Fetches fill data for core nodes. Nodes missing from the response
    /// stay core and fail the batch after the others are completed.
    pub(super) async fn load_fill(
        &self,
        keys: Vec<String>,
        generation: u64,
    ) -> Result<(), GraphError> {
        debug!(count = keys.len(), "Fetching fill batch");
        let mut records = self.inner.source.fetch_fill_by_keys(&keys).await?;

        let state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        let mut missing = Vec::new();
        for key in &keys {
            let Some(fill) = records.remove(key) else {
                missing.push(key.clone());
                continue;
            };
            match state.nodes.get(key) {
                Some(node) if !node.is_full() => node.make_full(fill)?,
                Some(_) => {}
                None => debug!(key = %key, "Dropping fill for node no longer in graph"),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            warn!(missing = ?missing, "Fill response incomplete");
            Err(DataSourceError::NotFound(missing.join(",")).into())
        }
    }

    /// Fetches a sequence that is not in the graph.
    pub fn cache_sequence(&self, sequence_key: &str) -> Result<CacheFuture, GraphError> {
        let state = self.inner.state.lock();
        if state.sequences.contains_key(sequence_key) {
            return Err(GraphError::contract(format!(
                "Sequence already cached ({sequence_key})"
            )));
        }
        Ok(self.sequence_task(&state, sequence_key))
    }

    /// Fetches the sequence a node belongs to.
    pub fn cache_node_sequence(&self, key: &str) -> Result<CacheFuture, GraphError> {
        let state = self.inner.state.lock();
        let node = state.node(key)?;
        let sequence_key = node.sequence_key()?.ok_or_else(|| GraphError::InvalidData {
            key: key.to_string(),
            reason: "Node has no sequence key".to_string(),
        })?;
        if state.sequences.contains_key(&sequence_key) {
            return Err(GraphError::contract(format!(
                "Sequence already cached ({key}), ({sequence_key})"
            )));
        }
        Ok(self.sequence_task(&state, &sequence_key))
    }

    fn sequence_task(&self, state: &GraphState, sequence_key: &str) -> CacheFuture {
        let generation = state.generation;
        let graph = self.clone();
        let owned = sequence_key.to_string();
        self.inner
            .caching_sequence
            .register(sequence_key.to_string(), move || {
                async move { graph.load_sequence(owned, generation).await }.boxed()
            })
            .into_future()
    }

    async fn load_sequence(&self, sequence_key: String, generation: u64) -> Result<(), GraphError> {
        debug!(sequence = %sequence_key, "Fetching sequence");
        let record = self
            .inner
            .source
            .fetch_sequence_by_key(&sequence_key)
            .await?;
        if record.key != sequence_key {
            return Err(GraphError::InvalidData {
                key: sequence_key,
                reason: format!("Response is for sequence {}", record.key),
            });
        }

        let mut state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        let accessed = state.tick();
        state.sequences.insert(
            sequence_key,
            CachedSequence {
                accessed,
                sequence: Arc::new(Sequence::new(record)),
            },
        );
        Ok(())
    }

    /// Fetches every node of a cached sequence.
    ///
    /// Keys are requested in batches (see [`sequence_batches`]), the batch
    /// around `reference_key` first, with a bounded number of batches in
    /// flight. Any failing batch fails the whole operation and leaves the
    /// sequence nodes uncached.
    pub fn cache_sequence_nodes(
        &self,
        sequence_key: &str,
        reference_key: Option<&str>,
    ) -> Result<CacheFuture, GraphError> {
        let state = self.inner.state.lock();
        let sequence = state
            .sequences
            .get(sequence_key)
            .map(|cached| Arc::clone(&cached.sequence))
            .ok_or_else(|| GraphError::SequenceNotFound(sequence_key.to_string()))?;
        if let Some(existing) = self
            .inner
            .caching_sequence_nodes
            .get(&sequence_key.to_string())
        {
            return Ok(existing);
        }
        if state.cached_sequence_nodes.contains(sequence_key) {
            return Err(GraphError::contract(format!(
                "Sequence nodes already cached ({sequence_key})"
            )));
        }

        let generation = state.generation;
        let graph = self.clone();
        let reference = reference_key.map(str::to_string);
        let result = self
            .inner
            .caching_sequence_nodes
            .register(sequence_key.to_string(), move || {
                async move {
                    graph
                        .load_sequence_nodes(sequence, reference, generation)
                        .await
                }
                .boxed()
            });
        Ok(result.into_future())
    }

    async fn load_sequence_nodes(
        &self,
        sequence: Arc<Sequence>,
        reference_key: Option<String>,
        generation: u64,
    ) -> Result<(), GraphError> {
        let batches = sequence_batches(sequence.keys(), reference_key.as_deref());
        debug!(
            sequence = %sequence.key(),
            keys = sequence.keys().len(),
            batches = batches.len(),
            "Fetching sequence nodes"
        );

        let mut results = futures::stream::iter(batches.into_iter().map(|batch| {
            let graph = self.clone();
            async move { graph.load_sequence_batch(batch, generation).await }
        }))
        .buffered(MAX_CONCURRENT_BATCHES);

        while let Some(result) = results.next().await {
            result?;
        }

        let mut state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        state
            .cached_sequence_nodes
            .insert(sequence.key().to_string());
        Ok(())
    }

    async fn load_sequence_batch(
        &self,
        batch: Vec<String>,
        generation: u64,
    ) -> Result<(), GraphError> {
        let mut records = self.inner.source.fetch_full_by_keys(&batch).await?;

        let mut state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        for key in &batch {
            let Some(record) = records.remove(key) else {
                continue;
            };
            if let Err(e) = self.store_full_record(&mut state, record) {
                match e {
                    GraphError::InvalidData { .. } => {
                        warn!(key = %key, error = %e, "Skipping sequence node")
                    }
                    other => return Err(other),
                }
            }
        }
        Ok(())
    }

    /// Fetches the node closest to a position and stores it.
    ///
    /// Returns the node key, or `None` if nothing is nearby.
    pub async fn cache_node_close_to(&self, position: LatLon) -> Result<Option<String>, GraphError> {
        position.validate()?;
        let generation = self.inner.state.lock().generation;
        let Some(record) = self.inner.source.fetch_node_close_to(position).await? else {
            return Ok(None);
        };

        let mut state = self.inner.state.lock();
        Self::check_generation(&state, generation)?;
        let node = self.store_full_record(&mut state, record)?;
        state.touch_node(node.key());
        Ok(Some(node.key().to_string()))
    }
}
