//! Cancelable composite operations over a [`Graph`].

use super::image_loading::ImageLoadingService;
use super::mode::GraphMode;
use crate::api::{AssetLoader, DataSource, ProgressCallback};
use crate::coord::LatLon;
use crate::entity::{LoadStatus, Node, Sequence};
use crate::error::GraphError;
use crate::graph::{Graph, RequestCoalescer};
use futures::future::try_join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cancellation scopes of the service.
///
/// `root` is cancelled on reset. `spatial` is a child of `root` and is
/// additionally cancelled when the graph mode changes.
struct Tokens {
    root: CancellationToken,
    spatial: CancellationToken,
}

impl Tokens {
    fn new() -> Self {
        let root = CancellationToken::new();
        let spatial = root.child_token();
        Self { root, spatial }
    }
}

/// Runs `work` until it completes or `token` is cancelled.
///
/// Cancellation drops `work`, which releases every in-flight handle it
/// holds.
async fn cancellable<T, F>(token: &CancellationToken, work: F) -> Result<T, GraphError>
where
    F: Future<Output = Result<T, GraphError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(GraphError::Aborted),
        result = work => result,
    }
}

/// Orchestrates graph fetches, asset loading and edge computation for the
/// nodes a viewer navigates to.
pub struct GraphService<D: DataSource, A: AssetLoader> {
    graph: Graph<D>,
    loader: Arc<A>,
    image_loading: Arc<ImageLoadingService>,
    caching_assets: RequestCoalescer<String>,
    mode: watch::Sender<GraphMode>,
    tokens: Mutex<Tokens>,
}

impl<D: DataSource, A: AssetLoader> GraphService<D, A> {
    pub fn new(graph: Graph<D>, loader: Arc<A>) -> Self {
        let (mode, _) = watch::channel(GraphMode::default());
        Self {
            graph,
            loader,
            image_loading: Arc::new(ImageLoadingService::new()),
            caching_assets: RequestCoalescer::new("assets"),
            mode,
            tokens: Mutex::new(Tokens::new()),
        }
    }

    pub fn graph(&self) -> &Graph<D> {
        &self.graph
    }

    pub fn image_loading(&self) -> &ImageLoadingService {
        &self.image_loading
    }

    pub fn graph_mode(&self) -> GraphMode {
        *self.mode.borrow()
    }

    /// Observes the graph mode. The receiver starts at the current mode.
    pub fn graph_mode_changes(&self) -> watch::Receiver<GraphMode> {
        self.mode.subscribe()
    }

    /// Switches the graph mode, cancelling in-flight spatial edge caching.
    pub fn set_graph_mode(&self, mode: GraphMode) {
        let mut tokens = self.tokens.lock();
        if self.graph_mode() == mode {
            return;
        }
        tokens.spatial.cancel();
        tokens.spatial = tokens.root.child_token();
        self.mode.send_replace(mode);
        info!(mode = %mode, "Graph mode changed");
    }

    /// Brings a node to a navigable state and returns it.
    ///
    /// Fetches the node, loads its assets, caches its sequence edges and,
    /// in spatial mode, its spatial edges. Resolves to
    /// [`GraphError::Aborted`] if the service is reset meanwhile, or if the
    /// graph mode changes while spatial edges are being cached. The mode is
    /// read when the spatial step begins.
    pub async fn cache_node(&self, key: &str) -> Result<Node, GraphError> {
        let root = self.root_token();
        cancellable(&root, self.cache_node_steps(key)).await
    }

    async fn cache_node_steps(&self, key: &str) -> Result<Node, GraphError> {
        let node = self.ensure_full(key).await?;

        if !self.graph.has_initialized_cache(key) {
            self.graph.initialize_cache(key)?;
        }
        if !node.assets_cached() {
            self.cache_assets(&node).await?;
        }

        if !self.graph.has_node_sequence(key) {
            self.graph.cache_node_sequence(key)?.await?;
        }
        if !node.sequence_edges().cached {
            self.graph.cache_sequence_edges(key)?;
        }

        let spatial = {
            let tokens = self.tokens.lock();
            (self.graph_mode() == GraphMode::Spatial).then(|| tokens.spatial.clone())
        };
        if let Some(spatial) = spatial {
            cancellable(&spatial, self.cache_spatial(key)).await?;
        }

        debug!(key = %key, "Node cached");
        Ok(node)
    }

    /// Fetches the node full, or completes it if it is core, joining any
    /// fetch already in flight.
    async fn ensure_full(&self, key: &str) -> Result<Node, GraphError> {
        let pending = if self.graph.is_caching_full(key) || !self.graph.has_node(key) {
            Some(self.graph.cache_full(key)?)
        } else if !self.graph.get_node(key)?.is_full() {
            Some(self.graph.cache_fill(key)?)
        } else {
            None
        };
        if let Some(pending) = pending {
            pending.await?;
        }
        self.graph.get_node(key)
    }

    /// Loads the node's assets, joining a load already in flight.
    async fn cache_assets(&self, node: &Node) -> Result<(), GraphError> {
        let key = node.key().to_string();
        let pending = self
            .caching_assets
            .register(key.clone(), || {
                let node = node.clone();
                let loader = Arc::clone(&self.loader);
                let images = Arc::clone(&self.image_loading);
                async move {
                    let on_progress: ProgressCallback =
                        Arc::new(move |status: LoadStatus| images.load_node(&key, status));
                    node.cache_assets(loader.as_ref(), on_progress).await
                }
                .boxed()
            })
            .into_future();
        pending.await
    }

    async fn cache_spatial(&self, key: &str) -> Result<(), GraphError> {
        while !self.graph.has_spatial_area(key)? {
            if self.graph.has_tiles(key)? {
                self.graph.cache_spatial_area(key)?.await?;
            } else {
                try_join_all(self.graph.cache_tiles(key)?).await?;
            }
        }

        if !self.graph.get_node(key)?.spatial_edges().cached {
            self.graph.cache_spatial_edges(key)?;
        }
        Ok(())
    }

    /// Caches the tiles overlapping the box and returns its nodes, full.
    pub async fn cache_bounding_box(&self, sw: LatLon, ne: LatLon) -> Result<Vec<Node>, GraphError> {
        let root = self.root_token();
        cancellable(&root, self.graph.cache_bounding_box(sw, ne)).await
    }

    /// Returns the sequence, fetching it unless cached.
    pub async fn cache_sequence(&self, sequence_key: &str) -> Result<Arc<Sequence>, GraphError> {
        let root = self.root_token();
        cancellable(&root, self.ensure_sequence(sequence_key)).await
    }

    async fn ensure_sequence(&self, sequence_key: &str) -> Result<Arc<Sequence>, GraphError> {
        if !self.graph.has_sequence(sequence_key) {
            self.graph.cache_sequence(sequence_key)?.await?;
        }
        self.graph.get_sequence(sequence_key)
    }

    /// Returns the sequence after fetching it and all of its nodes.
    ///
    /// The nodes around `reference_key` are fetched first.
    pub async fn cache_sequence_nodes(
        &self,
        sequence_key: &str,
        reference_key: Option<&str>,
    ) -> Result<Arc<Sequence>, GraphError> {
        let root = self.root_token();
        cancellable(&root, async {
            let sequence = self.ensure_sequence(sequence_key).await?;
            if !self.graph.has_sequence_nodes(sequence_key) {
                self.graph
                    .cache_sequence_nodes(sequence_key, reference_key)?
                    .await?;
            }
            Ok(sequence)
        })
        .await
    }

    /// Fetches the node closest to a position and caches it as with
    /// [`cache_node`](Self::cache_node).
    pub async fn cache_node_close_to(&self, position: LatLon) -> Result<Option<Node>, GraphError> {
        let root = self.root_token();
        let key = cancellable(&root, self.graph.cache_node_close_to(position)).await?;
        match key {
            Some(key) => self.cache_node(&key).await.map(Some),
            None => Ok(None),
        }
    }

    /// Installs a new filter. Spatial edges are recomputed on the next
    /// [`cache_node`](Self::cache_node).
    pub fn set_filter(&self, expression: &Value) {
        self.graph.reset_spatial_edges();
        self.graph.set_filter(expression);
    }

    pub fn uncache(&self, keep_keys: &[String], keep_sequence_key: Option<&str>) {
        self.graph.uncache(keep_keys, keep_sequence_key);
    }

    /// Cancels every in-flight operation and resets the graph to
    /// `keep_keys`.
    ///
    /// Fails with [`GraphError::NodeNotFound`] without cancelling anything
    /// if a kept node is not in the graph.
    pub fn reset(&self, keep_keys: &[String]) -> Result<(), GraphError> {
        {
            let mut tokens = self.tokens.lock();
            if let Some(missing) = keep_keys.iter().find(|key| !self.graph.has_node(key)) {
                return Err(GraphError::NodeNotFound(missing.clone()));
            }
            tokens.root.cancel();
            *tokens = Tokens::new();
        }
        self.caching_assets.clear();
        self.graph.reset(keep_keys)?;
        info!(kept = keep_keys.len(), "Graph service reset");
        Ok(())
    }

    fn root_token(&self) -> CancellationToken {
        self.tokens.lock().root.clone()
    }
}
