//! Shared test collaborators for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;

use panograph::api::{
    AssetLoader, DataSource, DataSourceError, FillNodeRecord, FullNodeRecord, ProgressCallback,
    SequenceRecord, TileNodes,
};
use panograph::coord::{encode_geohash, offset_position, LatLon};
use panograph::entity::{LoadStatus, Mesh};
use panograph::graph::TILE_PRECISION;

pub const ORIGIN: LatLon = LatLon {
    lat: 59.33,
    lon: 18.06,
};

/// Position `east`/`north` meters from [`ORIGIN`].
pub fn at(east: f64, north: f64) -> LatLon {
    offset_position(&ORIGIN, east, north)
}

/// Builds a full record the way the remote API returns it.
pub fn node_record(key: &str, position: LatLon, sequence_key: &str, captured_at: i64) -> FullNodeRecord {
    serde_json::from_value(json!({
        "key": key,
        "l": { "lat": position.lat, "lon": position.lon },
        "sequence_key": sequence_key,
        "captured_at": captured_at,
        "ca": 0.0,
        "user": { "key": "u1", "username": "walker" },
        "width": 4096,
        "height": 2048
    }))
    .unwrap()
}

/// Data source backed by in-memory maps that records every request.
pub struct RecordingSource {
    nodes: Mutex<HashMap<String, FullNodeRecord>>,
    tiles: Mutex<HashMap<String, TileNodes>>,
    sequences: Mutex<HashMap<String, SequenceRecord>>,
    failing: Mutex<HashSet<String>>,
    pub full_batches: Mutex<Vec<Vec<String>>>,
    pub fill_batches: Mutex<Vec<Vec<String>>>,
    pub tile_requests: Mutex<Vec<String>>,
    pub sequence_requests: Mutex<Vec<String>>,
    gate: watch::Sender<bool>,
}

impl RecordingSource {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            nodes: Mutex::new(HashMap::new()),
            tiles: Mutex::new(HashMap::new()),
            sequences: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            full_batches: Mutex::new(Vec::new()),
            fill_batches: Mutex::new(Vec::new()),
            tile_requests: Mutex::new(Vec::new()),
            sequence_requests: Mutex::new(Vec::new()),
            gate,
        }
    }

    /// Adds a node to its tile and makes it fetchable by key.
    pub fn add_node(&self, record: FullNodeRecord) {
        let h = encode_geohash(&record.core.original_lat_lon, TILE_PRECISION).unwrap();
        let mut tiles = self.tiles.lock();
        let tile = tiles.entry(h).or_default();
        let index = tile.len() as u32;
        tile.insert(index, record.core.clone());
        self.nodes.lock().insert(record.key().to_string(), record);
    }

    /// Adds a sequence with `count` nodes spaced 3 m apart heading north.
    pub fn add_street(&self, sequence_key: &str, count: usize) -> Vec<String> {
        let keys: Vec<String> = (0..count).map(|i| format!("{sequence_key}-{i}")).collect();
        for (i, key) in keys.iter().enumerate() {
            self.add_node(node_record(key, at(0.0, 3.0 * i as f64), sequence_key, i as i64));
        }
        self.sequences.lock().insert(
            sequence_key.to_string(),
            SequenceRecord {
                key: sequence_key.to_string(),
                keys: keys.clone(),
            },
        );
        keys
    }

    pub fn fail(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }

    pub fn recover(&self, key: &str) {
        self.failing.lock().remove(key);
    }

    /// Holds every request until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn pass(&self, keys: &[String]) -> Result<(), DataSourceError> {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
        let failing = self.failing.lock();
        match keys.iter().find(|k| failing.contains(*k)) {
            Some(key) => Err(DataSourceError::Http(format!("503 for {key}"))),
            None => Ok(()),
        }
    }
}

impl DataSource for RecordingSource {
    async fn fetch_full_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, FullNodeRecord>, DataSourceError> {
        self.full_batches.lock().push(keys.to_vec());
        self.pass(keys).await?;
        let nodes = self.nodes.lock();
        Ok(keys
            .iter()
            .filter_map(|k| nodes.get(k).map(|r| (k.clone(), r.clone())))
            .collect())
    }

    async fn fetch_fill_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, FillNodeRecord>, DataSourceError> {
        self.fill_batches.lock().push(keys.to_vec());
        self.pass(keys).await?;
        let nodes = self.nodes.lock();
        Ok(keys
            .iter()
            .filter_map(|k| nodes.get(k).map(|r| (k.clone(), r.fill.clone())))
            .collect())
    }

    async fn fetch_by_tiles(
        &self,
        tiles: &[String],
    ) -> Result<HashMap<String, TileNodes>, DataSourceError> {
        self.tile_requests.lock().extend(tiles.iter().cloned());
        self.pass(tiles).await?;
        let known = self.tiles.lock();
        Ok(tiles
            .iter()
            .map(|h| (h.clone(), known.get(h).cloned().unwrap_or_default()))
            .collect())
    }

    async fn fetch_sequence_by_key(&self, key: &str) -> Result<SequenceRecord, DataSourceError> {
        self.sequence_requests.lock().push(key.to_string());
        self.pass(&[key.to_string()]).await?;
        self.sequences
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(key.to_string()))
    }

    async fn fetch_node_close_to(
        &self,
        position: LatLon,
    ) -> Result<Option<FullNodeRecord>, DataSourceError> {
        self.pass(&[]).await?;
        let nodes = self.nodes.lock();
        Ok(nodes
            .values()
            .min_by(|a, b| {
                let da = panograph::coord::distance_meters(&position, &a.core.original_lat_lon);
                let db = panograph::coord::distance_meters(&position, &b.core.original_lat_lon);
                da.total_cmp(&db)
            })
            .cloned())
    }
}

/// Asset loader serving a fixed image in two progress steps.
#[derive(Default)]
pub struct StaticAssets {
    pub images: AtomicUsize,
}

impl StaticAssets {
    pub fn image_count(&self) -> usize {
        self.images.load(Ordering::SeqCst)
    }
}

impl AssetLoader for StaticAssets {
    async fn load_image(
        &self,
        _key: &str,
        progress: ProgressCallback,
    ) -> Result<Vec<u8>, DataSourceError> {
        self.images.fetch_add(1, Ordering::SeqCst);
        progress(LoadStatus::new(512, 1024));
        progress(LoadStatus::new(1024, 1024));
        Ok(vec![0xff; 1024])
    }

    async fn load_mesh(&self, _key: &str) -> Result<Mesh, DataSourceError> {
        Ok(Mesh::default())
    }
}
