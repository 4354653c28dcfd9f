//! In-memory collaborators for unit tests.

use super::*;
use crate::coord::{encode_geohash, LatLon};
use crate::entity::{LoadStatus, Mesh};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

pub(crate) fn core_record(key: &str, lat: f64, lon: f64, sequence_key: &str) -> CoreNodeRecord {
    CoreNodeRecord {
        key: key.to_string(),
        original_lat_lon: LatLon::new(lat, lon),
        computed_lat_lon: None,
        sequence_key: Some(sequence_key.to_string()),
    }
}

pub(crate) fn fill_record(captured_at: i64) -> FillNodeRecord {
    FillNodeRecord {
        captured_at,
        compass_angle: Some(0.0),
        computed_compass_angle: None,
        computed_altitude: None,
        camera_rotation: None,
        camera_translation: None,
        atomic_scale: None,
        focal: None,
        orientation: 1,
        gpano: None,
        merge_cc: None,
        merge_version: None,
        private: false,
        project: None,
        user: UserRecord {
            key: "user".to_string(),
            username: "tester".to_string(),
        },
        width: 2,
        height: 1,
    }
}

pub(crate) fn full_record(key: &str, lat: f64, lon: f64, sequence_key: &str) -> FullNodeRecord {
    FullNodeRecord {
        core: core_record(key, lat, lon, sequence_key),
        fill: fill_record(0),
    }
}

/// Data source backed by hash maps, recording every request.
pub(crate) struct MockDataSource {
    pub full: Mutex<HashMap<String, FullNodeRecord>>,
    pub tiles: Mutex<HashMap<String, TileNodes>>,
    pub sequences: Mutex<HashMap<String, SequenceRecord>>,
    pub close_to: Mutex<Option<FullNodeRecord>>,
    /// Keys, tiles or sequence keys whose requests fail
    pub failing: Mutex<HashSet<String>>,
    pub full_calls: Mutex<Vec<Vec<String>>>,
    pub fill_calls: Mutex<Vec<Vec<String>>>,
    pub tile_calls: Mutex<Vec<String>>,
    pub sequence_calls: Mutex<Vec<String>>,
    gate: watch::Sender<bool>,
}

impl MockDataSource {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            full: Mutex::new(HashMap::new()),
            tiles: Mutex::new(HashMap::new()),
            sequences: Mutex::new(HashMap::new()),
            close_to: Mutex::new(None),
            failing: Mutex::new(HashSet::new()),
            full_calls: Mutex::new(Vec::new()),
            fill_calls: Mutex::new(Vec::new()),
            tile_calls: Mutex::new(Vec::new()),
            sequence_calls: Mutex::new(Vec::new()),
            gate,
        }
    }

    /// Registers a node as fetchable and discoverable through its tile.
    pub fn add_node(&self, record: FullNodeRecord) {
        let h = encode_geohash(&record.core.original_lat_lon, 7).unwrap();
        let mut tiles = self.tiles.lock();
        let tile = tiles.entry(h).or_default();
        let index = tile.len() as u32;
        tile.insert(index, record.core.clone());
        self.full.lock().insert(record.key().to_string(), record);
    }

    /// Registers a node as fetchable by key only.
    pub fn add_full(&self, record: FullNodeRecord) {
        self.full.lock().insert(record.key().to_string(), record);
    }

    pub fn add_sequence(&self, key: &str, keys: &[String]) {
        self.sequences.lock().insert(
            key.to_string(),
            SequenceRecord {
                key: key.to_string(),
                keys: keys.to_vec(),
            },
        );
    }

    pub fn fail(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }

    /// Blocks every request until [`release`](Self::release) is called.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    async fn pass_gate(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }

    fn check_failing(&self, keys: &[String]) -> Result<(), DataSourceError> {
        let failing = self.failing.lock();
        match keys.iter().find(|k| failing.contains(*k)) {
            Some(key) => Err(DataSourceError::Http(format!("injected failure for {key}"))),
            None => Ok(()),
        }
    }
}

impl DataSource for MockDataSource {
    async fn fetch_full_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, FullNodeRecord>, DataSourceError> {
        self.full_calls.lock().push(keys.to_vec());
        self.pass_gate().await;
        self.check_failing(keys)?;
        let full = self.full.lock();
        Ok(keys
            .iter()
            .filter_map(|k| full.get(k).map(|r| (k.clone(), r.clone())))
            .collect())
    }

    async fn fetch_fill_by_keys(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, FillNodeRecord>, DataSourceError> {
        self.fill_calls.lock().push(keys.to_vec());
        self.pass_gate().await;
        self.check_failing(keys)?;
        let full = self.full.lock();
        Ok(keys
            .iter()
            .filter_map(|k| full.get(k).map(|r| (k.clone(), r.fill.clone())))
            .collect())
    }

    async fn fetch_by_tiles(
        &self,
        tiles: &[String],
    ) -> Result<HashMap<String, TileNodes>, DataSourceError> {
        self.tile_calls.lock().extend(tiles.iter().cloned());
        self.pass_gate().await;
        self.check_failing(tiles)?;
        let known = self.tiles.lock();
        Ok(tiles
            .iter()
            .map(|h| (h.clone(), known.get(h).cloned().unwrap_or_default()))
            .collect())
    }

    async fn fetch_sequence_by_key(&self, key: &str) -> Result<SequenceRecord, DataSourceError> {
        self.sequence_calls.lock().push(key.to_string());
        self.pass_gate().await;
        self.check_failing(&[key.to_string()])?;
        self.sequences
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(key.to_string()))
    }

    async fn fetch_node_close_to(
        &self,
        _position: LatLon,
    ) -> Result<Option<FullNodeRecord>, DataSourceError> {
        self.pass_gate().await;
        Ok(self.close_to.lock().clone())
    }
}

/// Asset loader returning fixed bytes and counting requests.
#[derive(Default)]
pub(crate) struct MockAssetLoader {
    pub image_calls: AtomicUsize,
    pub mesh_calls: AtomicUsize,
}

impl MockAssetLoader {
    pub fn image_count(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }
}

impl AssetLoader for MockAssetLoader {
    async fn load_image(
        &self,
        _key: &str,
        progress: ProgressCallback,
    ) -> Result<Vec<u8>, DataSourceError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        progress(LoadStatus::new(1, 2));
        progress(LoadStatus::new(2, 2));
        Ok(vec![1, 2])
    }

    async fn load_mesh(&self, _key: &str) -> Result<Mesh, DataSourceError> {
        self.mesh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Mesh::default())
    }
}
