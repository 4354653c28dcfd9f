//! Aggregated image loading progress.
//!
//! ```text
//! Node::cache_assets            ImageLoadingService            UI
//!    │                                │                        │
//!    │ load_node(key, 5/10)           │                        │
//!    ├───────────────────────────────►│ insert key             │
//!    │                                ├───── status map ──────►│
//!    │ load_node(key, 10/10)          │                        │
//!    ├───────────────────────────────►│ remove key             │
//!    │                                ├───── status map ──────►│
//! ```

use crate::entity::LoadStatus;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Load progress of every node with an image download in progress.
pub type LoadStatusMap = HashMap<String, LoadStatus>;

/// Buffered status maps per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// Tracks byte progress of node image downloads.
pub struct ImageLoadingService {
    statuses: Mutex<LoadStatusMap>,
    sender: broadcast::Sender<LoadStatusMap>,
}

impl ImageLoadingService {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            statuses: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Records a progress event for a node.
    ///
    /// Completed downloads are removed from the map. The full map is
    /// published only if the event changed it.
    pub fn load_node(&self, key: &str, status: LoadStatus) {
        let mut statuses = self.statuses.lock();
        let changed = if status.is_complete() {
            statuses.remove(key).is_some()
        } else {
            statuses.insert(key.to_string(), status) != Some(status)
        };

        if changed {
            // No subscribers is fine
            let _ = self.sender.send(statuses.clone());
        }
    }

    /// Subscribes to status map updates.
    pub fn subscribe(&self) -> broadcast::Receiver<LoadStatusMap> {
        self.sender.subscribe()
    }

    /// Current status map.
    pub fn snapshot(&self) -> LoadStatusMap {
        self.statuses.lock().clone()
    }
}

impl Default for ImageLoadingService {
    fn default() -> Self {
        Self::new()
    }
}
