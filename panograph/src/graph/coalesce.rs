//! Request coalescing for graph fetches.
//!
//! Every (entity, operation kind) pair has at most one fetch in flight. The
//! first caller registers the work; later callers receive a clone of the
//! same shared future and observe the same result.
//!
//! ```text
//! cache_full("a") ─┐
//!                  │                          DataSource
//! cache_full("a") ─┼──► RequestCoalescer ───► fetch_full_by_keys(["a"])
//!                  │        │                        │
//! cache_full("a") ─┘        ▼                        ▼
//!                   [all callers hold the      [one request]
//!                    same shared future]◄────────────┘
//! ```
//!
//! # Implementation
//!
//! The in-flight map stores only a weak reference to the shared future, so
//! the map never keeps work alive on its own. Each registered future carries
//! a guard that removes its entry when the future settles or when the last
//! caller drops its handle, whichever happens first. A caller observing
//! `is_in_flight` therefore sees the flag cleared on success, failure and
//! cancellation alike.

use crate::error::GraphError;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Boxed unit of graph work.
pub type GraphTask = BoxFuture<'static, Result<(), GraphError>>;

/// Handle to in-flight graph work. Clones resolve to the same result.
pub type CacheFuture = Shared<GraphTask>;

/// Outcome of registering a request.
pub enum CoalesceResult {
    /// No request was in flight; the returned future performs the work.
    NewRequest(CacheFuture),
    /// A request was already in flight; the returned future joins it.
    Coalesced(CacheFuture),
}

impl CoalesceResult {
    pub fn into_future(self) -> CacheFuture {
        match self {
            CoalesceResult::NewRequest(future) | CoalesceResult::Coalesced(future) => future,
        }
    }
}

struct InFlight {
    id: u64,
    handle: WeakShared<GraphTask>,
}

type InFlightMap<K> = DashMap<K, InFlight>;

/// Removes the in-flight entry it was created for.
struct EntryGuard<K: Eq + Hash> {
    map: Arc<InFlightMap<K>>,
    keys: Vec<K>,
    id: u64,
}

impl<K: Eq + Hash> Drop for EntryGuard<K> {
    fn drop(&mut self) {
        for key in &self.keys {
            self.map.remove_if(key, |_, entry| entry.id == self.id);
        }
    }
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that joined existing work
    pub coalesced_requests: u64,
    /// Requests that started new work
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Tracks in-flight work of one operation kind.
pub struct RequestCoalescer<K: Eq + Hash> {
    name: &'static str,
    in_flight: Arc<InFlightMap<K>>,
    next_id: AtomicU64,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

impl<K> RequestCoalescer<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Creates a coalescer; `name` labels its log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
        }
    }

    /// Returns the in-flight future for `key`, if any.
    pub fn get(&self, key: &K) -> Option<CacheFuture> {
        self.in_flight.get(key).and_then(|entry| entry.handle.upgrade())
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Joins the in-flight request for `key` or starts `make()` as a new one.
    pub fn register<F>(&self, key: K, make: F) -> CoalesceResult
    where
        F: FnOnce() -> GraphTask,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if let Some(existing) = self.get(&key) {
            self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
            debug!(kind = self.name, key = ?key, "Coalescing request onto in-flight work");
            return CoalesceResult::Coalesced(existing);
        }

        self.new_requests.fetch_add(1, Ordering::Relaxed);
        debug!(kind = self.name, key = ?key, "New request");
        CoalesceResult::NewRequest(self.insert(vec![key], make()))
    }

    /// Registers one future as the in-flight work of several keys.
    ///
    /// The caller must ensure none of `keys` is already in flight.
    pub fn register_batch(&self, keys: Vec<K>, task: GraphTask) -> CacheFuture {
        let count = keys.len() as u64;
        self.total_requests.fetch_add(count, Ordering::Relaxed);
        self.new_requests.fetch_add(count, Ordering::Relaxed);
        debug!(kind = self.name, keys = keys.len(), "New batch request");
        self.insert(keys, task)
    }

    fn insert(&self, keys: Vec<K>, task: GraphTask) -> CacheFuture {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = EntryGuard {
            map: Arc::clone(&self.in_flight),
            keys: keys.clone(),
            id,
        };
        let shared = async move {
            let _guard = guard;
            task.await
        }
        .boxed()
        .shared();

        if let Some(handle) = shared.downgrade() {
            for key in keys {
                self.in_flight.insert(
                    key,
                    InFlight {
                        id,
                        handle: handle.clone(),
                    },
                );
            }
        }
        shared
    }

    /// Keys with work in flight.
    pub fn keys(&self) -> Vec<K> {
        self.in_flight.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Forgets all in-flight work. Running futures are unaffected but new
    /// requests no longer join them.
    pub fn clear(&self) {
        self.in_flight.clear();
    }

    /// Returns the number of keys with work in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }
}
