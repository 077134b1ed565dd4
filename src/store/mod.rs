//! TTL + capacity-bounded store preserving LRU order.
//!
//! The store pairs a key-indexed map with a recency list: every hit moves
//! the entry to the front, every overflow evicts from the back. A
//! background sweeper removes expired entries; it runs only while the
//! store is non-empty.

mod list;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::stats::{SharedStats, StatsCollector};
use list::{NodeIndex, RecencyList};

struct StoredEntry<V> {
    value: V,
    inserted_at: Instant,
    node: NodeIndex,
}

struct StoreInner<V> {
    entries: HashMap<String, StoredEntry<V>>,
    order: RecencyList,
    // Some while the sweeper runs; consumed by the removal that empties
    // the store, so the stop signal can never fire twice.
    sweeper: Option<oneshot::Sender<()>>,
}

/// Thread-safe LRU store with per-entry TTL and a lazily started expiry
/// sweeper. `set` must be called from within a Tokio runtime.
pub(crate) struct RecencyStore<V> {
    inner: Arc<RwLock<StoreInner<V>>>,
    ttl: Duration,
    capacity: usize,
    cleanup_interval: Duration,
    stats: SharedStats,
}

impl<V> RecencyStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, capacity: usize, cleanup_interval: Duration, stats: SharedStats) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                entries: HashMap::new(),
                order: RecencyList::new(),
                sweeper: None,
            })),
            ttl,
            capacity,
            cleanup_interval,
            stats,
        }
    }

    /// Returns the live value for `key`, refreshing its recency. An entry
    /// past its TTL is removed on the spot and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.write();

        let (node, value, expired) = match inner.entries.get(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) => (
                entry.node,
                entry.value.clone(),
                entry.inserted_at.elapsed() > self.ttl,
            ),
        };

        if expired {
            remove_locked(&mut inner, key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        inner.order.move_to_front(node);
        self.stats.record_hit();
        Some(value)
    }

    /// Inserts `value` under `key`, timestamping it and pushing it to the
    /// front. A duplicate key replaces the old entry and its node. One
    /// entry is evicted from the back when capacity is exceeded. Starts
    /// the sweeper when it is not already running.
    pub fn set(&self, key: String, value: V) {
        let mut inner = self.inner.write();

        if let Some(old) = inner.entries.remove(&key) {
            inner.order.remove(old.node);
        }

        let node = inner.order.push_front(key.clone());
        inner.entries.insert(
            key,
            StoredEntry {
                value,
                inserted_at: Instant::now(),
                node,
            },
        );

        if inner.entries.len() > self.capacity {
            if let Some(tail) = inner.order.back() {
                let evicted = inner.order.remove(tail);
                inner.entries.remove(&evicted);
                self.stats.record_eviction();
                tracing::trace!(key = %evicted, "evicted least recently used entry");
            }
        }

        if inner.sweeper.is_none() {
            self.start_sweeper(&mut inner);
        }
    }

    /// Removes `key` if present, returning whether it was. Stops the
    /// sweeper when the store becomes empty.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        remove_locked(&mut inner, key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    #[cfg(test)]
    pub fn sweeper_running(&self) -> bool {
        self.inner.read().sweeper.is_some()
    }

    fn start_sweeper(&self, inner: &mut StoreInner<V>) {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        inner.sweeper = Some(stop_tx);

        let state = Arc::downgrade(&self.inner);
        let ttl = self.ttl;
        let interval = self.cleanup_interval;
        let stats = Arc::clone(&self.stats);

        tracing::debug!(interval = ?interval, "starting expiry sweeper");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => return,
                    _ = ticker.tick() => {
                        let Some(state) = state.upgrade() else { return };
                        sweep_expired(&state, ttl, &stats);
                    }
                }
            }
        });
    }
}

/// Removes a key from both the map and the list. The removal that leaves
/// the store empty signals the sweeper to stop.
fn remove_locked<V>(inner: &mut StoreInner<V>, key: &str) -> bool {
    let Some(entry) = inner.entries.remove(key) else {
        return false;
    };
    inner.order.remove(entry.node);
    if inner.entries.is_empty() {
        if let Some(stop) = inner.sweeper.take() {
            let _ = stop.send(());
            tracing::debug!("store drained, stopping expiry sweeper");
        }
    }
    true
}

/// One sweep: collect expired keys under the lock, then delete them. The
/// scan and the deletes are not interleaved.
fn sweep_expired<V>(state: &RwLock<StoreInner<V>>, ttl: Duration, stats: &StatsCollector) {
    let mut inner = state.write();
    let now = Instant::now();

    let expired: Vec<String> = inner
        .entries
        .iter()
        .filter(|(_, entry)| now.duration_since(entry.inserted_at) > ttl)
        .map(|(key, _)| key.clone())
        .collect();

    if expired.is_empty() {
        return;
    }
    for key in &expired {
        remove_locked(&mut inner, key);
    }
    stats.record_expirations(expired.len() as u64);
    tracing::trace!(count = expired.len(), "swept expired entries");
}
