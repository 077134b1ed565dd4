//! In-flight call deduplication.
//!
//! For each key at most one execution is outstanding: the first caller
//! becomes the leader and runs the function, later callers wait on the
//! slot's barrier and read the leader's result. The slot is removed from
//! the map before the barrier is signalled, so a caller arriving after
//! completion starts a fresh execution.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::Notify;

pub(crate) struct FlightGroup<T> {
    calls: Mutex<HashMap<String, Arc<FlightSlot<T>>>>,
}

/// Completion barrier for one in-progress execution. Resolves exactly
/// once: `Some` with the leader's result, or `None` when the leader was
/// dropped before finishing.
pub(crate) struct FlightSlot<T> {
    result: OnceLock<Option<T>>,
    done: Notify,
}

/// A caller's role for one key.
pub(crate) enum Flight<'a, T> {
    /// This caller runs the function and must complete the slot.
    Leader(LeaderGuard<'a, T>),
    /// Another caller is already executing; wait on the slot.
    Follower(Arc<FlightSlot<T>>),
}

impl<T> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Probes the in-flight map: joins an existing slot as a follower, or
    /// installs a fresh slot and becomes the leader.
    pub fn join(&self, key: &str) -> Flight<'_, T> {
        let mut calls = self.calls.lock();
        if let Some(slot) = calls.get(key) {
            return Flight::Follower(Arc::clone(slot));
        }

        let slot = Arc::new(FlightSlot {
            result: OnceLock::new(),
            done: Notify::new(),
        });
        calls.insert(key.to_string(), Arc::clone(&slot));
        Flight::Leader(LeaderGuard {
            group: self,
            key: key.to_string(),
            slot,
            finished: false,
        })
    }

    /// Writes the slot's resolution and removes the slot, atomically under
    /// the map lock, then releases every waiter.
    fn resolve(&self, key: &str, slot: &FlightSlot<T>, result: Option<T>) {
        {
            let mut calls = self.calls.lock();
            let _ = slot.result.set(result);
            calls.remove(key);
        }
        slot.done.notify_waiters();
    }
}

impl<T: Clone> FlightSlot<T> {
    /// Waits for the leader's resolution. Returns `None` when the leader
    /// was dropped without finishing; the caller should re-enter
    /// [`FlightGroup::join`].
    pub async fn wait(&self) -> Option<T> {
        loop {
            if let Some(result) = self.result.get() {
                return result.clone();
            }
            let notified = self.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            // Re-check after registering so a resolution between the first
            // check and registration is not missed.
            if let Some(result) = self.result.get() {
                return result.clone();
            }
            notified.await;
        }
    }
}

/// Ensures a leader always resolves its slot: completing stores the
/// result, dropping without completing abandons the slot so a waiter can
/// take over.
pub(crate) struct LeaderGuard<'a, T> {
    group: &'a FlightGroup<T>,
    key: String,
    slot: Arc<FlightSlot<T>>,
    finished: bool,
}

impl<T> LeaderGuard<'_, T> {
    pub fn complete(mut self, result: T) {
        self.finished = true;
        self.group.resolve(&self.key, &self.slot, Some(result));
    }
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.group.resolve(&self.key, &self.slot, None);
        }
    }
}
