//! The cached-function facade.
//!
//! Composes the key fingerprinter, the recency store, the single-flight
//! coordinator, and the hook dispatcher into one wrapped call operation.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;

use crate::config::CacheConfig;
use crate::errors::{panic_detail, CacheError};
use crate::flight::{Flight, FlightGroup};
use crate::hooks::Hooks;
use crate::keys;
use crate::stats::{CacheStats, SharedStats};
use crate::store::RecencyStore;

type WrappedFn<K, V, E> = dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync;

/// A function wrapped with memoization, TTL expiry, LRU capacity limiting,
/// and in-flight call deduplication.
///
/// Calls with equal arguments within the TTL window are answered from the
/// store without re-running the function; concurrent calls with equal
/// arguments share a single execution. Errors and panics are surfaced to
/// the caller but never cached, so the next call retries.
pub struct CachedFunction<K, V, E> {
    func: Box<WrappedFn<K, V, E>>,
    store: RecencyStore<V>,
    flight: FlightGroup<Result<V, CacheError<E>>>,
    hooks: Hooks<K, E>,
    stats: SharedStats,
}

/// Builder for [`CachedFunction`].
pub struct CachedFunctionBuilder<K, V, E> {
    func: Box<WrappedFn<K, V, E>>,
    config: CacheConfig,
    hooks: Hooks<K, E>,
}

impl<K, V, E> CachedFunctionBuilder<K, V, E>
where
    V: Clone + Send + Sync + 'static,
{
    /// Sets the cache configuration. Zero fields fall back to defaults.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs lifecycle hooks.
    pub fn hooks(mut self, hooks: Hooks<K, E>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> CachedFunction<K, V, E> {
        let config = self.config.normalize();
        let stats = SharedStats::default();
        CachedFunction {
            func: self.func,
            store: RecencyStore::new(
                config.ttl,
                config.capacity,
                config.cleanup_interval,
                Arc::clone(&stats),
            ),
            flight: FlightGroup::new(),
            hooks: self.hooks,
            stats,
        }
    }
}

impl<K, V, E> CachedFunction<K, V, E>
where
    K: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Wraps `func` with the default configuration and no hooks.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self::builder(func).build()
    }

    /// Starts a builder for configuring the wrapped function.
    pub fn builder<F, Fut>(func: F) -> CachedFunctionBuilder<K, V, E>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        CachedFunctionBuilder {
            func: Box::new(move |arg| func(arg).boxed()),
            config: CacheConfig::default(),
            hooks: Hooks::default(),
        }
    }

    /// Calls the wrapped function through the cache.
    ///
    /// The argument is fingerprinted into a key; a live stored entry is
    /// returned directly (firing `on_get`). Otherwise the caller either
    /// runs the function (firing `on_execute`, then `on_done`, then on
    /// success `on_set`) or waits for an identical in-progress call and
    /// receives its result verbatim.
    pub async fn call(&self, arg: K) -> Result<V, CacheError<E>> {
        let key = keys::build_key(&arg)?;

        if let Some(value) = self.store.get(&key) {
            self.hooks.dispatch(&self.hooks.on_get, &arg);
            return Ok(value);
        }

        loop {
            match self.flight.join(&key) {
                Flight::Leader(guard) => {
                    self.hooks.dispatch(&self.hooks.on_execute, &arg);
                    self.stats.record_execution();
                    // The function call happens inside the guarded future,
                    // so a panic before the first await is contained too.
                    let outcome = AssertUnwindSafe(async { (self.func)(arg.clone()).await })
                        .catch_unwind()
                        .await;
                    self.hooks.dispatch(&self.hooks.on_done, &arg);

                    let result = match outcome {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(CacheError::Function(Arc::new(err))),
                        Err(payload) => Err(CacheError::Panic {
                            detail: panic_detail(payload.as_ref()),
                        }),
                    };

                    // Waiters are released before the store is touched; a
                    // caller arriving after this may start a new flight.
                    guard.complete(result.clone());

                    match &result {
                        Ok(value) => {
                            self.store.set(key, value.clone());
                            self.hooks.dispatch(&self.hooks.on_set, &arg);
                        }
                        Err(err) => self.hooks.report(err),
                    }
                    return result;
                }
                Flight::Follower(slot) => {
                    if let Some(result) = slot.wait().await {
                        return result;
                    }
                    // The leader was dropped mid-call; contend for the
                    // slot again.
                }
            }
        }
    }

    /// Removes the cached entry for `arg`, returning whether one existed.
    pub fn invalidate(&self, arg: &K) -> Result<bool, CacheError<E>> {
        let key = keys::build_key(arg)?;
        Ok(self.store.remove(&key))
    }

    /// Snapshot of cache activity.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.store.len())
    }

    /// Current number of stored entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
