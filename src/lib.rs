//! Concurrency-safe memoization for expensive or long-running functions.
//!
//! memofn wraps an async function `f(K) -> Result<V, E>` into a
//! [`CachedFunction`] with the same call shape that transparently adds:
//!
//! - **Memoization**: results are cached per distinct argument, so equal
//!   calls within the TTL window skip the function entirely.
//! - **In-flight deduplication**: concurrent calls with equal arguments
//!   share a single execution; every caller observes the same result.
//! - **Expiration**: each entry expires after a configurable TTL
//!   (default: 5 minutes), enforced on lookup and by a background sweeper
//!   that runs only while the cache is non-empty.
//! - **Capacity limiting**: the cache holds up to a configurable number of
//!   entries (default: 1000), evicting the least recently used when full.
//! - **Extensibility**: optional [`Hooks`] observe cache events without
//!   ever affecting caller-visible outcomes.
//!
//! Errors and panics from the wrapped function are surfaced to the caller
//! as [`CacheError`] but never cached, so transient failures retry.
//!
//! # Example
//!
//! ```
//! use memofn::CachedFunction;
//!
//! # async fn demo() {
//! let double = CachedFunction::new(|n: u64| async move {
//!     Ok::<_, std::io::Error>(n * 2)
//! });
//!
//! assert_eq!(double.call(5).await.unwrap(), 10); // runs the function
//! assert_eq!(double.call(5).await.unwrap(), 10); // served from the cache
//! # }
//! ```
//!
//! Use [`CachedFunction::builder`] to set a [`CacheConfig`] or install
//! [`Hooks`].

pub mod cached;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod stats;

mod flight;
mod keys;
mod store;

pub use cached::{CachedFunction, CachedFunctionBuilder};
pub use config::CacheConfig;
pub use errors::{CacheError, CacheResult, MarshalJsonError};
pub use hooks::{ErrorHookFn, HookError, HookFn, Hooks};
pub use keys::OpaqueContext;
pub use stats::CacheStats;
