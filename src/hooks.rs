//! Lifecycle hooks and their dispatcher.
//!
//! Hooks are advisory: they observe the cache but never alter a caller's
//! outcome. A hook that errors or panics is captured and forwarded to the
//! `log_error` sink exactly once; a panic inside the sink itself is
//! swallowed.

use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::errors::{panic_detail, CacheError};

/// Boxed error produced by a lifecycle hook
pub type HookError = Box<dyn StdError + Send + Sync>;

/// A lifecycle callback. Receives the original argument, not the
/// fingerprint.
pub type HookFn<K> = Box<dyn Fn(&K) -> Result<(), HookError> + Send + Sync>;

/// The error sink. Receives hook failures and wrapped-function failures.
pub type ErrorHookFn<E> = Box<dyn Fn(&CacheError<E>) + Send + Sync>;

/// Optional callbacks fired around cache operations.
///
/// ```
/// use memofn::Hooks;
///
/// let hooks: Hooks<u64, std::io::Error> = Hooks {
///     on_get: Some(Box::new(|arg| {
///         println!("cache hit for {arg}");
///         Ok(())
///     })),
///     ..Hooks::default()
/// };
/// ```
pub struct Hooks<K, E> {
    /// Called after a successful insert into the store
    pub on_set: Option<HookFn<K>>,

    /// Called after a cache hit
    pub on_get: Option<HookFn<K>>,

    /// Called immediately before the wrapped function runs
    pub on_execute: Option<HookFn<K>>,

    /// Called immediately after the wrapped function returns
    pub on_done: Option<HookFn<K>>,

    /// Called with every hook failure and every wrapped-function failure
    pub log_error: Option<ErrorHookFn<E>>,
}

impl<K, E> Default for Hooks<K, E> {
    fn default() -> Self {
        Self {
            on_set: None,
            on_get: None,
            on_execute: None,
            on_done: None,
            log_error: None,
        }
    }
}

impl<K, E> Hooks<K, E> {
    /// Runs a hook, capturing its error or panic and forwarding the
    /// condition to `log_error`. Never propagates to the caller.
    pub(crate) fn dispatch(&self, hook: &Option<HookFn<K>>, arg: &K) {
        let Some(hook) = hook.as_ref() else { return };
        match catch_unwind(AssertUnwindSafe(|| hook(arg))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.report(&CacheError::Hook {
                detail: err.to_string(),
            }),
            Err(payload) => self.report(&CacheError::Hook {
                detail: panic_detail(payload.as_ref()),
            }),
        }
    }

    /// Forwards an error to `log_error`. A panic inside the sink is
    /// swallowed.
    pub(crate) fn report(&self, err: &CacheError<E>) {
        let Some(log_error) = self.log_error.as_ref() else { return };
        let _ = catch_unwind(AssertUnwindSafe(|| log_error(err)));
    }
}
