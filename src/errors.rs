//! Cache error types

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

/// Result type for wrapped-function calls
pub type CacheResult<T, E> = std::result::Result<T, CacheError<E>>;

/// Errors surfaced by a cached function.
///
/// The `E` parameter is the error type of the wrapped function; it is
/// passed through verbatim in [`CacheError::Function`], shared behind an
/// `Arc` so every deduplicated waiter observes the same value. Programs
/// should test variant classes with `matches!` or the `is_*` helpers, not
/// the rendered text.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The argument could not be turned into a cache key. The wrapped
    /// function was not invoked.
    #[error("[memofn error], [error building cache key], details: [{details}]")]
    BuildKey {
        /// Structured `key: value` context for the failure
        details: String,
        /// The underlying serialisation failure
        #[source]
        source: MarshalJsonError,
    },

    /// The wrapped function panicked. The panic was contained and nothing
    /// was cached.
    #[error("[memofn error], [panic occurred in cached function], details: [panic: {detail}]")]
    Panic {
        /// Rendered panic payload
        detail: String,
    },

    /// A lifecycle hook returned an error or panicked. Never returned to
    /// callers; only forwarded to the `log_error` hook.
    #[error("[memofn error], [hook failed], details: [{detail}]")]
    Hook {
        /// Rendered hook failure
        detail: String,
    },

    /// Error returned by the wrapped function, passed through verbatim.
    #[error("{0}")]
    Function(Arc<E>),
}

impl<E> CacheError<E> {
    /// True when the argument could not be fingerprinted.
    pub fn is_build_key(&self) -> bool {
        matches!(self, Self::BuildKey { .. })
    }

    /// True when the wrapped function panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic { .. })
    }

    /// The wrapped function's own error, when that is what this carries.
    pub fn as_function_error(&self) -> Option<&E> {
        match self {
            Self::Function(err) => Some(err),
            _ => None,
        }
    }
}

// Derived Clone would demand E: Clone; the Arc already makes the user
// error shareable.
impl<E> Clone for CacheError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::BuildKey { details, source } => Self::BuildKey {
                details: details.clone(),
                source: source.clone(),
            },
            Self::Panic { detail } => Self::Panic {
                detail: detail.clone(),
            },
            Self::Hook { detail } => Self::Hook {
                detail: detail.clone(),
            },
            Self::Function(err) => Self::Function(Arc::clone(err)),
        }
    }
}

/// Serialisation of a composite argument failed while building a cache key.
#[derive(Debug, Clone, Error)]
#[error("[memofn error], [error marshalling to JSON], details: [{details}]")]
pub struct MarshalJsonError {
    pub(crate) details: String,
    #[source]
    pub(crate) source: Arc<serde_json::Error>,
}

/// Renders a panic payload into the detail text carried by
/// [`CacheError::Panic`] and hook failure reports.
pub(crate) fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marshal_error() -> MarshalJsonError {
        let cause = serde_json::to_value(f64::NAN).unwrap_err();
        MarshalJsonError {
            details: format!("operation: encoding value to build cache key; error: {cause}"),
            source: Arc::new(cause),
        }
    }

    #[test]
    fn build_key_text_is_namespaced_and_nested() {
        let err: CacheError<std::io::Error> = CacheError::BuildKey {
            details: "operation: building cache key".to_string(),
            source: marshal_error(),
        };

        let text = err.to_string();
        assert!(text.starts_with("[memofn error], [error building cache key]"));
        assert!(err.is_build_key());

        let cause = std::error::Error::source(&err).expect("marshal cause");
        assert!(cause.to_string().starts_with("[memofn error], [error marshalling to JSON]"));
    }

    #[test]
    fn function_errors_pass_through_verbatim() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timeout");
        let err: CacheError<std::io::Error> = CacheError::Function(Arc::new(inner));

        assert_eq!(err.to_string(), "upstream timeout");
        assert_eq!(
            err.as_function_error().map(|e| e.kind()),
            Some(std::io::ErrorKind::TimedOut)
        );
    }

    #[test]
    fn clone_shares_the_function_error() {
        let err: CacheError<std::io::Error> = CacheError::Function(Arc::new(std::io::Error::other("boom")));
        let cloned = err.clone();
        match (&err, &cloned) {
            (CacheError::Function(a), CacheError::Function(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("variant changed under clone"),
        }
    }

    #[test]
    fn panic_payloads_render_for_str_string_and_other() {
        let s: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_detail(s.as_ref()), "static message");

        let owned: Box<dyn Any + Send> = Box::new("owned".to_string());
        assert_eq!(panic_detail(owned.as_ref()), "owned");

        let other: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(panic_detail(other.as_ref()), "non-string panic payload");
    }
}
