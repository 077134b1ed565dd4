//! Failures are surfaced, logged, and never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memofn::{CacheError, CachedFunction, Hooks};

#[tokio::test]
async fn errors_are_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let cached = CachedFunction::new(move |key: i64| {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::other("transient"))
            } else {
                Ok(key * 2)
            }
        }
    });

    let err = cached.call(4).await.unwrap_err();
    assert_eq!(err.as_function_error().map(|e| e.to_string()), Some("transient".to_string()));
    assert!(cached.is_empty());

    // The next call retries and succeeds.
    assert_eq!(cached.call(4).await.unwrap(), 8);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn function_errors_reach_log_error_once() {
    let logged = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&logged);

    let hooks: Hooks<i64, std::io::Error> = Hooks {
        log_error: Some(Box::new(move |err| {
            assert!(err.as_function_error().is_some());
            sink.fetch_add(1, Ordering::SeqCst);
        })),
        ..Hooks::default()
    };

    let cached = CachedFunction::builder(|_key: i64| async move {
        Err::<i64, _>(std::io::Error::other("downstream"))
    })
    .hooks(hooks)
    .build();

    cached.call(1).await.unwrap_err();
    assert_eq!(logged.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panics_are_contained_and_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let logged = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&logged);

    let hooks: Hooks<i64, std::io::Error> = Hooks {
        log_error: Some(Box::new(move |err| {
            assert!(err.is_panic());
            sink.fetch_add(1, Ordering::SeqCst);
        })),
        ..Hooks::default()
    };

    let cached = CachedFunction::builder(move |key: i64| {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("boom in f");
            }
            Ok::<_, std::io::Error>(key)
        }
    })
    .hooks(hooks)
    .build();

    let err = cached.call(6).await.unwrap_err();
    assert!(err.is_panic());
    assert!(err.to_string().contains("boom in f"));
    assert_eq!(logged.load(Ordering::SeqCst), 1);
    assert!(cached.is_empty());

    // A later call runs the function anew.
    assert_eq!(cached.call(6).await.unwrap(), 6);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unserialisable_arguments_fail_fast() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let logged = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&logged);

    let hooks: Hooks<HashMap<(u8, u8), i64>, std::io::Error> = Hooks {
        log_error: Some(Box::new(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        })),
        ..Hooks::default()
    };

    let cached = CachedFunction::builder(move |m: HashMap<(u8, u8), i64>| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(m.len())
        }
    })
    .hooks(hooks)
    .build();

    let mut tuple_keyed = HashMap::new();
    tuple_keyed.insert((1, 2), 3);

    let err = cached.call(tuple_keyed).await.unwrap_err();
    assert!(err.is_build_key());
    assert!(matches!(err, CacheError::BuildKey { .. }));

    // The function never ran and nothing was logged.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(logged.load(Ordering::SeqCst), 0);
}
