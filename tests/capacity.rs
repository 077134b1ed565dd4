//! Capacity limiting evicts the least recently used entry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memofn::{CacheConfig, CachedFunction};

fn counting_identity(calls: Arc<AtomicUsize>) -> impl Fn(i64) -> std::future::Ready<Result<i64, std::io::Error>> + Send + Sync {
    move |key: i64| {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(key))
    }
}

#[tokio::test]
async fn capacity_limit_evicts_least_recently_used() {
    let calls = Arc::new(AtomicUsize::new(0));

    let cached = CachedFunction::builder(counting_identity(Arc::clone(&calls)))
        .config(CacheConfig {
            ttl: Duration::from_secs(300),
            capacity: 2,
            cleanup_interval: Duration::from_secs(60),
        })
        .build();

    // Fill the cache with keys 1 and 2.
    cached.call(1).await.unwrap();
    cached.call(2).await.unwrap();

    // Access key 1 so key 2 becomes the least recently used.
    cached.call(1).await.unwrap();

    // Key 3 evicts key 2.
    cached.call(3).await.unwrap();

    // Key 2 misses and triggers a fresh execution.
    cached.call(2).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(cached.stats().evictions, 2);
}

#[tokio::test]
async fn store_size_never_exceeds_capacity() {
    let calls = Arc::new(AtomicUsize::new(0));

    let cached = CachedFunction::builder(counting_identity(calls))
        .config(CacheConfig {
            ttl: Duration::from_secs(300),
            capacity: 3,
            cleanup_interval: Duration::from_secs(60),
        })
        .build();

    for key in 0..20 {
        cached.call(key).await.unwrap();
        assert!(cached.len() <= 3);
    }
}
