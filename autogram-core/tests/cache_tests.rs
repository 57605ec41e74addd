// File: autogram-core/tests/cache_tests.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

use autogram_core::Error;
use autogram_core::cache::{Cache, CacheConfig, FnResolver, Resolution};
use autogram_common::models::MediaFile;

/// Resolver fixture: known ids resolve to `size` zero bytes and are cacheable,
/// unknown ids get a transient fallback. Counts invocations per id.
#[derive(Clone, Default)]
struct Backend {
    sizes: Arc<HashMap<String, usize>>,
    calls: Arc<std::sync::Mutex<HashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
}

impl Backend {
    fn with(sizes: &[(&str, usize)]) -> Self {
        Self {
            sizes: Arc::new(sizes.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
            ..Default::default()
        }
    }

    fn calls(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn resolve_now(&self, id: &str) -> Resolution<MediaFile> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(id.to_string()).or_default() += 1;
        match self.sizes.get(id) {
            Some(size) => Resolution::cached(MediaFile::new(id, vec![7u8; *size])),
            None => Resolution::transient(MediaFile::new(id, b"fallback".to_vec())),
        }
    }
}

fn cache_over(limit: u64, backend: &Backend) -> Cache<MediaFile> {
    let backend = backend.clone();
    Cache::new(
        limit,
        FnResolver(move |id: String| {
            let backend = backend.clone();
            async move { backend.resolve_now(&id) }
        }),
    )
    .expect("valid cache config")
}

#[tokio::test]
async fn test_zero_limit_rejected_at_construction() {
    let result = Cache::<MediaFile>::new(
        0,
        FnResolver(|id: String| async move { Resolution::cached(MediaFile::new(id, Vec::<u8>::new())) }),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_repeated_get_serves_same_payload_without_refetch() -> Result<(), Error> {
    let backend = Backend::with(&[("photo", 12)]);
    let cache = cache_over(1_000, &backend);

    let first = cache.get("photo").await?;
    for _ in 0..5 {
        assert_eq!(cache.get("photo").await?, first);
    }
    assert_eq!(backend.calls("photo"), 1);

    let stats = cache.stats().await?;
    assert_eq!(stats.weight, 12);
    assert_eq!(stats.limit, 1_000);
    assert_eq!(stats.count, 1);
    Ok(())
}

#[tokio::test]
async fn test_insertion_evicts_least_hit_oldest_entry() -> Result<(), Error> {
    let backend = Backend::with(&[("x", 40), ("y", 40), ("z", 30)]);
    let cache = cache_over(100, &backend);

    cache.get("x").await?;
    cache.get("y").await?;
    cache.get("x").await?; // x now has two hits
    cache.get("z").await?; // 80 + 30 > 100 => y goes

    let stats = cache.stats().await?;
    assert_eq!(stats.weight, 70);
    assert_eq!(stats.count, 2);

    cache.get("x").await?;
    cache.get("z").await?;
    assert_eq!(backend.calls("x"), 1);
    assert_eq!(backend.calls("z"), 1);

    cache.get("y").await?;
    assert_eq!(backend.calls("y"), 2, "y must have been evicted");
    Ok(())
}

#[tokio::test]
async fn test_single_hit_oldest_loses_to_newer_and_busier() -> Result<(), Error> {
    let backend = Backend::with(&[("a", 10), ("b", 10), ("c", 10), ("d", 10)]);
    let cache = cache_over(30, &backend);

    cache.get("a").await?; // hits 1, oldest
    cache.get("b").await?;
    cache.get("b").await?;
    cache.get("b").await?; // hits 3
    cache.get("c").await?; // hits 1, newer than a
    cache.get("d").await?; // must evict a

    assert_eq!(backend.total(), 4);
    cache.get("b").await?;
    cache.get("c").await?;
    cache.get("d").await?;
    assert_eq!(backend.total(), 4, "b, c and d are still cached");

    cache.get("a").await?;
    assert_eq!(backend.calls("a"), 2);
    Ok(())
}

#[tokio::test]
async fn test_non_cacheable_result_is_served_but_not_kept() -> Result<(), Error> {
    let backend = Backend::with(&[]);
    let cache = cache_over(100, &backend);

    let first = cache.get("unknown").await?;
    assert_eq!(&first.data[..], b"fallback");
    assert_eq!(cache.stats().await?.count, 0);
    assert_eq!(cache.stats().await?.weight, 0);

    cache.get("unknown").await?;
    assert_eq!(backend.calls("unknown"), 2);
    Ok(())
}

#[tokio::test]
async fn test_oversized_entry_is_served_but_not_kept() -> Result<(), Error> {
    let backend = Backend::with(&[("small", 10), ("huge", 500)]);
    let cache = cache_over(100, &backend);

    cache.get("small").await?;
    let huge = cache.get("huge").await?;
    assert_eq!(huge.data.len(), 500);

    let stats = cache.stats().await?;
    assert_eq!(stats.count, 1);
    assert_eq!(stats.weight, 10);

    cache.get("huge").await?;
    assert_eq!(backend.calls("huge"), 2);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_misses_for_same_id_fetch_once() -> Result<(), Error> {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    let cache = Cache::new(
        1_000,
        FnResolver(move |id: String| {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                Resolution::cached(MediaFile::new(id, vec![1u8; 8]))
            }
        }),
    )?;

    let (a, b, c) = tokio::join!(
        cache.get("missing-id"),
        cache.get("missing-id"),
        cache.get("missing-id"),
    );
    let (a, b, c) = (a?, b?, c?);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(cache.stats().await?.count, 1);
    Ok(())
}

#[tokio::test]
async fn test_joined_callers_count_as_hits_for_eviction() -> Result<(), Error> {
    let backend = Backend::with(&[("a", 10), ("b", 10), ("c", 10)]);
    let slow = backend.clone();
    let cache = Cache::new(
        20,
        FnResolver(move |id: String| {
            let backend = slow.clone();
            async move {
                sleep(Duration::from_millis(50)).await;
                backend.resolve_now(&id)
            }
        }),
    )?;

    // Two callers share one fetch of "a", so it enters with two hits.
    let (first, second) = tokio::join!(cache.get("a"), cache.get("a"));
    assert_eq!(first?, second?);
    assert_eq!(backend.calls("a"), 1);

    cache.get("b").await?; // hits 1
    cache.get("c").await?; // 20 + 10 > 20 => b goes, a outranks it

    assert_eq!(backend.total(), 3);
    cache.get("a").await?;
    cache.get("c").await?;
    assert_eq!(backend.total(), 3, "a and c are still cached");

    cache.get("b").await?;
    assert_eq!(backend.calls("b"), 2, "b must have been evicted");
    Ok(())
}

#[tokio::test]
async fn test_entry_for_another_id_is_served_but_not_kept() -> Result<(), Error> {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    let cache = Cache::new(
        1_000,
        FnResolver(move |_id: String| {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Resolution::cached(MediaFile::new("canonical", vec![3u8; 5]))
            }
        }),
    )?;

    assert_eq!(cache.get("alias").await?.id, "canonical");
    assert_eq!(cache.get("alias").await?.id, "canonical");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let stats = cache.stats().await?;
    assert_eq!(stats.count, 0);
    assert_eq!(stats.weight, 0);
    Ok(())
}

#[tokio::test]
async fn test_slow_miss_does_not_block_other_keys() -> Result<(), Error> {
    let gate = Arc::new(Notify::new());
    let gate_in = gate.clone();
    let cache = Cache::new(
        1_000,
        FnResolver(move |id: String| {
            let gate = gate_in.clone();
            async move {
                if id == "slow" {
                    gate.notified().await;
                }
                Resolution::cached(MediaFile::new(id, vec![0u8; 4]))
            }
        }),
    )?;

    let slow_cache = cache.clone();
    let slow = tokio::spawn(async move { slow_cache.get("slow").await });

    let fast = timeout(Duration::from_secs(2), cache.get("fast")).await;
    assert!(fast.is_ok(), "unrelated key must not wait for the slow fetch");
    assert_eq!(fast.unwrap()?.id, "fast");

    let stats = timeout(Duration::from_secs(2), cache.stats()).await;
    assert!(stats.is_ok(), "stats must be served during a slow fetch");

    gate.notify_one();
    let slow = slow.await.expect("task joined")?;
    assert_eq!(slow.id, "slow");
    assert_eq!(cache.stats().await?.count, 2);
    Ok(())
}

#[tokio::test]
async fn test_stats_under_concurrent_load_are_consistent() -> Result<(), Error> {
    const WEIGHT: usize = 10;
    const LIMIT: u64 = 95;
    let cache = Cache::new(
        LIMIT,
        FnResolver(|id: String| async move {
            tokio::task::yield_now().await;
            Resolution::cached(MediaFile::new(id, vec![0u8; WEIGHT]))
        }),
    )?;

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                let id = format!("k{}", (i * 7 + worker) % 23);
                cache.get(&id).await?;
                let stats = cache.stats().await?;
                assert_eq!(stats.weight, stats.count * WEIGHT as u64);
                assert!(stats.weight <= LIMIT);
            }
            Ok::<_, Error>(())
        }));
    }
    for task in tasks {
        task.await.expect("worker joined")?;
    }
    Ok(())
}

#[tokio::test]
async fn test_resolver_panic_fails_waiters_and_cache_survives() -> Result<(), Error> {
    let cache = Cache::new(
        1_000,
        FnResolver(|id: String| async move {
            if id == "boom" {
                panic!("backend exploded");
            }
            Resolution::cached(MediaFile::new(id, vec![0u8; 3]))
        }),
    )?;

    match cache.get("boom").await {
        Err(Error::Cache(_)) => {}
        other => panic!("expected cache error, got {other:?}"),
    }
    assert_eq!(cache.get("fine").await?.id, "fine");
    assert_eq!(cache.stats().await?.count, 1);
    Ok(())
}

#[tokio::test]
async fn test_request_timeout_applies_to_caller() -> Result<(), Error> {
    let mut config = CacheConfig::new(100);
    config.request_timeout = Some(Duration::from_millis(30));
    let cache = Cache::with_config(
        config,
        FnResolver(|id: String| async move {
            sleep(Duration::from_secs(30)).await;
            Resolution::cached(MediaFile::new(id, Vec::<u8>::new()))
        }),
    )?;

    match cache.get("never").await {
        Err(Error::Timeout(_)) => {}
        other => panic!("expected timeout, got {other:?}"),
    }
    // The actor itself is still responsive.
    assert_eq!(cache.stats().await?.count, 0);
    Ok(())
}
