//! End-to-end behavior of the lookup cascade against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cairn_core::{CairnError, CascadeConfig, FunctionKey, FunctionRecord, StoreError};
use cairn_storage::{
    BackingStore, Existence, FetchResult, InMemoryBackingStore, Lookup, LookupCoordinator, Tier,
};

fn key(raw: &str) -> FunctionKey {
    FunctionKey::new(raw).unwrap()
}

fn record(raw: &str) -> FunctionRecord {
    FunctionRecord::new(key(raw), format!("fn {}(x) {{ x }}", raw))
}

fn setup(config: CascadeConfig) -> (Arc<InMemoryBackingStore>, LookupCoordinator<InMemoryBackingStore>) {
    let store = Arc::new(InMemoryBackingStore::new());
    let cache = LookupCoordinator::new(Arc::clone(&store), config).unwrap();
    (store, cache)
}

fn small_config() -> CascadeConfig {
    CascadeConfig::new()
        .with_hot_capacity(8)
        .with_filter(1_000, 0.01)
        .with_store_timeout(Duration::from_millis(100))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn fresh_miss_never_touches_store() {
    let (store, cache) = setup(small_config());

    let lookup = cache.get(&key("x")).await.unwrap();

    assert_eq!(lookup, Lookup::NotFound { tier: Tier::Filter });
    assert_eq!(store.fetch_count(), 0);
    assert_eq!(cache.existence(&key("x")), Some(Existence::Absent));
}

#[tokio::test]
async fn uncertain_then_confirmed() {
    let (store, cache) = setup(small_config());
    let y = record("y");
    store.seed(y.clone());
    cache.preload(["y"]);

    let first = cache.get(&key("y")).await.unwrap();
    assert_eq!(first.tier(), Tier::Store);
    assert_eq!(first.record(), Some(&y));
    assert_eq!(store.fetch_count(), 1);

    let second = cache.get(&key("y")).await.unwrap();
    assert_eq!(second.tier(), Tier::Hot);
    assert_eq!(second.into_record(), Some(y));
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn false_positive_is_negative_cached() {
    let (store, cache) = setup(small_config());
    cache.preload(["z"]);
    assert!(cache.might_contain(&key("z")));

    let first = cache.get(&key("z")).await.unwrap();
    assert_eq!(first, Lookup::NotFound { tier: Tier::Store });
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(cache.existence(&key("z")), Some(Existence::Absent));

    let second = cache.get(&key("z")).await.unwrap();
    assert_eq!(second, Lookup::NotFound { tier: Tier::Negative });
    assert_eq!(store.fetch_count(), 1);

    let stats = cache.stats();
    assert_eq!(stats.false_positives, 1);
    assert_eq!(stats.negative_hits, 1);
    assert_eq!(stats.not_found, 2);
}

#[tokio::test]
async fn write_is_immediately_visible() {
    let (store, cache) = setup(small_config());
    let r = record("w");

    cache.add(&r.key, r.clone()).await.unwrap();
    assert_eq!(store.put_count(), 1);

    let lookup = cache.get(&r.key).await.unwrap();
    assert_eq!(lookup, Lookup::Found { record: r, tier: Tier::Hot });
    assert_eq!(store.fetch_count(), 0);
}

#[tokio::test]
async fn sieve_refetches_evicted_record() {
    let (store, cache) = setup(small_config().with_hot_capacity(1));
    let a = record("a");
    let b = record("b");
    cache.add(&a.key, a.clone()).await.unwrap();
    cache.add(&b.key, b.clone()).await.unwrap();

    assert!(!cache.is_hot(&a.key));
    assert_eq!(cache.existence(&a.key), Some(Existence::Present));

    let lookup = cache.get(&a.key).await.unwrap();
    assert_eq!(lookup.tier(), Tier::Sieve);
    assert_eq!(lookup.record(), Some(&a));
    assert_eq!(store.fetch_count(), 1);
    assert!(cache.is_hot(&a.key));

    let stats = cache.stats();
    assert_eq!(stats.sieve_hits, 1);
    assert!(stats.evictions >= 1);
}

#[tokio::test]
async fn negative_cache_blocks_store_for_unknown_keys() {
    let (store, cache) = setup(small_config());
    cache.preload(["ghost"]);
    cache.get(&key("ghost")).await.unwrap();
    store.reset_counters();

    for _ in 0..10 {
        assert!(cache.get(&key("ghost")).await.unwrap().is_not_found());
    }
    assert_eq!(store.fetch_count(), 0);
}

#[tokio::test]
async fn sieve_disagreement_trusts_store() {
    let (store, cache) = setup(small_config().with_hot_capacity(1));
    let a = record("a");
    cache.add(&a.key, a.clone()).await.unwrap();
    cache.add(&key("b"), record("b")).await.unwrap();
    store.purge(&a.key);

    let lookup = cache.get(&a.key).await.unwrap();
    assert_eq!(lookup, Lookup::NotFound { tier: Tier::Sieve });
    assert_eq!(cache.existence(&a.key), Some(Existence::Absent));
    assert!(cache.existence_is_consistent());
}

// ============================================================================
// FAILURE SEMANTICS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn timeout_is_retryable_and_not_negative_cached() {
    let (store, cache) = setup(small_config().with_store_timeout(Duration::from_millis(20)));
    let r = record("slow");
    store.seed(r.clone());
    store.set_latency(Duration::from_millis(200));
    cache.preload(["slow"]);

    let err = cache.get(&r.key).await.unwrap_err();
    assert!(matches!(err, CairnError::Store(StoreError::Timeout { .. })));
    assert!(err.is_retryable());
    assert_eq!(cache.existence(&r.key), None);

    store.set_latency(Duration::ZERO);
    let lookup = cache.get(&r.key).await.unwrap();
    assert_eq!(lookup.record(), Some(&r));
    assert_eq!(cache.stats().store_failures, 1);
}

#[tokio::test]
async fn unavailable_store_is_distinct_from_not_found() {
    let (store, cache) = setup(small_config());
    cache.preload(["flaky"]);
    store.fail_next_fetches(1);

    let err = cache.get(&key("flaky")).await.unwrap_err();
    assert!(err.is_store_unavailable());
    assert_eq!(cache.existence(&key("flaky")), None);

    // Next attempt reaches the store again and gets a definitive answer.
    let lookup = cache.get(&key("flaky")).await.unwrap();
    assert_eq!(lookup, Lookup::NotFound { tier: Tier::Store });
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn sieve_fetch_failure_keeps_presence() {
    let (store, cache) = setup(small_config().with_hot_capacity(1));
    let a = record("a");
    cache.add(&a.key, a.clone()).await.unwrap();
    cache.add(&key("b"), record("b")).await.unwrap();
    store.fail_next_fetches(1);

    assert!(cache.get(&a.key).await.is_err());
    assert_eq!(cache.existence(&a.key), Some(Existence::Present));
    assert_eq!(cache.get(&a.key).await.unwrap().record(), Some(&a));
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gets_coalesce_into_one_fetch() {
    let store = Arc::new(InMemoryBackingStore::with_latency(Duration::from_millis(30)));
    let r = record("herd");
    store.seed(r.clone());
    let cache = Arc::new(LookupCoordinator::new(Arc::clone(&store), small_config()).unwrap());
    cache.preload(["herd"]);

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let k = r.key.clone();
            tokio::spawn(async move { cache.get(&k).await })
        })
        .collect();

    for task in tasks {
        let lookup = task.await.unwrap().unwrap();
        assert_eq!(lookup.record(), Some(&r));
    }

    assert_eq!(store.fetch_count(), 1);
    let stats = cache.stats();
    assert_eq!(stats.total_lookups, 32);
    assert_eq!(stats.store_fetches, 1);
    assert_eq!(cache.inflight_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_false_positive_coalesces_into_one_fetch() {
    let store = Arc::new(InMemoryBackingStore::with_latency(Duration::from_millis(30)));
    let cache = Arc::new(LookupCoordinator::new(Arc::clone(&store), small_config()).unwrap());
    cache.preload(["phantom"]);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&key("phantom")).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_not_found());
    }
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(cache.existence(&key("phantom")), Some(Existence::Absent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn without_coalescing_each_caller_fetches() {
    let store = Arc::new(InMemoryBackingStore::with_latency(Duration::from_millis(30)));
    let r = record("herd");
    store.seed(r.clone());
    let config = small_config().with_coalescing(false);
    let cache = Arc::new(LookupCoordinator::new(Arc::clone(&store), config).unwrap());
    cache.preload(["herd"]);

    let barrier = Arc::new(tokio::sync::Barrier::new(4));
    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let k = r.key.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                cache.get(&k).await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_found());
    }
    assert!(store.fetch_count() > 1);
}

/// Reads its records when called but only answers after `reply_delay`.
#[derive(Debug, Clone)]
struct LateReplyStore {
    inner: InMemoryBackingStore,
    reply_delay: Duration,
}

#[async_trait]
impl BackingStore for LateReplyStore {
    async fn fetch(&self, key: &FunctionKey) -> FetchResult {
        let answer = self.inner.fetch(key).await;
        tokio::time::sleep(self.reply_delay).await;
        answer
    }

    async fn put(&self, record: &FunctionRecord) -> Result<(), StoreError> {
        self.inner.put(record).await
    }

    async fn keys(&self) -> Result<Vec<FunctionKey>, StoreError> {
        self.inner.keys().await
    }
}

#[tokio::test(start_paused = true)]
async fn write_during_slow_miss_is_never_recorded_absent() {
    for coalesce in [true, false] {
        let store = Arc::new(LateReplyStore {
            inner: InMemoryBackingStore::new(),
            reply_delay: Duration::from_millis(50),
        });
        let config = small_config().with_hot_capacity(1).with_coalescing(coalesce);
        let cache = Arc::new(LookupCoordinator::new(Arc::clone(&store), config).unwrap());
        let r = record("k");
        cache.preload(["k"]);

        // This fetch reads "absent" before the write below reaches the store.
        let pending = {
            let cache = Arc::clone(&cache);
            let k = r.key.clone();
            tokio::spawn(async move { cache.get(&k).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.add(&r.key, r.clone()).await.unwrap();
        pending.await.unwrap().unwrap();

        // Push the record out of the hot cache so only the sieve remembers it.
        cache.add(&key("other"), record("other")).await.unwrap();
        assert!(!cache.is_hot(&r.key));
        assert_eq!(
            cache.existence(&r.key),
            Some(Existence::Present),
            "coalesce={}",
            coalesce
        );

        let lookup = cache.get(&r.key).await.unwrap();
        assert_eq!(lookup.tier(), Tier::Sieve);
        assert_eq!(lookup.record(), Some(&r));
        assert!(cache.existence_is_consistent());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_workload_keeps_sets_disjoint() {
    let store = Arc::new(InMemoryBackingStore::with_latency(Duration::from_millis(1)));
    let cache = Arc::new(
        LookupCoordinator::new(Arc::clone(&store), small_config().with_hot_capacity(4)).unwrap(),
    );
    let names: Vec<String> = (0..20).map(|i| format!("k{}", i)).collect();
    cache.preload(names.iter());

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let name = names[i % names.len()].clone();
            tokio::spawn(async move {
                let k = key(&name);
                if i % 3 == 0 {
                    cache.add(&k, FunctionRecord::new(k.clone(), "body")).await?;
                }
                cache.get(&k).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
        assert!(cache.existence_is_consistent());
    }
    assert!(cache.existence_is_consistent());
}

// ============================================================================
// MAINTENANCE
// ============================================================================

#[tokio::test]
async fn clear_keeps_filter_but_drops_facts() {
    let (store, cache) = setup(small_config());
    let r = record("kept");
    cache.add(&r.key, r.clone()).await.unwrap();
    cache.get(&key("gone")).await.unwrap();

    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.hot_size, 0);
    assert_eq!(stats.sieve_size, 0);
    assert_eq!(stats.negative_size, 0);
    assert!(cache.might_contain(&r.key));

    // Back to the uncertain path, one store call, then hot again.
    let lookup = cache.get(&r.key).await.unwrap();
    assert_eq!(lookup.tier(), Tier::Store);
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn rebuild_from_store_keeps_added_keys() {
    let (store, cache) = setup(small_config());
    let added = record("added");
    cache.add(&added.key, added.clone()).await.unwrap();
    store.seed(record("seeded"));

    let items = cache.rebuild_filter_from_store().await.unwrap();
    assert!(items >= 2);
    assert!(cache.might_contain(&added.key));
    assert!(cache.might_contain(&key("seeded")));

    let lookup = cache.get(&key("seeded")).await.unwrap();
    assert_eq!(lookup.tier(), Tier::Store);
}

#[tokio::test]
async fn preload_from_store_enables_first_fetch() {
    let (store, cache) = setup(small_config());
    store.seed(record("cold"));

    let report = cache.preload_from_store().await.unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(cache.existence(&key("cold")), None);

    assert!(cache.contains(&key("cold")).await.unwrap());
    assert!(!cache.contains(&key("never")).await.unwrap());
}

#[tokio::test]
async fn stats_track_every_tier() {
    let (store, cache) = setup(small_config());
    store.seed(record("s"));
    cache.preload(["s", "fp"]);
    let hot = record("h");
    cache.add(&hot.key, hot.clone()).await.unwrap();

    cache.get(&hot.key).await.unwrap(); // hot
    cache.get(&key("s")).await.unwrap(); // store, found
    cache.get(&key("fp")).await.unwrap(); // store, false positive
    cache.get(&key("fp")).await.unwrap(); // negative
    cache.get(&key("nope")).await.unwrap(); // filter

    let stats = cache.stats();
    assert_eq!(stats.total_lookups, 5);
    assert_eq!(stats.hot_hits, 1);
    assert_eq!(stats.filter_positives, 2);
    assert_eq!(stats.false_positives, 1);
    assert_eq!(stats.negative_hits, 1);
    assert_eq!(stats.filter_negatives, 1);
    assert_eq!(stats.store_fetches, 2);
    assert_eq!(stats.not_found, 3);
    assert_eq!(stats.adds, 1);
    assert_eq!(stats.sieve_size, 2);
    assert_eq!(stats.negative_size, 2);
    assert!(stats.filter_estimated_fp_rate > 0.0);
    assert!((stats.memory_hit_rate() - 0.6).abs() < 0.001);
}
