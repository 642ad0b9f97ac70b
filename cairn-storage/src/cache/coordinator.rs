//! Cascading lookup coordinator.
//!
//! Routes every lookup through the in-memory tiers in increasing cost order
//! and only falls back to the backing store when none of them can answer:
//!
//! 1. hot record cache
//! 2. negative set (confirmed absent)
//! 3. sieve (confirmed present, record not hot) -> store
//! 4. membership filter says absent -> record absence
//! 5. filter says maybe -> store decides
//!
//! # Concurrency
//!
//! One mutex guards the filter, hot cache, existence sets and stats together
//! so a resolution updates all of them in one step. It is never held across
//! an `.await`; the store call happens outside it. Every store round trip
//! and every write for a key runs under that key's gate, so a fetch that
//! started before an `add` always settles before the write lands. With
//! coalescing on, callers queued at the gate re-run the in-memory tiers and
//! usually skip their own store call.
//!
//! # Cancellation
//!
//! State is only written in synchronous sections after the store round trip
//! has completed, so dropping a lookup future mid-flight leaves nothing
//! half-applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use cairn_core::{
    CairnError, CairnResult, CascadeConfig, FunctionKey, FunctionRecord, StoreError,
};
use tracing::{debug, info, trace, warn};

use super::existence::{Existence, ExistenceSets};
use super::filter::MembershipFilter;
use super::inflight::InflightRegistry;
use super::lookup::{Lookup, Tier};
use super::recency::BoundedRecencyCache;
use super::stats::{LookupStats, LookupStatsSnapshot, TierSizes};
use crate::store::BackingStore;

/// Keys added per lock acquisition during preload and rebuild.
const PRELOAD_CHUNK: usize = 256;

/// Everything the cascade reads and writes, behind one lock.
#[derive(Debug)]
struct CascadeState {
    filter: MembershipFilter,
    hot: BoundedRecencyCache<FunctionKey, FunctionRecord>,
    existence: ExistenceSets<FunctionKey>,
    stats: LookupStats,
    saturation_warned: bool,
}

impl CascadeState {
    fn new(config: &CascadeConfig) -> Self {
        Self {
            filter: MembershipFilter::new(config.filter_expected_items, config.filter_fp_rate),
            hot: BoundedRecencyCache::new(config.hot_capacity),
            existence: ExistenceSets::new(),
            stats: LookupStats::default(),
            saturation_warned: false,
        }
    }

    fn cache_hot(&mut self, key: FunctionKey, record: FunctionRecord) {
        if let Some((evicted, _)) = self.hot.set(key, record) {
            self.stats.evictions += 1;
            trace!(key = %evicted, "evicted from hot cache");
        }
    }

    fn add_to_filter(&mut self, key: &FunctionKey) {
        self.filter.add(key);
        if self.filter.is_over_capacity() && !self.saturation_warned {
            self.saturation_warned = true;
            warn!(
                items = self.filter.len(),
                capacity = self.filter.capacity(),
                estimated_fp_rate = self.filter.estimate_false_positive_rate(),
                "membership filter over capacity; rebuild it from the store"
            );
        }
    }
}

/// What the in-memory tiers decided.
enum Probe {
    Resolved(Lookup),
    Fetch(FetchPath),
}

/// Why a lookup needs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPath {
    /// Key is confirmed present but not hot.
    Sieve,
    /// Filter says maybe; nothing else is known.
    Uncertain,
}

/// Outcome of a filter preload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Keys added to the filter.
    pub loaded: usize,
    /// Keys rejected as malformed.
    pub invalid: usize,
    /// True if the budget ran out before the input did.
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Multi-tier lookup cache in front of a backing store.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryBackingStore::new());
/// let cache = LookupCoordinator::new(store, CascadeConfig::default())?;
///
/// cache.add(&key, record).await?;
/// match cache.get(&key).await? {
///     Lookup::Found { record, tier } => { /* ... */ }
///     Lookup::NotFound { .. } => { /* definitive absence */ }
/// }
/// ```
pub struct LookupCoordinator<S: BackingStore + ?Sized> {
    store: Arc<S>,
    state: Mutex<CascadeState>,
    inflight: InflightRegistry,
    config: CascadeConfig,
}

impl<S: BackingStore + ?Sized> LookupCoordinator<S> {
    /// Create a coordinator over `store`.
    pub fn new(store: Arc<S>, config: CascadeConfig) -> CairnResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            state: Mutex::new(CascadeState::new(&config)),
            inflight: InflightRegistry::new(),
            config,
        })
    }

    /// Create a coordinator with default configuration.
    pub fn with_defaults(store: Arc<S>) -> Self {
        let config = CascadeConfig::default();
        Self {
            store,
            state: Mutex::new(CascadeState::new(&config)),
            inflight: InflightRegistry::new(),
            config,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Get a reference to the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn state(&self) -> MutexGuard<'_, CascadeState> {
        // Critical sections do no fallible work, so a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    /// Resolve `key` through the cascade.
    ///
    /// Returns `Lookup::NotFound` for a definitive absence. A store timeout or
    /// failure is returned as a retryable [`CairnError::Store`] and is never
    /// recorded as an absence.
    pub async fn get(&self, key: &FunctionKey) -> CairnResult<Lookup> {
        let started = Instant::now();

        let path = match self.probe(key, started) {
            Probe::Resolved(lookup) => return Ok(lookup),
            Probe::Fetch(path) => path,
        };

        // Held until the fetch settles so no `add` can land between the
        // store's answer and the state update.
        let flight = self.inflight.acquire(key).await;
        if !self.config.coalesce_fetches {
            return self.fetch_and_settle(key, path, started).await;
        }
        if flight.waited() {
            self.state().stats.coalesced_waits += 1;
        }

        // Whoever held the gate before us may have settled the key already.
        match self.probe(key, started) {
            Probe::Resolved(lookup) => Ok(lookup),
            Probe::Fetch(path) => self.fetch_and_settle(key, path, started).await,
        }
    }

    /// Validate a raw key, then [`get`](Self::get) it.
    ///
    /// Malformed keys fail immediately with `InvalidKey` and never reach any tier.
    pub async fn lookup(&self, raw: &str) -> CairnResult<Lookup> {
        let key = match FunctionKey::new(raw) {
            Ok(key) => key,
            Err(err) => {
                self.state().stats.invalid_keys += 1;
                return Err(err.into());
            }
        };
        self.get(&key).await
    }

    /// Returns true if `key` resolves to a record.
    pub async fn contains(&self, key: &FunctionKey) -> CairnResult<bool> {
        Ok(self.get(key).await?.is_found())
    }

    /// Steps 1, 2 and 4 of the cascade; decides whether step 3 or 5 is needed.
    fn probe(&self, key: &FunctionKey, started: Instant) -> Probe {
        let mut guard = self.state();
        let state = &mut *guard;

        if let Some(record) = state.hot.get(key).cloned() {
            state.stats.resolved(Tier::Hot, true, started);
            trace!(key = %key, "hot hit");
            return Probe::Resolved(Lookup::Found {
                record,
                tier: Tier::Hot,
            });
        }

        match state.existence.lookup(key) {
            Some(Existence::Absent) => {
                state.stats.resolved(Tier::Negative, false, started);
                Probe::Resolved(Lookup::NotFound {
                    tier: Tier::Negative,
                })
            }
            Some(Existence::Present) => Probe::Fetch(FetchPath::Sieve),
            None if !state.filter.might_contain(key) => {
                state.existence.mark_absent(key.clone());
                state.stats.resolved(Tier::Filter, false, started);
                debug!(key = %key, "filter ruled key out");
                Probe::Resolved(Lookup::NotFound { tier: Tier::Filter })
            }
            None => Probe::Fetch(FetchPath::Uncertain),
        }
    }

    /// Steps 3 and 5: one store round trip, then a single state update.
    async fn fetch_and_settle(
        &self,
        key: &FunctionKey,
        path: FetchPath,
        started: Instant,
    ) -> CairnResult<Lookup> {
        let timeout = self.config.store_timeout;
        let fetched = match tokio::time::timeout(timeout, self.store.fetch(key)).await {
            Ok(result) => result.into_result(),
            Err(_) => Err(StoreError::Timeout {
                key: key.to_string(),
                after: timeout,
            }),
        };

        let mut guard = self.state();
        let state = &mut *guard;
        state.stats.store_fetches += 1;
        match path {
            FetchPath::Sieve => state.stats.sieve_hits += 1,
            FetchPath::Uncertain => state.stats.filter_positives += 1,
        }

        let lookup = match (path, fetched) {
            (_, Err(err)) => {
                state.stats.store_failures += 1;
                state.stats.finish(started);
                drop(guard);
                warn!(key = %key, path = ?path, error = %err, "store fetch failed");
                return Err(CairnError::Store(err));
            }
            (FetchPath::Sieve, Ok(Some(record))) => {
                state.cache_hot(key.clone(), record.clone());
                Lookup::Found {
                    record,
                    tier: Tier::Sieve,
                }
            }
            (FetchPath::Sieve, Ok(None)) => {
                // The store is authoritative even when it contradicts the sieve.
                state.existence.mark_absent(key.clone());
                state.hot.remove(key);
                state.stats.not_found += 1;
                warn!(key = %key, "store lost a key the sieve confirmed present");
                Lookup::NotFound { tier: Tier::Sieve }
            }
            (FetchPath::Uncertain, Ok(Some(record))) => {
                state.existence.mark_present(key.clone());
                state.cache_hot(key.clone(), record.clone());
                state.add_to_filter(key);
                debug!(key = %key, "store confirmed filter positive");
                Lookup::Found {
                    record,
                    tier: Tier::Store,
                }
            }
            (FetchPath::Uncertain, Ok(None)) => {
                state.existence.mark_absent(key.clone());
                state.stats.false_positives += 1;
                state.stats.not_found += 1;
                debug!(key = %key, "filter false positive");
                Lookup::NotFound { tier: Tier::Store }
            }
        };
        state.stats.finish(started);
        Ok(lookup)
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Insert `record` under `key`, writing through to the store.
    ///
    /// On success the key is in the filter, the sieve and the hot cache, so
    /// the next `get` answers without a store call. On a store failure no
    /// in-memory tier is touched except that a stale absence for `key` is
    /// dropped.
    pub async fn add(&self, key: &FunctionKey, record: FunctionRecord) -> CairnResult<()> {
        record.ensure_key(key)?;

        let _flight = self.inflight.acquire(key).await;

        // A stale absence must not outlive a write, even if this future is dropped mid-flight.
        self.state().existence.forget_absent(key);

        let timeout = self.config.store_timeout;
        let written = match tokio::time::timeout(timeout, self.store.put(&record)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                key: key.to_string(),
                after: timeout,
            }),
        };
        if let Err(err) = written {
            warn!(key = %key, error = %err, "write-through failed");
            return Err(err.into());
        }

        let mut guard = self.state();
        let state = &mut *guard;
        state.add_to_filter(key);
        state.existence.mark_present(key.clone());
        state.cache_hot(key.clone(), record);
        state.stats.adds += 1;
        debug!(key = %key, "added");
        Ok(())
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Warm the membership filter with `keys` within the configured budget.
    ///
    /// Only the filter is touched: a preloaded key still takes the uncertain
    /// path on its first `get`.
    pub fn preload<I, K>(&self, keys: I) -> PreloadReport
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.preload_with_budget(keys, self.config.preload_budget)
    }

    /// [`preload`](Self::preload) with an explicit budget.
    pub fn preload_with_budget<I, K>(&self, keys: I, budget: Duration) -> PreloadReport
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let started = Instant::now();
        let mut report = PreloadReport::default();
        let mut keys = keys.into_iter().peekable();

        while keys.peek().is_some() {
            if started.elapsed() >= budget {
                report.truncated = true;
                break;
            }
            let mut guard = self.state();
            for raw in keys.by_ref().take(PRELOAD_CHUNK) {
                match FunctionKey::new(raw.as_ref()) {
                    Ok(key) => {
                        guard.add_to_filter(&key);
                        report.loaded += 1;
                    }
                    Err(_) => report.invalid += 1,
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            loaded = report.loaded,
            invalid = report.invalid,
            truncated = report.truncated,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "filter preload finished"
        );
        report
    }

    /// Preload the filter from the store's key listing.
    pub async fn preload_from_store(&self) -> CairnResult<PreloadReport> {
        let keys = self.store.keys().await?;
        Ok(self.preload(keys.iter().map(FunctionKey::as_str)))
    }

    /// Replace the membership filter with a freshly sized one.
    ///
    /// The new filter holds `keys` plus every key already confirmed present,
    /// so nothing added through this coordinator becomes a false negative.
    pub fn rebuild_filter<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = FunctionKey>,
    {
        let keys: Vec<FunctionKey> = keys.into_iter().collect();
        let confirmed = self.state().existence.sieve_len();
        let expected = self
            .config
            .filter_expected_items
            .max(keys.len() + confirmed);

        // The listing is hashed without the state lock; lookups keep running
        // against the old filter meanwhile.
        let mut filter = MembershipFilter::new(expected, self.config.filter_fp_rate);
        for key in &keys {
            filter.add(key);
        }

        // Keys confirmed during the build are picked up here.
        let mut guard = self.state();
        let state = &mut *guard;
        for key in state.existence.present_keys().chain(state.hot.keys()) {
            filter.add(key);
        }

        let items = filter.len();
        state.filter = filter;
        state.saturation_warned = false;
        info!(items, capacity = expected, "membership filter rebuilt");
        items
    }

    /// Rebuild the filter from the store's key listing.
    pub async fn rebuild_filter_from_store(&self) -> CairnResult<usize> {
        let keys = self.store.keys().await?;
        Ok(self.rebuild_filter(keys))
    }

    /// Drop the hot cache and both existence sets. The filter is kept.
    pub fn clear(&self) {
        let mut guard = self.state();
        guard.hot.clear();
        guard.existence.clear();
        info!("hot cache and existence sets cleared");
    }

    /// Forget everything cached about `key` except its filter bits.
    pub fn invalidate(&self, key: &FunctionKey) {
        let mut guard = self.state();
        guard.hot.remove(key);
        guard.existence.forget(key);
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Immutable snapshot of counters and tier sizes.
    pub fn stats(&self) -> LookupStatsSnapshot {
        let guard = self.state();
        let sizes = TierSizes {
            hot_size: guard.hot.len(),
            hot_capacity: guard.hot.capacity(),
            sieve_size: guard.existence.sieve_len(),
            negative_size: guard.existence.negative_len(),
            filter_items: guard.filter.len(),
            filter_bits: guard.filter.num_bits(),
            filter_hashes: guard.filter.num_hashes(),
            filter_estimated_fp_rate: guard.filter.estimate_false_positive_rate(),
        };
        LookupStatsSnapshot::capture(&guard.stats, sizes)
    }

    /// What the existence sets currently know about `key`.
    pub fn existence(&self, key: &FunctionKey) -> Option<Existence> {
        self.state().existence.lookup(key)
    }

    /// Returns true if the filter might contain `key`.
    pub fn might_contain(&self, key: &FunctionKey) -> bool {
        self.state().filter.might_contain(key)
    }

    /// Returns true if `key` is in the hot cache. Does not change recency.
    pub fn is_hot(&self, key: &FunctionKey) -> bool {
        self.state().hot.contains(key)
    }

    /// Returns true if no key sits in both existence sets.
    pub fn existence_is_consistent(&self) -> bool {
        self.state().existence.is_disjoint()
    }

    /// Keys with a store call currently in flight.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }
}

impl<S: BackingStore + ?Sized> std::fmt::Debug for LookupCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCoordinator")
            .field("config", &self.config)
            .field("inflight", &self.inflight.len())
            .finish_non_exhaustive()
    }
}
