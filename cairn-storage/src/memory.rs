//! In-memory backing store.
//!
//! Deterministic stand-in for a real persistence layer: latency is a fixed,
//! configurable delay instead of a random one, and faults are scripted. Every
//! call is counted so tests can assert exactly how much traffic the cache let
//! through.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use cairn_core::{FunctionKey, FunctionRecord, StoreError};

use crate::store::{BackingStore, FetchResult};

/// In-memory backing store with fetch counters and fault injection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackingStore {
    records: Arc<RwLock<HashMap<FunctionKey, FunctionRecord>>>,
    latency_ms: Arc<AtomicU64>,
    fetches: Arc<AtomicU64>,
    puts: Arc<AtomicU64>,
    failing_fetches: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl InMemoryBackingStore {
    /// Create an empty store with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that sleeps `latency` on every call.
    pub fn with_latency(latency: Duration) -> Self {
        let store = Self::default();
        store.set_latency(latency);
        store
    }

    /// Change the simulated per-call latency.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Seed a record without going through `put` or the counters.
    ///
    /// Models data that already lives in the store before the cache starts.
    pub fn seed(&self, record: FunctionRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.key.clone(), record);
        }
    }

    /// Remove a record directly, bypassing the cache.
    pub fn purge(&self, key: &FunctionKey) -> Option<FunctionRecord> {
        self.records.write().ok().and_then(|mut r| r.remove(key))
    }

    /// Make the next `n` fetches report `Unavailable`.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    /// Take the whole store offline (or back online).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `fetch` calls observed.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `put` calls observed.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Reset the call counters.
    pub fn reset_counters(&self) {
        self.fetches.store(0, Ordering::SeqCst);
        self.puts.store(0, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn take_scripted_failure(&self) -> bool {
        self.failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    async fn fetch(&self, key: &FunctionKey) -> FetchResult {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) || self.take_scripted_failure() {
            return FetchResult::Unavailable {
                reason: "in-memory store offline".to_string(),
            };
        }

        match self.records.read() {
            Ok(records) => match records.get(key) {
                Some(record) => FetchResult::Found(record.clone()),
                None => FetchResult::NotFound,
            },
            Err(_) => FetchResult::Unavailable {
                reason: "store lock poisoned".to_string(),
            },
        }
    }

    async fn put(&self, record: &FunctionRecord) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed {
                key: record.key.to_string(),
                reason: "in-memory store offline".to_string(),
            });
        }

        let mut records = self.records.write().map_err(|_| StoreError::WriteFailed {
            key: record.key.to_string(),
            reason: "store lock poisoned".to_string(),
        })?;
        records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<FunctionKey>, StoreError> {
        self.simulate_latency().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "in-memory store offline".to_string(),
            });
        }

        let records = self.records.read().map_err(|_| StoreError::Unavailable {
            reason: "store lock poisoned".to_string(),
        })?;
        Ok(records.keys().cloned().collect())
    }
}
