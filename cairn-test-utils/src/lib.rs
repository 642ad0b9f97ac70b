//! CAIRN Test Utilities
//!
//! Centralized test infrastructure for the CAIRN workspace:
//! - Proptest generators for keys, sources and records
//! - Test fixtures for common cache setups
//! - Custom assertions for CAIRN-specific validation

use std::sync::Arc;
use std::time::Duration;

// Re-export the in-memory store from its source crate
pub use cairn_storage::{InMemoryBackingStore, Lookup, LookupCoordinator, Tier};

// Re-export core types for convenience
pub use cairn_core::{
    compute_content_hash, ArtifactId, CairnError, CairnResult, CascadeConfig, ContentHash,
    FunctionKey, FunctionRecord, StoreError, Timestamp, ValidationError, MAX_KEY_LEN,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating CAIRN types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a valid key string: 1..=64 printable, non-space ASCII chars.
    pub fn arb_key_string() -> impl Strategy<Value = String> {
        "[!-~]{1,64}"
    }

    /// Generate a valid FunctionKey.
    pub fn arb_function_key() -> impl Strategy<Value = FunctionKey> {
        arb_key_string().prop_filter_map("key rejected", |raw| FunctionKey::new(raw).ok())
    }

    /// Generate a key string that must be rejected.
    pub fn arb_invalid_key_string() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{0,8} [a-z]{0,8}",
            "[a-z]{0,8}\t[a-z]{0,8}",
            "[a-z]{0,8}é[a-z]{0,8}",
            Just("x".repeat(MAX_KEY_LEN + 1)),
        ]
    }

    /// Generate a small function source.
    pub fn arb_source() -> impl Strategy<Value = String> {
        ("[a-z]{1,12}", "[a-z]{1,4}", "[a-z0-9 +*-]{0,40}").prop_map(|(name, arg, body)| {
            format!("fn {}({}) {{ {} }}", name, arg, body)
        })
    }

    /// Generate a random ArtifactId.
    pub fn arb_artifact_id() -> impl Strategy<Value = ArtifactId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a FunctionRecord whose content hash matches its source.
    pub fn arb_function_record() -> impl Strategy<Value = FunctionRecord> {
        (
            arb_function_key(),
            arb_source(),
            proptest::option::of("[a-z_]{1,16}"),
            arb_artifact_id(),
            arb_timestamp(),
        )
            .prop_map(|(key, source, name, artifact_id, created_at)| {
                let mut record = FunctionRecord::new(key, source);
                record.name = name;
                record.artifact_id = artifact_id;
                record.created_at = created_at;
                record
            })
    }

    /// Generate a set of distinct records.
    pub fn arb_distinct_records(max: usize) -> impl Strategy<Value = Vec<FunctionRecord>> {
        prop::collection::hash_map(arb_function_key(), arb_source(), 1..=max).prop_map(|map| {
            map.into_iter()
                .map(|(key, source)| FunctionRecord::new(key, source))
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Small cache configuration suited to unit tests.
    pub fn small_config() -> CascadeConfig {
        CascadeConfig::new()
            .with_hot_capacity(16)
            .with_filter(1_000, 0.01)
            .with_store_timeout(Duration::from_millis(200))
            .with_preload_budget(Duration::from_secs(1))
    }

    /// Build a key, panicking on malformed input.
    #[track_caller]
    pub fn key(raw: &str) -> FunctionKey {
        match FunctionKey::new(raw) {
            Ok(key) => key,
            Err(e) => panic!("fixture key {:?} rejected: {}", raw, e),
        }
    }

    /// A record for `raw` with a trivial body.
    pub fn record(raw: &str) -> FunctionRecord {
        FunctionRecord::new(key(raw), format!("fn {}(x) {{ x }}", raw))
    }

    /// An empty in-memory store and a coordinator over it.
    pub fn empty_cache() -> (
        Arc<InMemoryBackingStore>,
        LookupCoordinator<InMemoryBackingStore>,
    ) {
        cache_over(InMemoryBackingStore::new(), small_config())
    }

    /// A coordinator over `store` with `config`.
    #[track_caller]
    pub fn cache_over(
        store: InMemoryBackingStore,
        config: CascadeConfig,
    ) -> (
        Arc<InMemoryBackingStore>,
        LookupCoordinator<InMemoryBackingStore>,
    ) {
        let store = Arc::new(store);
        match LookupCoordinator::new(Arc::clone(&store), config) {
            Ok(cache) => (store, cache),
            Err(e) => panic!("fixture config rejected: {}", e),
        }
    }

    /// A store pre-seeded with one record per key.
    pub fn seeded_store<'a>(keys: impl IntoIterator<Item = &'a str>) -> InMemoryBackingStore {
        let store = InMemoryBackingStore::new();
        for raw in keys {
            store.seed(record(raw));
        }
        store
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for CAIRN-specific validation.

    use super::*;

    /// Assert that a CairnResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &CairnResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a CairnResult is a retryable store error.
    #[track_caller]
    pub fn assert_store_unavailable<T: std::fmt::Debug>(result: &CairnResult<T>) {
        match result {
            Err(e @ CairnError::Store(_)) => assert!(e.is_retryable()),
            other => panic!("Expected Store error, got: {:?}", other),
        }
    }

    /// Assert that a CairnResult is an InvalidKey validation error.
    #[track_caller]
    pub fn assert_invalid_key<T: std::fmt::Debug>(result: &CairnResult<T>) {
        match result {
            Err(CairnError::Validation(ValidationError::InvalidKey { .. })) => {}
            other => panic!("Expected InvalidKey error, got: {:?}", other),
        }
    }

    /// Assert that a lookup found a record at `tier`.
    #[track_caller]
    pub fn assert_found_at(lookup: &Lookup, tier: Tier) {
        match lookup {
            Lookup::Found { tier: got, .. } => {
                assert_eq!(*got, tier, "Found at wrong tier");
            }
            other => panic!("Expected Found at {:?}, got: {:?}", tier, other),
        }
    }

    /// Assert that a lookup was a definitive absence decided at `tier`.
    #[track_caller]
    pub fn assert_not_found_at(lookup: &Lookup, tier: Tier) {
        match lookup {
            Lookup::NotFound { tier: got } => {
                assert_eq!(*got, tier, "NotFound at wrong tier");
            }
            other => panic!("Expected NotFound at {:?}, got: {:?}", tier, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
