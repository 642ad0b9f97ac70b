//! Backing store capability.
//!
//! The store is the authoritative home of every record. It is slow (tens of
//! milliseconds per access) and is the only suspension point in a lookup.

use async_trait::async_trait;
use cairn_core::{FunctionKey, FunctionRecord, StoreError};

/// Outcome of a single store fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The store holds a record for the key.
    Found(FunctionRecord),
    /// The store definitively has no record for the key.
    NotFound,
    /// The store could not answer. Says nothing about existence.
    Unavailable { reason: String },
}

impl FetchResult {
    /// Returns true if the store returned a record.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Convert into a definitive answer or a store error.
    pub fn into_result(self) -> Result<Option<FunctionRecord>, StoreError> {
        match self {
            Self::Found(record) => Ok(Some(record)),
            Self::NotFound => Ok(None),
            Self::Unavailable { reason } => Err(StoreError::Unavailable { reason }),
        }
    }
}

/// Backing store trait for pluggable persistence.
///
/// # Contract
///
/// - `fetch` is idempotent and has no side effects when it returns `NotFound`.
/// - Latency is bounded but variable; the cache applies its own timeout.
/// - Implementations should be thread-safe and support concurrent access.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Fetch the record stored under `key`.
    async fn fetch(&self, key: &FunctionKey) -> FetchResult;

    /// Persist a record under its own key, replacing any previous value.
    async fn put(&self, record: &FunctionRecord) -> Result<(), StoreError>;

    /// List every stored key.
    ///
    /// Used to rebuild or warm the membership filter; may be expensive.
    async fn keys(&self) -> Result<Vec<FunctionKey>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_result_into_result() {
        let record = FunctionRecord::new(FunctionKey::new("k").unwrap(), "src");
        assert_eq!(
            FetchResult::Found(record.clone()).into_result(),
            Ok(Some(record))
        );
        assert_eq!(FetchResult::NotFound.into_result(), Ok(None));

        let err = FetchResult::Unavailable {
            reason: "down".to_string(),
        }
        .into_result()
        .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }
}
