//! Error types for CAIRN operations
//!
//! A definitive absence is not an error: lookups report it as a regular
//! result. Everything here is either a caller bug (validation), an operator
//! bug (config), or a transient backing-store fault.

use std::time::Duration;
use thiserror::Error;

/// Backing store errors.
///
/// Every variant is transient from the cache's point of view and must never
/// be recorded as a confirmed absence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Store fetch for {key} timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    #[error("Store write for {key} failed: {reason}")]
    WriteFailed { key: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Key mismatch: record carries {record_key}, caller passed {key}")]
    KeyMismatch { key: String, record_key: String },

    #[error("Self-reference detected in {name}: {reason}")]
    SelfReference { name: String, reason: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Execution engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Execution of {key} failed: {reason}")]
    Failed { key: String, reason: String },
}

/// Master error type for all CAIRN errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CairnError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl CairnError {
    /// True when the backing store could not answer. Callers may retry.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// True when repeating the same call may succeed.
    ///
    /// Only store faults qualify; validation and config errors are caller
    /// bugs that fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        self.is_store_unavailable()
    }

    /// True when the caller passed a malformed key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::Validation(ValidationError::InvalidKey { .. }))
    }
}

/// Result type alias for CAIRN operations.
pub type CairnResult<T> = Result<T, CairnError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_timeout() {
        let err = StoreError::Timeout {
            key: "abc".to_string(),
            after: Duration::from_millis(50),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("50ms"));
    }

    #[test]
    fn test_validation_error_display_invalid_key() {
        let err = ValidationError::InvalidKey {
            key: "a b".to_string(),
            reason: "whitespace".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid key"));
        assert!(msg.contains("a b"));
        assert!(msg.contains("whitespace"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "hot_capacity".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("hot_capacity"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_cairn_error_from_variants() {
        let store = CairnError::from(StoreError::Unavailable {
            reason: "down".to_string(),
        });
        assert!(matches!(store, CairnError::Store(_)));

        let validation = CairnError::from(ValidationError::RequiredFieldMissing {
            field: "source".to_string(),
        });
        assert!(matches!(validation, CairnError::Validation(_)));

        let config = CairnError::from(ConfigError::InvalidValue {
            field: "f".to_string(),
            value: "v".to_string(),
            reason: "r".to_string(),
        });
        assert!(matches!(config, CairnError::Config(_)));

        let exec = CairnError::from(ExecutionError::Failed {
            key: "k".to_string(),
            reason: "boom".to_string(),
        });
        assert!(matches!(exec, CairnError::Execution(_)));
    }

    #[test]
    fn test_retryable_classification() {
        let timeout = CairnError::from(StoreError::Timeout {
            key: "k".to_string(),
            after: Duration::from_secs(1),
        });
        assert!(timeout.is_retryable());
        assert!(timeout.is_store_unavailable());

        let invalid = CairnError::from(ValidationError::InvalidKey {
            key: String::new(),
            reason: "empty".to_string(),
        });
        assert!(!invalid.is_retryable());
        assert!(invalid.is_invalid_key());
    }
}
