//! CAIRN Core - Registry Types
//!
//! Keys, records, errors and configuration shared by every CAIRN crate.
//! This crate contains ONLY data types - no caching or storage logic.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;

pub use config::{CascadeConfig, MAX_FILTER_BITS};
pub use entities::FunctionRecord;
pub use error::{
    CairnError, CairnResult, ConfigError, ExecutionError, StoreError, ValidationError,
};
pub use identity::{
    compute_content_hash, new_artifact_id, ArtifactId, ContentHash, FunctionKey, Timestamp,
    MAX_KEY_LEN,
};

// ============================================================================
// PROPERTY TESTS
// ============================================================================
