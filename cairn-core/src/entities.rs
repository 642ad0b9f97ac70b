//! Registry entities

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{
    compute_content_hash, new_artifact_id, ArtifactId, ContentHash, FunctionKey, Timestamp,
};

/// A registered function, fully materialized.
///
/// The backing store holds the authoritative copy; the hot cache may hold a
/// clone at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Content-derived key.
    pub key: FunctionKey,
    /// Human-facing name supplied at registration.
    pub name: Option<String>,
    /// Original source payload.
    pub source: String,
    /// Reference to the compiled/derived artifact.
    pub artifact_id: ArtifactId,
    /// SHA-256 of `source`.
    pub content_hash: ContentHash,
    pub created_at: Timestamp,
}

impl FunctionRecord {
    /// Build a record for `source` under `key`, stamping a fresh artifact id
    /// and creation time.
    pub fn new(key: FunctionKey, source: impl Into<String>) -> Self {
        let source = source.into();
        let content_hash = compute_content_hash(source.as_bytes());
        Self {
            key,
            name: None,
            source,
            artifact_id: new_artifact_id(),
            content_hash,
            created_at: chrono::Utc::now(),
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check that this record may be stored under `key`.
    pub fn ensure_key(&self, key: &FunctionKey) -> Result<(), ValidationError> {
        if &self.key != key {
            return Err(ValidationError::KeyMismatch {
                key: key.to_string(),
                record_key: self.key.to_string(),
            });
        }
        Ok(())
    }

    /// True when `content_hash` still matches `source`.
    pub fn verify_integrity(&self) -> bool {
        compute_content_hash(self.source.as_bytes()) == self.content_hash
    }
}
