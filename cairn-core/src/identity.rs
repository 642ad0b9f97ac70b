//! Identity types for registered functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Upper bound on the encoded length of a key.
pub const MAX_KEY_LEN: usize = 256;

/// Artifact identifier using UUIDv7 for timestamp-sortable IDs.
pub type ArtifactId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for deduplication and integrity verification.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 artifact reference (timestamp-sortable).
pub fn new_artifact_id() -> ArtifactId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Content-derived key of a registered function.
///
/// The cache treats keys as opaque: only equality and hashing matter. The
/// constructor rejects values no hasher would produce so that malformed keys
/// fail at the boundary instead of polluting the cache tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionKey(String);

impl FunctionKey {
    /// Validate and wrap a key.
    ///
    /// A key must be non-empty, at most [`MAX_KEY_LEN`] bytes, and consist of
    /// printable ASCII without whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::InvalidKey {
                key: raw,
                reason: "key must not be empty".to_string(),
            });
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(ValidationError::InvalidKey {
                reason: format!("key exceeds {} bytes", MAX_KEY_LEN),
                key: raw,
            });
        }
        if !raw.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(ValidationError::InvalidKey {
                key: raw,
                reason: "key must be printable ASCII without whitespace".to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// Derive a key from a content hash (lowercase hex).
    pub fn from_hash(hash: &ContentHash) -> Self {
        Self(hex::encode(hash))
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FunctionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for FunctionKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for FunctionKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FunctionKey {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FunctionKey> for String {
    fn from(key: FunctionKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for FunctionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
