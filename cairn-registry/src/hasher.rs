//! Source-to-key hashing.

use cairn_core::FunctionKey;
use sha2::{Digest, Sha256};

/// Produces the content-derived key a source is registered under.
///
/// Two sources that should be treated as the same function must hash to the
/// same key. Implementations must be thread-safe (Send + Sync).
pub trait KeyHasher: Send + Sync {
    fn hash_source(&self, source: &str) -> FunctionKey;
}

/// Hashes whitespace-normalized source with SHA-256.
///
/// Lines are trimmed and blank lines dropped before hashing, so indentation
/// and spacing changes do not produce a new key. Anything else does.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256KeyHasher;

impl Sha256KeyHasher {
    pub fn new() -> Self {
        Self
    }

    /// The exact text that gets hashed.
    pub fn normalize(source: &str) -> String {
        source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl KeyHasher for Sha256KeyHasher {
    fn hash_source(&self, source: &str) -> FunctionKey {
        let normalized = Self::normalize(source);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        let digest = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        FunctionKey::from_hash(&hash)
    }
}
