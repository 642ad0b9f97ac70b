//! Pre-registration loop analysis.

use cairn_core::ValidationError;

/// Rejects sources that would recurse into themselves when executed.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait LoopAnalyzer: Send + Sync {
    /// Returns `Err(ValidationError::SelfReference)` if `source`, registered
    /// as `name`, refers to itself.
    fn analyze(&self, name: &str, source: &str) -> Result<(), ValidationError>;
}

/// Textual self-call detector.
///
/// The first `name(` in the source is taken as the declaration; any later
/// call of the same name is a self-reference. Identifiers that merely end in
/// `name` (`rename(` for `name`) do not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfReferenceAnalyzer;

impl SelfReferenceAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Byte offsets of every `name(` not preceded by an identifier character.
    fn call_sites(name: &str, source: &str) -> Vec<usize> {
        let needle = format!("{}(", name);
        source
            .match_indices(needle.as_str())
            .map(|(at, _)| at)
            .filter(|&at| {
                source[..at]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
            })
            .collect()
    }
}

impl LoopAnalyzer for SelfReferenceAnalyzer {
    fn analyze(&self, name: &str, source: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Ok(());
        }
        // sites[0] is the declaration itself.
        match Self::call_sites(name, source).get(1) {
            Some(&offset) => Err(ValidationError::SelfReference {
                name: name.to_string(),
                reason: format!("calls itself at byte offset {}", offset),
            }),
            None => Ok(()),
        }
    }
}
