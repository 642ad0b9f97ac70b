//! Lookup results carrying the tier that answered them.
//!
//! A definitive absence is a normal result, not an error: callers see
//! `Lookup::NotFound` and can still tell which tier made the call.

use cairn_core::FunctionRecord;
use serde::{Deserialize, Serialize};

/// Cascade step that resolved a lookup, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Served from the hot record cache.
    Hot,
    /// Key is in the negative set; no store call.
    Negative,
    /// Key is in the sieve; record fetched from the store.
    Sieve,
    /// Membership filter ruled the key out; no store call.
    Filter,
    /// Filter was uncertain; the store decided.
    Store,
}

impl Tier {
    /// Returns true if resolving at this tier costs a store round trip.
    pub fn touches_store(&self) -> bool {
        matches!(self, Self::Sieve | Self::Store)
    }
}

/// Result of a cascade lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found { record: FunctionRecord, tier: Tier },
    NotFound { tier: Tier },
}

impl Lookup {
    /// The tier that produced this result.
    pub fn tier(&self) -> Tier {
        match self {
            Self::Found { tier, .. } | Self::NotFound { tier } => *tier,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Borrow the record, if found.
    pub fn record(&self) -> Option<&FunctionRecord> {
        match self {
            Self::Found { record, .. } => Some(record),
            Self::NotFound { .. } => None,
        }
    }

    /// Consume the result and return the record, if found.
    pub fn into_record(self) -> Option<FunctionRecord> {
        match self {
            Self::Found { record, .. } => Some(record),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<Lookup> for Option<FunctionRecord> {
    fn from(lookup: Lookup) -> Self {
        lookup.into_record()
    }
}
