//! Configuration types

use crate::error::{CairnError, CairnResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;
use std::time::Duration;

/// Largest membership filter a config may ask for, in bits (512 MiB).
pub const MAX_FILTER_BITS: u64 = 1 << 32;

/// Sizing and timing for the lookup cascade.
///
/// Filter sizing is fixed at construction. Exceeding
/// `filter_expected_items` degrades the false-positive rate; it does not
/// resize anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Maximum number of records kept in the hot cache.
    pub hot_capacity: usize,
    /// Number of distinct keys the membership filter is sized for.
    pub filter_expected_items: usize,
    /// Target false-positive rate at `filter_expected_items`.
    pub filter_fp_rate: f64,
    /// Upper bound on a single backing-store round trip.
    pub store_timeout: Duration,
    /// Wall-clock budget for a filter preload.
    pub preload_budget: Duration,
    /// Let callers queued behind an in-flight fetch re-check memory instead
    /// of fetching again. Store calls for one key are serialized either way.
    pub coalesce_fetches: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            hot_capacity: 1024,
            filter_expected_items: 100_000,
            filter_fp_rate: 0.01,
            store_timeout: Duration::from_secs(5),
            preload_budget: Duration::from_millis(250),
            coalesce_fetches: true,
        }
    }
}

impl CascadeConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hot cache capacity.
    pub fn with_hot_capacity(mut self, capacity: usize) -> Self {
        self.hot_capacity = capacity;
        self
    }

    /// Size the membership filter.
    pub fn with_filter(mut self, expected_items: usize, fp_rate: f64) -> Self {
        self.filter_expected_items = expected_items;
        self.filter_fp_rate = fp_rate;
        self
    }

    /// Set the store round-trip timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the preload budget.
    pub fn with_preload_budget(mut self, budget: Duration) -> Self {
        self.preload_budget = budget;
        self
    }

    /// Enable or disable fetch coalescing.
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_fetches = enabled;
        self
    }

    /// Bit count the membership filter will be sized to.
    ///
    /// `m = ceil(-n ln p / (ln 2)^2)`. Saturates instead of overflowing.
    pub fn filter_bits(&self) -> u64 {
        let n = self.filter_expected_items.max(1) as f64;
        (-n * self.filter_fp_rate.ln() / (LN_2 * LN_2)).ceil() as u64
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CAIRN_HOT_CAPACITY` (default: 1024)
    /// - `CAIRN_FILTER_EXPECTED_ITEMS` (default: 100000)
    /// - `CAIRN_FILTER_FP_RATE` (default: 0.01)
    /// - `CAIRN_STORE_TIMEOUT_MS` (default: 5000)
    /// - `CAIRN_PRELOAD_BUDGET_MS` (default: 250)
    /// - `CAIRN_COALESCE_FETCHES` (default: true)
    ///
    /// Unparseable values fall back to the default; call [`validate`](Self::validate)
    /// afterwards to reject out-of-range ones.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            hot_capacity: std::env::var("CAIRN_HOT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.hot_capacity),
            filter_expected_items: std::env::var("CAIRN_FILTER_EXPECTED_ITEMS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.filter_expected_items),
            filter_fp_rate: std::env::var("CAIRN_FILTER_FP_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.filter_fp_rate),
            store_timeout: std::env::var("CAIRN_STORE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            preload_budget: std::env::var("CAIRN_PRELOAD_BUDGET_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.preload_budget),
            coalesce_fetches: std::env::var("CAIRN_COALESCE_FETCHES")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.coalesce_fetches),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - hot_capacity > 0
    /// - filter_expected_items > 0
    /// - filter_fp_rate strictly between 0.0 and 1.0
    /// - the resulting filter fits in [`MAX_FILTER_BITS`]
    /// - store_timeout is positive
    pub fn validate(&self) -> CairnResult<()> {
        if self.hot_capacity == 0 {
            return Err(invalid(
                "hot_capacity",
                self.hot_capacity.to_string(),
                "hot_capacity must be greater than 0",
            ));
        }

        if self.filter_expected_items == 0 {
            return Err(invalid(
                "filter_expected_items",
                self.filter_expected_items.to_string(),
                "filter_expected_items must be greater than 0",
            ));
        }

        // NaN fails both comparisons, so test the accepted range positively.
        if !(self.filter_fp_rate > 0.0 && self.filter_fp_rate < 1.0) {
            return Err(invalid(
                "filter_fp_rate",
                self.filter_fp_rate.to_string(),
                "filter_fp_rate must be between 0.0 and 1.0 (exclusive)",
            ));
        }

        let bits = self.filter_bits();
        if bits > MAX_FILTER_BITS {
            return Err(invalid(
                "filter_expected_items",
                self.filter_expected_items.to_string(),
                &format!(
                    "filter would need {} bits at fp_rate {}, limit is {}",
                    bits, self.filter_fp_rate, MAX_FILTER_BITS
                ),
            ));
        }

        if self.store_timeout.is_zero() {
            return Err(invalid(
                "store_timeout",
                format!("{:?}", self.store_timeout),
                "store_timeout must be positive",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: String, reason: &str) -> CairnError {
    CairnError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    })
}
