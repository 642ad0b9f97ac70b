//! Lookup statistics.
//!
//! Counters are owned by one coordinator and mutated under its state lock.
//! Readers only ever see an immutable [`LookupStatsSnapshot`].

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::lookup::Tier;

/// Mutable counters, updated inside the coordinator's critical sections.
#[derive(Debug, Clone, Default)]
pub(crate) struct LookupStats {
    pub total_lookups: u64,
    pub hot_hits: u64,
    pub negative_hits: u64,
    pub sieve_hits: u64,
    pub filter_negatives: u64,
    pub filter_positives: u64,
    pub store_fetches: u64,
    pub store_failures: u64,
    pub false_positives: u64,
    pub not_found: u64,
    pub coalesced_waits: u64,
    pub evictions: u64,
    pub invalid_keys: u64,
    pub adds: u64,
    pub total_latency: Duration,
}

impl LookupStats {
    /// Close out one lookup that resolved at `tier`.
    pub fn resolved(&mut self, tier: Tier, found: bool, started: Instant) {
        match tier {
            Tier::Hot => self.hot_hits += 1,
            Tier::Negative => self.negative_hits += 1,
            Tier::Filter => self.filter_negatives += 1,
            // Store-backed tiers are counted when the fetch settles.
            Tier::Sieve | Tier::Store => {}
        }
        if !found {
            self.not_found += 1;
        }
        self.finish(started);
    }

    /// Close out one lookup, whatever its outcome.
    pub fn finish(&mut self, started: Instant) {
        self.total_lookups += 1;
        self.total_latency += started.elapsed();
    }
}

/// Point-in-time view of coordinator statistics.
///
/// Field names are stable; dashboards consume the JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupStatsSnapshot {
    /// Lookups resolved (found, not found, or failed).
    pub total_lookups: u64,
    pub hot_hits: u64,
    pub negative_hits: u64,
    pub sieve_hits: u64,
    /// Keys the membership filter ruled out without a store call.
    pub filter_negatives: u64,
    /// Uncertain filter positives that went to the store.
    pub filter_positives: u64,
    pub store_fetches: u64,
    pub store_failures: u64,
    /// Filter positives the store then reported absent.
    pub false_positives: u64,
    pub not_found: u64,
    /// Callers that waited on another caller's in-flight fetch.
    pub coalesced_waits: u64,
    /// Records pushed out of the hot cache.
    pub evictions: u64,
    pub invalid_keys: u64,
    pub adds: u64,
    pub total_latency_us: u64,
    pub average_latency_us: f64,
    pub hot_size: usize,
    pub hot_capacity: usize,
    pub sieve_size: usize,
    pub negative_size: usize,
    pub filter_items: usize,
    pub filter_bits: u64,
    pub filter_hashes: u32,
    pub filter_estimated_fp_rate: f64,
}

/// Sizes of the in-memory tiers at snapshot time.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TierSizes {
    pub hot_size: usize,
    pub hot_capacity: usize,
    pub sieve_size: usize,
    pub negative_size: usize,
    pub filter_items: usize,
    pub filter_bits: u64,
    pub filter_hashes: u32,
    pub filter_estimated_fp_rate: f64,
}

impl LookupStatsSnapshot {
    pub(crate) fn capture(stats: &LookupStats, sizes: TierSizes) -> Self {
        let total_latency_us = stats.total_latency.as_micros() as u64;
        let average_latency_us = if stats.total_lookups == 0 {
            0.0
        } else {
            total_latency_us as f64 / stats.total_lookups as f64
        };
        Self {
            total_lookups: stats.total_lookups,
            hot_hits: stats.hot_hits,
            negative_hits: stats.negative_hits,
            sieve_hits: stats.sieve_hits,
            filter_negatives: stats.filter_negatives,
            filter_positives: stats.filter_positives,
            store_fetches: stats.store_fetches,
            store_failures: stats.store_failures,
            false_positives: stats.false_positives,
            not_found: stats.not_found,
            coalesced_waits: stats.coalesced_waits,
            evictions: stats.evictions,
            invalid_keys: stats.invalid_keys,
            adds: stats.adds,
            total_latency_us,
            average_latency_us,
            hot_size: sizes.hot_size,
            hot_capacity: sizes.hot_capacity,
            sieve_size: sizes.sieve_size,
            negative_size: sizes.negative_size,
            filter_items: sizes.filter_items,
            filter_bits: sizes.filter_bits,
            filter_hashes: sizes.filter_hashes,
            filter_estimated_fp_rate: sizes.filter_estimated_fp_rate,
        }
    }

    /// Share of lookups answered without a store round trip (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        let in_memory = self.hot_hits + self.negative_hits + self.filter_negatives;
        if self.total_lookups == 0 {
            0.0
        } else {
            in_memory as f64 / self.total_lookups as f64
        }
    }

    /// Observed filter false-positive share among store-checked positives.
    pub fn observed_false_positive_rate(&self) -> f64 {
        if self.filter_positives == 0 {
            0.0
        } else {
            self.false_positives as f64 / self.filter_positives as f64
        }
    }

    /// Average lookup latency.
    pub fn average_latency(&self) -> Duration {
        Duration::from_nanos((self.average_latency_us * 1_000.0) as u64)
    }

    /// Serialize to the JSON shape exported to dashboards.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
