//! Membership filter (Bloom filter) over function keys.
//!
//! Answers "was this key ever added?" with no false negatives and a tunable
//! false-positive rate. Bits are only ever set; the filter is monotonic for
//! its whole lifetime and can only be emptied by building a new one.

use std::f64::consts::LN_2;

use cairn_core::MAX_FILTER_BITS;
use sha2::{Digest, Sha256};

/// Smallest bit array the filter will allocate.
const MIN_BITS: u64 = 64;

/// Upper bound on hash functions; beyond this the hashing cost dominates.
const MAX_HASHES: u32 = 32;

/// Fixed-size probabilistic set.
///
/// Each of the `k` hash functions is SHA-256 over a 4-byte little-endian seed
/// followed by the item bytes, so the functions are independent without a
/// dedicated hash family.
///
/// # Capacity
///
/// Sizing is fixed at construction. Adding more than `capacity` distinct
/// items keeps the no-false-negative guarantee but pushes the
/// false-positive rate past its target; [`is_over_capacity`](Self::is_over_capacity)
/// reports when that has happened. The fix is a rebuild from the
/// authoritative store, never a resize.
#[derive(Debug, Clone)]
pub struct MembershipFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    /// Adds that set at least one new bit (distinct-insert estimate).
    items: usize,
    capacity: usize,
    target_fp_rate: f64,
}

impl MembershipFilter {
    /// Size a filter for `expected_items` at `fp_rate`.
    ///
    /// `expected_items` is clamped to at least 1 and `fp_rate` into
    /// `[1e-9, 0.5]`.
    pub fn new(expected_items: usize, fp_rate: f64) -> Self {
        let capacity = expected_items.max(1);
        let fp_rate = if fp_rate.is_nan() {
            0.01
        } else {
            fp_rate.clamp(1e-9, 0.5)
        };
        let (num_bits, num_hashes) = Self::optimal_params(capacity, fp_rate);
        let mut filter = Self::with_params(num_bits, num_hashes);
        filter.capacity = capacity;
        filter.target_fp_rate = fp_rate;
        filter
    }

    /// Build a filter with explicit `m` (bits) and `k` (hash count).
    ///
    /// `num_bits` is clamped into `[64, MAX_FILTER_BITS]`.
    pub fn with_params(num_bits: u64, num_hashes: u32) -> Self {
        let num_bits = num_bits.clamp(MIN_BITS, MAX_FILTER_BITS);
        let num_hashes = num_hashes.clamp(1, MAX_HASHES);
        let words = num_bits.div_ceil(64) as usize;
        // Design capacity implied by m and k for an optimally-loaded filter.
        let capacity = ((num_bits as f64 * LN_2) / num_hashes as f64).floor().max(1.0) as usize;
        let target_fp_rate = 0.5f64.powi(num_hashes as i32);
        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes,
            items: 0,
            capacity,
            target_fp_rate,
        }
    }

    /// Optimal `(m, k)` for `n` items at false-positive rate `p`.
    ///
    /// `m = ceil(-n ln p / (ln 2)^2)`, `k = round(m / n * ln 2)`.
    pub fn optimal_params(n: usize, p: f64) -> (u64, u32) {
        let n = n.max(1) as f64;
        let m = (-n * p.ln() / (LN_2 * LN_2)).ceil().max(MIN_BITS as f64);
        let k = ((m / n) * LN_2).round().clamp(1.0, MAX_HASHES as f64);
        (m as u64, k as u32)
    }

    fn bit_index(&self, seed: u32, item: &[u8]) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        hasher.update(item);
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(prefix) % self.num_bits
    }

    /// Mark `item` as possibly present. Idempotent, O(k).
    ///
    /// Returns true if any bit flipped, i.e. the item was definitely new.
    pub fn add(&mut self, item: impl AsRef<[u8]>) -> bool {
        let item = item.as_ref();
        let mut flipped = false;
        for seed in 0..self.num_hashes {
            let idx = self.bit_index(seed, item);
            let (word, mask) = ((idx / 64) as usize, 1u64 << (idx % 64));
            if self.bits[word] & mask == 0 {
                self.bits[word] |= mask;
                flipped = true;
            }
        }
        if flipped {
            self.items += 1;
        }
        flipped
    }

    /// `false` only if `item` was never added.
    pub fn might_contain(&self, item: impl AsRef<[u8]>) -> bool {
        let item = item.as_ref();
        (0..self.num_hashes).all(|seed| {
            let idx = self.bit_index(seed, item);
            self.bits[(idx / 64) as usize] & (1u64 << (idx % 64)) != 0
        })
    }

    /// Expected false-positive rate at the current load:
    /// `(1 - e^(-k n / m))^k`.
    pub fn estimate_false_positive_rate(&self) -> f64 {
        if self.items == 0 {
            return 0.0;
        }
        let k = self.num_hashes as f64;
        let exponent = -k * self.items as f64 / self.num_bits as f64;
        (1.0 - exponent.exp()).powf(k)
    }

    /// Estimated number of distinct items added.
    pub fn len(&self) -> usize {
        self.items
    }

    /// Returns true if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    /// Size of the bit array (`m`).
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of hash functions (`k`).
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Number of items the filter was sized for.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// False-positive rate the filter was sized for.
    pub fn target_fp_rate(&self) -> f64 {
        self.target_fp_rate
    }

    /// True once more distinct items were added than the filter was sized for.
    pub fn is_over_capacity(&self) -> bool {
        self.items > self.capacity
    }

    /// Number of set bits.
    pub fn bits_set(&self) -> u64 {
        self.bits.iter().map(|w| w.count_ones() as u64).sum()
    }
}
