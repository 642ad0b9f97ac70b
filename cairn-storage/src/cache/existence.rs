//! Authoritative existence facts.
//!
//! Two sets of keys already resolved against the backing store: the sieve
//! (confirmed present) and the negative set (confirmed absent). They are
//! disjoint at every observable point. Both grow without bound until
//! cleared.

use std::collections::HashSet;
use std::hash::Hash;

/// What the existence sets know about a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Existence {
    /// Confirmed present (sieve).
    Present,
    /// Confirmed absent (negative).
    Absent,
}

/// Confirmed-present and confirmed-absent key sets.
#[derive(Debug, Clone)]
pub struct ExistenceSets<K> {
    sieve: HashSet<K>,
    negative: HashSet<K>,
}

impl<K> Default for ExistenceSets<K> {
    fn default() -> Self {
        Self {
            sieve: HashSet::new(),
            negative: HashSet::new(),
        }
    }
}

impl<K: Hash + Eq> ExistenceSets<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` exists. Moves it out of the negative set.
    ///
    /// Returns true if this changed what is known about the key.
    pub fn mark_present(&mut self, key: K) -> bool {
        let was_absent = self.negative.remove(&key);
        let newly_present = self.sieve.insert(key);
        was_absent || newly_present
    }

    /// Record that `key` does not exist. Moves it out of the sieve.
    ///
    /// Returns true if this changed what is known about the key.
    pub fn mark_absent(&mut self, key: K) -> bool {
        let was_present = self.sieve.remove(&key);
        let newly_absent = self.negative.insert(key);
        was_present || newly_absent
    }

    pub fn is_present(&self, key: &K) -> bool {
        self.sieve.contains(key)
    }

    pub fn is_absent(&self, key: &K) -> bool {
        self.negative.contains(key)
    }

    /// Everything known about `key`, if anything.
    pub fn lookup(&self, key: &K) -> Option<Existence> {
        if self.sieve.contains(key) {
            Some(Existence::Present)
        } else if self.negative.contains(key) {
            Some(Existence::Absent)
        } else {
            None
        }
    }

    /// Drop any fact about `key`, returning what was known.
    pub fn forget(&mut self, key: &K) -> Option<Existence> {
        if self.sieve.remove(key) {
            Some(Existence::Present)
        } else if self.negative.remove(key) {
            Some(Existence::Absent)
        } else {
            None
        }
    }

    /// Drop a confirmed absence for `key`, leaving a confirmed presence alone.
    pub fn forget_absent(&mut self, key: &K) -> bool {
        self.negative.remove(key)
    }

    /// Keys confirmed present.
    pub fn present_keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.sieve.iter()
    }

    pub fn sieve_len(&self) -> usize {
        self.sieve.len()
    }

    pub fn negative_len(&self) -> usize {
        self.negative.len()
    }

    /// Empty both sets.
    pub fn clear(&mut self) {
        self.sieve.clear();
        self.negative.clear();
    }

    /// True when no key is in both sets.
    pub fn is_disjoint(&self) -> bool {
        self.sieve.is_disjoint(&self.negative)
    }
}
