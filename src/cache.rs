//! Bounded, bidirectional cache of patch results.
//!
//! Every successful application of a patch `P` that turns `A` into `B` is
//! stored twice: `(A, P, forwards) -> B` and `(B, P, reverse) -> A`, so
//! undoing a patch that was just applied never reaches the patch backend.
//!
//! The cache is capped (100 entries by default). When storing a pair would
//! overflow it, a random quarter of the entries (at least 2) is dropped first.

use rand::{seq::IteratorRandom, thread_rng};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use xxhash_rust::xxh3::{xxh3_64, xxh3_64_with_seed};

/// Default number of entries kept before eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 100;

/// Raised by [`PatchCache::retrieve`] when no result is cached.
///
/// Callers treat this as a fallthrough to the backend, never as a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no cached result for this source and patch")]
pub struct CacheMiss;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    digest: u64,
    source: String,
    patch: String,
    forwards: bool,
}

impl CacheKey {
    fn new(source: &str, patch: &str, forwards: bool) -> Self {
        let digest = xxh3_64_with_seed(patch.as_bytes(), xxh3_64(source.as_bytes()));
        Self {
            digest,
            source: source.to_string(),
            patch: patch.to_string(),
            forwards,
        }
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
        self.forwards.hash(state);
    }
}

/// Patch result cache keyed on `(source, patch, direction)`.
#[derive(Debug)]
pub struct PatchCache {
    entries: HashMap<CacheKey, String>,
    capacity: usize,
}

impl Default for PatchCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl PatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache holding at most `capacity` entries (never fewer than 2,
    /// since every store inserts a pair).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(2),
        }
    }

    /// Look up the result of applying `patch` to `source` in the given direction.
    pub fn retrieve(&self, source: &str, patch: &str, forwards: bool) -> Result<String, CacheMiss> {
        self.entries
            .get(&CacheKey::new(source, patch, forwards))
            .cloned()
            .ok_or(CacheMiss)
    }

    /// Record that applying `patch` to `source` in direction `forwards` gave
    /// `result`, together with the inverse mapping.
    pub fn store(&mut self, source: &str, patch: &str, forwards: bool, result: &str) {
        if self.entries.len() + 2 > self.capacity {
            self.cull();
        }
        self.entries
            .insert(CacheKey::new(source, patch, forwards), result.to_string());
        self.entries
            .insert(CacheKey::new(result, patch, !forwards), source.to_string());
    }

    fn cull(&mut self) {
        let count = (self.entries.len() / 4).max(2).min(self.entries.len());
        let victims: Vec<CacheKey> = self
            .entries
            .keys()
            .choose_multiple(&mut thread_rng(), count)
            .into_iter()
            .cloned()
            .collect();
        for key in &victims {
            self.entries.remove(key);
        }
        tracing::debug!(evicted = victims.len(), remaining = self.entries.len(), "patch cache culled");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
