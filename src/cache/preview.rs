use std::collections::{HashMap, VecDeque};

use crate::cache::fingerprint::{CacheKey, Fingerprint};
use crate::cache::store::{ArtifactStore, CacheEntry};
use crate::foundation::core::Tier;

/// Default per-tier capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// In-memory, least-recently-used artifact cache with one partition per tier.
///
/// A lookup in one tier never sees entries of the other. Hits only refresh recency; stored
/// entries are never modified.
#[derive(Debug)]
pub struct PreviewCache {
    capacity: usize,
    preview: TierLru,
    full: TierLru,
}

#[derive(Debug, Default)]
struct TierLru {
    entries: HashMap<Fingerprint, CacheEntry>,
    lru: VecDeque<Fingerprint>,
}

impl TierLru {
    fn touch(&mut self, fp: Fingerprint) {
        if let Some(pos) = self.lru.iter().position(|x| *x == fp) {
            self.lru.remove(pos);
        }
        self.lru.push_back(fp);
    }

    fn insert(&mut self, entry: CacheEntry, capacity: usize) -> Vec<CacheEntry> {
        let fp = entry.key.fingerprint;
        self.entries.insert(fp, entry);
        self.touch(fp);
        let mut evicted = Vec::new();
        while self.lru.len() > capacity {
            if let Some(old) = self.lru.pop_front()
                && let Some(e) = self.entries.remove(&old)
            {
                evicted.push(e);
            }
        }
        evicted
    }
}

impl PreviewCache {
    /// Cache holding at most `capacity_per_tier` entries in each tier (minimum 1).
    pub fn new(capacity_per_tier: usize) -> Self {
        Self {
            capacity: capacity_per_tier.max(1),
            preview: TierLru::default(),
            full: TierLru::default(),
        }
    }

    /// Per-tier capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries stored for `tier`.
    pub fn len(&self, tier: Tier) -> usize {
        self.lane(tier).entries.len()
    }

    /// `true` if neither tier holds anything.
    pub fn is_empty(&self) -> bool {
        self.preview.entries.is_empty() && self.full.entries.is_empty()
    }

    /// Look up `key` and mark it most recently used.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let lane = self.lane_mut(key.tier);
        let hit = lane.entries.get(&key.fingerprint).cloned()?;
        lane.touch(key.fingerprint);
        Some(hit)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.lane(key.tier).entries.get(&key.fingerprint)
    }

    /// Store `entry` (replacing any entry with the same key) and return what was evicted.
    pub fn insert(&mut self, entry: CacheEntry) -> Vec<CacheEntry> {
        let capacity = self.capacity;
        let evicted = self.lane_mut(entry.key.tier).insert(entry, capacity);
        for e in &evicted {
            tracing::trace!(key = %e.key, "cache eviction");
        }
        evicted
    }

    /// Drop every entry of every tier.
    pub fn clear(&mut self) {
        self.preview = TierLru::default();
        self.full = TierLru::default();
    }

    fn lane(&self, tier: Tier) -> &TierLru {
        match tier {
            Tier::Preview => &self.preview,
            Tier::Full => &self.full,
        }
    }

    fn lane_mut(&mut self, tier: Tier) -> &mut TierLru {
        match tier {
            Tier::Preview => &mut self.preview,
            Tier::Full => &mut self.full,
        }
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ArtifactStore for PreviewCache {
    async fn get(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.lookup(key)
    }

    async fn put(&mut self, entry: CacheEntry) {
        self.insert(entry);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/preview.rs"]
mod tests;
