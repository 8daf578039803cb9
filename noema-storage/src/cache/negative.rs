//! ABOUTME: Negative cache: short-TTL set of ids proven absent (§4.B)

use dashmap::DashMap;
use noema_core::NounId;
use std::time::{Duration, Instant};

/// Suppresses repeated storage misses during scans by remembering, for a
/// short TTL, ids that were confirmed absent.
pub struct NegativeCache {
    capacity: usize,
    ttl: Duration,
    entries: DashMap<NounId, Instant>,
}

impl NegativeCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn contains(&self, id: &NounId) -> bool {
        match self.entries.get(id) {
            Some(inserted_at) if inserted_at.elapsed() < self.ttl => true,
            Some(_) => {
                drop(self.entries.remove(id));
                false
            }
            None => false,
        }
    }

    pub fn insert(&self, id: NounId) {
        if self.entries.len() >= self.capacity {
            // Evict an arbitrary expired-or-oldest entry to bound memory;
            // exact LRU ordering doesn't matter for a short-TTL set.
            if let Some(stale) = self
                .entries
                .iter()
                .find(|e| e.value().elapsed() >= self.ttl)
                .map(|e| e.key().clone())
            {
                self.entries.remove(&stale);
            } else if let Some(any) = self.entries.iter().next().map(|e| e.key().clone()) {
                self.entries.remove(&any);
            }
        }
        self.entries.insert(id, Instant::now());
    }

    pub fn remove(&self, id: &NounId) {
        self.entries.remove(id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
