//! ABOUTME: Hot tier: bounded LRU of deserialized nouns keyed by id (§4.B)

use dashmap::DashMap;
use noema_core::{Noun, NounId};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded least-recently-used cache of deserialized [`Noun`]s.
///
/// Capacity is auto-tuned from the memory budget at construction time
/// (`CacheSizing::from_budget`); eviction order is tracked with a simple
/// access-order deque rather than an intrusive list, trading a little
/// eviction precision for a much smaller implementation.
pub struct HotCache {
    capacity: usize,
    entries: DashMap<NounId, Noun>,
    order: Mutex<VecDeque<NounId>>,
}

impl HotCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn get(&self, id: &NounId) -> Option<Noun> {
        let hit = self.entries.get(id).map(|e| e.value().clone());
        if hit.is_some() {
            self.touch(id);
        }
        hit
    }

    pub fn put(&self, id: NounId, noun: Noun) {
        self.entries.insert(id.clone(), noun);
        self.touch(&id);
        self.evict_if_needed();
    }

    pub fn remove(&self, id: &NounId) {
        self.entries.remove(id);
        self.order.lock().retain(|x| x != id);
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.order.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&self, id: &NounId) {
        let mut order = self.order.lock();
        order.retain(|x| x != id);
        order.push_back(id.clone());
    }

    fn evict_if_needed(&self) {
        let mut order = self.order.lock();
        while order.len() > self.capacity {
            if let Some(victim) = order.pop_front() {
                self.entries.remove(&victim);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_drops_least_recently_used() {
        let cache = HotCache::new(2);
        cache.put(NounId::from("a"), Noun::new(NounId::from("a"), vec![0.0]));
        cache.put(NounId::from("b"), Noun::new(NounId::from("b"), vec![0.0]));
        // touch "a" so "b" becomes the LRU victim
        cache.get(&NounId::from("a"));
        cache.put(NounId::from("c"), Noun::new(NounId::from("c"), vec![0.0]));
        assert!(cache.get(&NounId::from("b")).is_none());
        assert!(cache.get(&NounId::from("a")).is_some());
        assert!(cache.get(&NounId::from("c")).is_some());
    }
}
