//! ABOUTME: Warm tier: bounded LRU of serialized blobs evicted from hot (§4.B)

use dashmap::DashMap;
use noema_core::NounId;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Pure byte cache: used when an entity is evicted from hot but was
/// recently touched, saving a storage round-trip at the cost of a
/// deserialization.
pub struct WarmCache {
    capacity: usize,
    entries: DashMap<NounId, Vec<u8>>,
    order: Mutex<VecDeque<NounId>>,
}

impl WarmCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn get(&self, id: &NounId) -> Option<Vec<u8>> {
        let hit = self.entries.get(id).map(|e| e.value().clone());
        if hit.is_some() {
            self.touch(id);
        }
        hit
    }

    pub fn put(&self, id: NounId, bytes: Vec<u8>) {
        self.entries.insert(id.clone(), bytes);
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
