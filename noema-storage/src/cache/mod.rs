//! ABOUTME: Three-tier cache sitting between the index/graph layers and storage (§4.B)
//! ABOUTME: Hot (deserialized LRU), warm (serialized-blob LRU), negative (short-TTL absent set)

mod hot;
mod negative;
mod warm;

pub use hot::HotCache;
pub use negative::NegativeCache;
pub use warm::WarmCache;

use crate::keys;
use noema_core::{Noun, NounId, Result, StorageAdapter};
use std::sync::Arc;
use std::time::Duration;

/// Mode-specific sizing, per §4.B "Mode-specific strategy".
#[derive(Debug, Clone, Copy)]
pub struct CacheSizing {
    pub hot_capacity: usize,
    pub warm_capacity: usize,
}

impl CacheSizing {
    /// Derive hot/warm capacities from a memory budget, following §5's
    /// role-weighted split: 80% read-only, 20% write-only, 50% hybrid of
    /// the budget goes to the hot cache; the remainder informs warm.
    #[must_use]
    pub fn from_budget(budget_bytes: u64, role: noema_core::Role, avg_entity_bytes: u64) -> Self {
        let hot_fraction = match role {
            noema_core::Role::Reader => 0.8,
            noema_core::Role::Writer => 0.2,
            noema_core::Role::Hybrid => 0.5,
        };
        let avg = avg_entity_bytes.max(1);
        let hot_capacity = ((budget_bytes as f64 * hot_fraction) / avg as f64) as usize;
        let warm_capacity = ((budget_bytes as f64 * (1.0 - hot_fraction) * 0.5) / avg as f64) as usize;
        Self {
            hot_capacity: hot_capacity.max(16),
            warm_capacity: warm_capacity.max(16),
        }
    }
}

/// The cache tier wraps a [`StorageAdapter`] and is the single path the
/// HNSW and graph layers use to resolve a [`NounId`] into a [`Noun`].
pub struct CacheTier {
    storage: Arc<dyn StorageAdapter>,
    hot: HotCache,
    warm: WarmCache,
    negative: NegativeCache,
}

impl CacheTier {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, sizing: CacheSizing) -> Self {
        Self {
            storage,
            hot: HotCache::new(sizing.hot_capacity),
            warm: WarmCache::new(sizing.warm_capacity),
            negative: NegativeCache::new(256, Duration::from_secs(5)),
        }
    }

    /// Resolve a noun: hot → warm (deserialize) → storage, filling each
    /// tier it misses along the way (§4.B "Reads fill hot"). A blob that
    /// fails to deserialize is treated as `Corruption` (§7): it's moved
    /// under `/_quarantine/`, logged, and the lookup resolves to absent
    /// instead of surfacing the deserialize error.
    pub async fn get_noun(&self, id: &NounId) -> Result<Option<Noun>> {
        if let Some(noun) = self.hot.get(id) {
            return Ok(Some(noun));
        }
        if self.negative.contains(id) {
            return Ok(None);
        }
        let key = keys::noun(id.as_str());
        if let Some(bytes) = self.warm.get(id) {
            match serde_json::from_slice::<Noun>(&bytes) {
                Ok(noun) => {
                    self.hot.put(id.clone(), noun.clone());
                    return Ok(Some(noun));
                }
                Err(err) => {
                    self.warm.remove(id);
                    self.quarantine(&key, bytes, &err).await?;
                    self.negative.insert(id.clone());
                    return Ok(None);
                }
            }
        }
        match self.storage.get(&key).await? {
            Some(bytes) => match serde_json::from_slice::<Noun>(&bytes) {
                Ok(noun) => {
                    self.warm.put(id.clone(), bytes);
                    self.hot.put(id.clone(), noun.clone());
                    Ok(Some(noun))
                }
                Err(err) => {
                    self.quarantine(&key, bytes, &err).await?;
                    self.negative.insert(id.clone());
                    Ok(None)
                }
            },
            None => {
                self.negative.insert(id.clone());
                Ok(None)
            }
        }
    }

    /// Log and relocate a corrupt blob under `/_quarantine/`, then remove
    /// it from its original key so the operation can return absent and
    /// the engine keeps going (§7 "Corruption").
    async fn quarantine(&self, key: &str, bytes: Vec<u8>, reason: impl std::fmt::Display) -> Result<()> {
        tracing::warn!(entity = key, %reason, "entity failed to deserialize, quarantining");
        self.storage.put(&keys::quarantine(key), bytes).await?;
        self.storage.delete(key).await?;
        Ok(())
    }

    /// Write-through: storage is updated first, and only on success does
    /// the hot cache observe the new value (§4.B "Writes are
    /// write-through").
    pub async fn put_noun(&self, noun: &Noun) -> Result<()> {
        let key = keys::noun(noun.id.as_str());
        let bytes = serde_json::to_vec(noun)?;
        self.storage.put(&key, bytes.clone()).await?;
        self.negative.remove(&noun.id);
        self.warm.put(noun.id.clone(), bytes);
        self.hot.put(noun.id.clone(), noun.clone());
        Ok(())
    }

    pub async fn invalidate(&self, id: &NounId) {
        self.hot.remove(id);
        self.warm.remove(id);
    }

    /// Invalidate everything; called on manifest-version advance when a
    /// remote write is observed (§4.B "Invalidation").
    pub fn invalidate_all(&self) {
        self.hot.clear();
        self.warm.clear();
        self.negative.clear();
    }

    /// Fraction of hot-cache capacity currently occupied, sampled by the
    /// facade to decide whether to throttle `ef_search` (§5 "memory
    /// budget").
    #[must_use]
    pub fn hot_fill_ratio(&self) -> f32 {
        self.hot.len() as f32 / self.hot.capacity() as f32
    }

    /// Issue background loads for upcoming HNSW neighbor fetches so graph
    /// descent doesn't stall on cache misses (§4.B "Prefetcher").
    pub async fn prefetch(&self, ids: &[NounId]) {
        for id in ids {
            if self.hot.get(id).is_none() && !self.negative.contains(id) {
                let _ = self.get_noun(id).await;
            }
        }
    }
}
