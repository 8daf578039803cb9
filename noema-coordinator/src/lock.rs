//! ABOUTME: Distributed write-lock protocol over shared storage (§4.F)

use noema_core::{Error, Lock, Result, StorageAdapter};
use noema_storage::keys;
use std::sync::Arc;

/// Acquires and refreshes the per-partition write-lock a writer holds
/// for as long as it owns that partition (§4.F "Distributed lock
/// protocol"). Not `Clone`: one `LockManager` per instance.
pub struct LockManager {
    storage: Arc<dyn StorageAdapter>,
    owner: String,
    ttl_ms: u64,
}

impl LockManager {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, owner: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            storage,
            owner: owner.into(),
            ttl_ms,
        }
    }

    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    fn key(&self, partition: u32) -> String {
        keys::lock(&format!("partition-{partition}"))
    }

    /// Attempt to acquire the lock for `partition`. Reclaims a stale
    /// lock (expired TTL) by deleting then retrying once, losing
    /// peacefully if another writer wins the race.
    pub async fn acquire(&self, partition: u32) -> Result<bool> {
        let key = self.key(partition);
        let lock = Lock::new(&self.owner, self.ttl_ms);
        if self.storage.put_if_absent(&key, serde_json::to_vec(&lock)?).await? {
            return Ok(true);
        }

        match self.storage.get(&key).await? {
            Some(existing) => {
                let existing: Lock = serde_json::from_slice(&existing)?;
                if !existing.is_stale() {
                    return Ok(false);
                }
                self.storage.delete(&key).await?;
                Ok(self
                    .storage
                    .put_if_absent(&key, serde_json::to_vec(&lock)?)
                    .await?)
            }
            None => Ok(self
                .storage
                .put_if_absent(&key, serde_json::to_vec(&lock)?)
                .await?),
        }
    }

    /// Overwrite the lock with a fresh TTL. Only valid if this instance
    /// is the current owner — call at `ttl/3` intervals (§4.F step 3).
    pub async fn refresh(&self, partition: u32) -> Result<()> {
        let key = self.key(partition);
        match self.storage.get(&key).await? {
            Some(existing) => {
                let existing: Lock = serde_json::from_slice(&existing)?;
                if existing.owner != self.owner {
                    return Err(Error::Conflict(format!(
                        "partition {partition} lock is held by {}, not {}",
                        existing.owner, self.owner
                    )));
                }
            }
            None => {
                return Err(Error::NotFound(format!("no lock held for partition {partition}")));
            }
        }
        let lock = Lock::new(&self.owner, self.ttl_ms);
        self.storage.put(&key, serde_json::to_vec(&lock)?).await
    }

    /// Release the lock. A departing writer calls this after finalizing
    /// in-flight writes during rebalance (§4.F).
    pub async fn release(&self, partition: u32) -> Result<()> {
        let key = self.key(partition);
        if let Some(existing) = self.storage.get(&key).await? {
            let existing: Lock = serde_json::from_slice(&existing)?;
            if existing.owner == self.owner {
                self.storage.delete(&key).await?;
            }
        }
        Ok(())
    }
}
