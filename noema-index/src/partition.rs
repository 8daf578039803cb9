//! ABOUTME: Consistent-hash partition assignment and per-partition entry-point/member bookkeeping (§4.D)

use noema_core::{NounId, Result, StorageAdapter};
use noema_storage::keys;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Deterministically assign a noun id to one of `partition_count` buckets
/// by hashing it; every instance that knows `partition_count` computes
/// the same assignment without coordination.
#[must_use]
pub fn partition_for(id: &NounId, partition_count: u32) -> u32 {
    if partition_count <= 1 {
        return 0;
    }
    let digest = Sha256::digest(id.as_str().as_bytes());
    let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    bucket % partition_count
}

/// Per-partition mutable state: the HNSW entry point and the set of
/// member ids (needed to promote a new entry point on delete, and to
/// support a broadcast search that enumerates partitions).
pub struct Partition {
    pub id: u32,
    storage: Arc<dyn StorageAdapter>,
    entry_point: RwLock<Option<NounId>>,
    members: RwLock<Vec<NounId>>,
}

impl Partition {
    pub async fn load(storage: Arc<dyn StorageAdapter>, id: u32) -> Result<Self> {
        let entry_point = match storage.get(&Self::entry_key(id)).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => None,
        };
        let members = match storage.get(&Self::members_key(id)).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => Vec::new(),
        };
        Ok(Self {
            id,
            storage,
            entry_point: RwLock::new(entry_point),
            members: RwLock::new(members),
        })
    }

    fn entry_key(id: u32) -> String {
        keys::index_shard(id, "entry.json")
    }

    fn members_key(id: u32) -> String {
        keys::index_shard(id, "members.json")
    }

    pub async fn entry_point(&self) -> Option<NounId> {
        self.entry_point.read().await.clone()
    }

    pub async fn set_entry_point(&self, id: Option<NounId>) -> Result<()> {
        *self.entry_point.write().await = id.clone();
        self.storage
            .put(&Self::entry_key(self.id), serde_json::to_vec(&id)?)
            .await
    }

    pub async fn members(&self) -> Vec<NounId> {
        self.members.read().await.clone()
    }

    pub async fn add_member(&self, id: NounId) -> Result<()> {
        let mut members = self.members.write().await;
        if !members.contains(&id) {
            members.push(id);
            self.storage
                .put(&Self::members_key(self.id), serde_json::to_vec(&*members)?)
                .await?;
        }
        Ok(())
    }

    pub async fn remove_member(&self, id: &NounId) -> Result<()> {
        let mut members = self.members.write().await;
        let before = members.len();
        members.retain(|m| m != id);
        if members.len() != before {
            self.storage
                .put(&Self::members_key(self.id), serde_json::to_vec(&*members)?)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_for_is_deterministic() {
        let id = NounId::from("abc");
        assert_eq!(partition_for(&id, 8), partition_for(&id, 8));
    }

    #[test]
    fn single_partition_always_zero() {
        assert_eq!(partition_for(&NounId::from("x"), 1), 0);
    }
}
