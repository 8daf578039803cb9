//! ABOUTME: Ties role, lock protocol, and manifest assignment into the per-instance coordinator (§4.F)

use noema_core::{InstanceId, Manifest, Result, Role, StorageAdapter};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::lock::LockManager;
use crate::manifest::ManifestStore;
use crate::ring::assign_partitions;

const DEFAULT_LOCK_TTL_MS: u64 = 15_000;

/// One per running instance. Reader instances never touch `lock_manager`
/// or `owned_partitions`; writer and hybrid instances use them to
/// acquire and refresh partition locks as assignment changes.
pub struct Coordinator {
    instance_id: InstanceId,
    role: Role,
    manifest: Arc<ManifestStore>,
    lock_manager: LockManager,
    owned_partitions: RwLock<HashSet<u32>>,
}

impl Coordinator {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, instance_id: InstanceId, role: Role) -> Self {
        let lock_manager = LockManager::new(storage.clone(), instance_id.to_string(), DEFAULT_LOCK_TTL_MS);
        Self {
            instance_id,
            role,
            manifest: Arc::new(ManifestStore::new(storage)),
            lock_manager,
            owned_partitions: RwLock::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    #[must_use]
    pub fn owns(&self, partition: u32) -> bool {
        self.owned_partitions.read().contains(&partition)
    }

    #[must_use]
    pub fn manifest_store(&self) -> Arc<ManifestStore> {
        self.manifest.clone()
    }

    #[must_use]
    pub fn lock_ttl_ms(&self) -> u64 {
        self.lock_manager.ttl_ms()
    }

    /// Acquire locks for every partition the manifest assigns to this
    /// instance and release any it no longer owns (§4.F "During
    /// rebalance, the departing writer finalizes... before the
    /// incoming writer acquires them" — callers are expected to have
    /// already quiesced in-flight writes on lost partitions before
    /// calling this).
    pub async fn reconcile_ownership(&self, manifest: &Manifest) -> Result<()> {
        if !self.role.may_write() {
            return Ok(());
        }

        let assigned: HashSet<u32> = manifest
            .assignments
            .get(self.instance_id.0.as_str())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();

        let currently_owned = self.owned_partitions.read().clone();

        for partition in currently_owned.difference(&assigned) {
            self.lock_manager.release(*partition).await?;
            info!(partition, instance = %self.instance_id, "released partition lock during rebalance");
        }

        let mut acquired = HashSet::new();
        for &partition in &assigned {
            if self.lock_manager.acquire(partition).await? {
                acquired.insert(partition);
            } else {
                warn!(partition, instance = %self.instance_id, "could not acquire assigned partition lock");
            }
        }

        *self.owned_partitions.write() = acquired;
        Ok(())
    }

    pub async fn refresh_owned_locks(&self) -> Result<()> {
        let owned: Vec<u32> = self.owned_partitions.read().iter().copied().collect();
        for partition in owned {
            self.lock_manager.refresh(partition).await?;
        }
        Ok(())
    }

    /// Recompute the consistent-hash ring from `writers` and persist it
    /// to the manifest, bumping its version (§4.F "Rebalance triggers").
    pub async fn rebalance(&self, writers: &[InstanceId]) -> Result<Manifest> {
        let assignments = assign_partitions(writers, self.partition_count().await?);
        self.manifest
            .update(|manifest| {
                manifest.assignments = assignments
                    .into_iter()
                    .fold(std::collections::BTreeMap::new(), |mut acc, (partition, owner)| {
                        acc.entry(owner.to_string()).or_insert_with(Vec::new).push(partition);
                        acc
                    });
            })
            .await
    }

    async fn partition_count(&self) -> Result<u32> {
        Ok(self
            .manifest
            .read()
            .await?
            .map(|m| m.partition_count)
            .unwrap_or(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_core::DistanceMetric;
    use noema_storage::MemoryAdapter;

    async fn storage_with_manifest(partition_count: u32) -> Arc<dyn StorageAdapter> {
        let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new());
        let mut manifest = Manifest::new(8, DistanceMetric::Euclidean, 16, 200);
        manifest.partition_count = partition_count;
        storage
            .put(noema_storage::keys::MANIFEST, serde_json::to_vec(&manifest).unwrap())
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn reader_never_acquires_locks() {
        let storage = storage_with_manifest(4).await;
        let coordinator = Coordinator::new(storage, InstanceId::from("reader-1"), Role::Reader);
        let manifest = coordinator.manifest_store().read().await.unwrap().unwrap();
        coordinator.reconcile_ownership(&manifest).await.unwrap();
        assert!(!coordinator.owns(0));
    }

    #[tokio::test]
    async fn writer_acquires_its_assigned_partitions() {
        let storage = storage_with_manifest(4).await;
        let coordinator = Coordinator::new(storage, InstanceId::from("writer-1"), Role::Writer);
        let mut manifest = coordinator.manifest_store().read().await.unwrap().unwrap();
        manifest
            .assignments
            .insert("writer-1".to_string(), vec![0, 1]);
        coordinator.reconcile_ownership(&manifest).await.unwrap();
        assert!(coordinator.owns(0));
        assert!(coordinator.owns(1));
        assert!(!coordinator.owns(2));
    }

    #[tokio::test]
    async fn rebalance_spreads_partitions_across_writers() {
        let storage = storage_with_manifest(8).await;
        let coordinator = Coordinator::new(storage, InstanceId::from("writer-1"), Role::Writer);
        let writers = vec![InstanceId::from("writer-1"), InstanceId::from("writer-2")];
        let manifest = coordinator.rebalance(&writers).await.unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(manifest.assignments.values().map(Vec::len).sum::<usize>(), 8);
    }
}
