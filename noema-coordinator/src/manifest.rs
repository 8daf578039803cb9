//! ABOUTME: Manifest read/write and the reader-side periodic refresh poller (§4.F)

use noema_core::{Error, InstanceId, Manifest, Result, StorageAdapter};
use noema_storage::{keys, CacheTier};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct ManifestStore {
    storage: Arc<dyn StorageAdapter>,
}

impl ManifestStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    pub async fn read(&self) -> Result<Option<Manifest>> {
        match self.storage.get(keys::MANIFEST).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn write(&self, manifest: &Manifest) -> Result<()> {
        self.storage.put(keys::MANIFEST, serde_json::to_vec(manifest)?).await
    }

    /// Load the manifest, apply `f`, bump its version, and write it
    /// back. Writers call this on any schema or assignment change
    /// (§4.F "Manifest update").
    pub async fn update(&self, f: impl FnOnce(&mut Manifest)) -> Result<Manifest> {
        let mut manifest = self
            .read()
            .await?
            .ok_or_else(|| Error::NotFound("manifest.json".into()))?;
        f(&mut manifest);
        manifest.bump();
        self.write(&manifest).await?;
        Ok(manifest)
    }
}

/// Polls the manifest every `interval` and invalidates the cache when
/// its version advances. Readers and hybrid instances run this; pure
/// writers don't need to, since they're the ones advancing it (§4.F
/// "readers poll manifest every T_refresh seconds").
pub struct ManifestWatcher {
    store: Arc<ManifestStore>,
    cache: Arc<CacheTier>,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ManifestWatcher {
    #[must_use]
    pub fn new(store: Arc<ManifestStore>, cache: Arc<CacheTier>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            cache,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let watcher = self.clone();
        tokio::spawn(async move { watcher.run().await })
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut ticker = tokio::time::interval(self.interval);
        let mut last_seen_version = self.store.read().await.ok().flatten().map(|m| m.version);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.store.read().await {
                        Ok(Some(manifest)) => {
                            if last_seen_version != Some(manifest.version) {
                                debug!(version = manifest.version, "manifest advanced, invalidating cache");
                                self.cache.invalidate_all();
                                last_seen_version = Some(manifest.version);
                            }
                        }
                        Ok(None) => {}
                        Err(err) => tracing::warn!(%err, "manifest refresh failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("manifest watcher shutting down");
                    break;
                }
            }
        }
    }
}

#[must_use]
pub fn default_instance_id() -> InstanceId {
    InstanceId::from(uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_core::DistanceMetric;
    use noema_storage::cache::CacheSizing;
    use noema_storage::MemoryAdapter;

    #[tokio::test]
    async fn update_bumps_version_and_persists() {
        let storage = Arc::new(MemoryAdapter::new());
        let store = ManifestStore::new(storage);
        let manifest = Manifest::new(8, DistanceMetric::Euclidean, 16, 200);
        store.write(&manifest).await.unwrap();

        let updated = store.update(|m| m.partition_count = 4).await.unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.partition_count, 4);

        let reloaded = store.read().await.unwrap().unwrap();
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn watcher_invalidates_cache_on_version_advance() {
        let storage = Arc::new(MemoryAdapter::new());
        let store = Arc::new(ManifestStore::new(storage.clone()));
        let manifest = Manifest::new(8, DistanceMetric::Euclidean, 16, 200);
        store.write(&manifest).await.unwrap();

        let cache = Arc::new(CacheTier::new(
            storage,
            CacheSizing::from_budget(1 << 20, noema_core::Role::Reader, 64),
        ));
        let watcher = Arc::new(ManifestWatcher::new(store.clone(), cache, Duration::from_millis(10)));
        let handle = watcher.clone().start();

        tokio::time::sleep(Duration::from_millis(15)).await;
        store.update(|m| m.partition_count = 2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        watcher.stop();
        let _ = handle.await;
    }
}
