//! ABOUTME: Per-day partitioned statistics store with lock-guarded merge writes (§4.C)

use crate::keys;
use chrono::Utc;
use noema_core::{Error, Result, Statistics, StorageAdapter};
use std::sync::Arc;
use std::time::Duration;

const LOCK_TTL_MS: u64 = 5_000;
const LOCK_RETRY_CEILING: u32 = 5;

pub struct StatisticsStore {
    storage: Arc<dyn StorageAdapter>,
    writer_id: String,
}

impl StatisticsStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, writer_id: impl Into<String>) -> Self {
        Self {
            storage,
            writer_id: writer_id.into(),
        }
    }

    fn today() -> String {
        Utc::now().format("%Y%m%d").to_string()
    }

    fn yesterday() -> String {
        (Utc::now() - chrono::Duration::days(1))
            .format("%Y%m%d")
            .to_string()
    }

    async fn read_day(&self, date: &str) -> Result<Option<Statistics>> {
        match self.storage.get(&keys::statistics_day(date)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Merge `today` and `yesterday`'s blobs, falling back to the legacy
    /// single-file copy if neither exists. Readers never acquire the
    /// statistics lock (§4.C "Read path").
    pub async fn read(&self) -> Result<Statistics> {
        let today = self.read_day(&Self::today()).await?;
        let yesterday = self.read_day(&Self::yesterday()).await?;
        match (today, yesterday) {
            (Some(mut t), Some(y)) => {
                t.merge(&y);
                Ok(t)
            }
            (Some(t), None) => Ok(t),
            (None, Some(y)) => Ok(y),
            (None, None) => match self.storage.get(keys::STATISTICS_LEGACY).await? {
                Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
                None => Ok(Statistics::new()),
            },
        }
    }

    /// Apply `delta` to today's counters: acquire the lock, read-merge-
    /// write, release (§4.C "Write path"). Merge = max-for-shared,
    /// sum-for-disjoint (invariant I6, property P9).
    pub async fn record(&self, delta: &Statistics) -> Result<()> {
        let lock_key = keys::lock("statistics");
        let mut attempt = 0;
        loop {
            let lock_bytes = serde_json::to_vec(&noema_core::Lock::new(&self.writer_id, LOCK_TTL_MS))?;
            if self.storage.put_if_absent(&lock_key, lock_bytes).await? {
                break;
            }
            // Inspect for staleness and reclaim, mirroring §4.F's
            // distributed-lock protocol applied to the statistics lock.
            if let Some(existing) = self.storage.get(&lock_key).await? {
                if let Ok(lock) = serde_json::from_slice::<noema_core::Lock>(&existing) {
                    if lock.is_stale() {
                        self.storage.delete(&lock_key).await?;
                        continue;
                    }
                }
            }
            attempt += 1;
            if attempt >= LOCK_RETRY_CEILING {
                return Err(Error::Conflict("statistics lock contended".into()));
            }
            tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
        }

        let today_key = keys::statistics_day(&Self::today());
        let mut current = self.read_day(&Self::today()).await?.unwrap_or_default();
        current.merge(delta);
        current.last_updated = Some(Utc::now());
        self.storage
            .put(&today_key, serde_json::to_vec(&current)?)
            .await?;
        self.storage
            .put(keys::STATISTICS_LEGACY, serde_json::to_vec(&current)?)
            .await?;
        self.storage.delete(&lock_key).await?;
        Ok(())
    }
}
