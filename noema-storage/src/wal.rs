//! ABOUTME: Write-ahead log: append-before-mutate with idempotent replay (§7)

use crate::keys;
use chrono::{DateTime, Utc};
use noema_core::{Result, StorageAdapter};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One durable record of an in-flight mutation. `payload` carries
/// whatever the caller needs to redo the operation (a noun id, a verb,
/// an index insert) — the log itself is opaque to the operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Per-instance append log. Every mutation that touches more than one
/// storage key (an index insert that updates several neighbor lists, a
/// verb add that also creates placeholder nouns) is journaled here
/// first, so a crash mid-mutation can be detected and redone on restart
/// instead of leaving the index in a half-written state (invariant
/// honored: no partial multi-key write survives a restart unreplayed).
pub struct WriteAheadLog {
    storage: Arc<dyn StorageAdapter>,
    instance_id: String,
    next_seq: AtomicU64,
}

impl WriteAheadLog {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, instance_id: impl Into<String>) -> Self {
        Self {
            storage,
            instance_id: instance_id.into(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Scan existing entries for this instance and resume numbering
    /// after the highest one found. Call once at startup before the
    /// first `append`.
    pub async fn recover_sequence(&self) -> Result<()> {
        let prefix = format!("wal/{}/", self.instance_id);
        let keys = self.storage.list(&prefix).await?;
        let max_seq = keys
            .iter()
            .filter_map(|k| k.rsplit('/').next())
            .filter_map(|s| s.parse::<u64>().ok())
            .max();
        if let Some(max) = max_seq {
            self.next_seq.store(max + 1, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Durably record an operation before it is applied. Returns the
    /// sequence number to pass to [`Self::truncate_through`] once the
    /// operation has been fully applied.
    pub async fn append(&self, kind: impl Into<String>, payload: serde_json::Value) -> Result<u64> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = WalEntry {
            seq,
            recorded_at: Utc::now(),
            kind: kind.into(),
            payload,
        };
        self.storage
            .put(&keys::wal_entry(&self.instance_id, seq), serde_json::to_vec(&entry)?)
            .await?;
        Ok(seq)
    }

    /// Drop the journal entry for a completed operation. Idempotent:
    /// deleting an already-missing key is not an error.
    pub async fn truncate_through(&self, seq: u64) -> Result<()> {
        self.storage
            .delete(&keys::wal_entry(&self.instance_id, seq))
            .await
    }

    /// List every still-journaled (therefore incomplete) entry for this
    /// instance, in sequence order, for replay on startup (§7 "Recovery").
    pub async fn pending(&self) -> Result<Vec<WalEntry>> {
        let prefix = format!("wal/{}/", self.instance_id);
        let mut keys = self.storage.list(&prefix).await?;
        keys.sort();
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.storage.get(&key).await? {
                entries.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(entries)
    }

    /// Replay every pending entry through `apply`, truncating each one
    /// once it returns successfully. `apply` must be idempotent: a crash
    /// between the mutation completing and the truncation landing means
    /// the same entry can be replayed twice.
    pub async fn replay<F, Fut>(&self, apply: F) -> Result<usize>
    where
        F: Fn(WalEntry) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let pending = self.pending().await?;
        let count = pending.len();
        for entry in pending {
            let seq = entry.seq;
            apply(entry).await?;
            self.truncate_through(seq).await?;
        }
        Ok(count)
    }
}
