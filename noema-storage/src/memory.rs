//! ABOUTME: Process-local storage adapter (§4.A "Memory adapter")

use async_trait::async_trait;
use dashmap::DashMap;
use noema_core::{Result, SizeEstimate, StorageAdapter};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-local maps; deep-copies on put/get to prevent aliasing bugs
/// between callers that hold references into the store. `put_if_absent`
/// is serialized through a single mutex so the create-if-absent check and
/// the insert are atomic (§4.A).
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    entries: DashMap<String, Vec<u8>>,
    absent_guard: Mutex<()>,
}

impl MemoryAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        let _guard = self.absent_guard.lock();
        if self.entries.contains_key(key) {
            return Ok(false);
        }
        self.entries.insert(key.to_string(), bytes);
        Ok(true)
    }

    async fn estimate_size(&self) -> Result<SizeEstimate> {
        let mut per_folder: HashMap<String, u64> = HashMap::new();
        let mut used_bytes = 0u64;
        for entry in self.entries.iter() {
            let size = entry.value().len() as u64;
            used_bytes += size;
            let folder = entry
                .key()
                .split('/')
                .next()
                .unwrap_or("")
                .to_string();
            *per_folder.entry(folder).or_default() += size;
        }
        Ok(SizeEstimate {
            used_bytes,
            quota_bytes: None,
            per_folder,
        })
    }
}
