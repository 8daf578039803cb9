//! ABOUTME: Canonical key-space layout shared by every adapter (§4.A)

use sha2::{Digest, Sha256};

pub fn noun(id: &str) -> String {
    format!("nouns/{id}")
}

pub fn verb(id: &str) -> String {
    format!("verbs/{id}")
}

pub fn verb_by_source(source: &str) -> String {
    format!("verbs/_by_source/{source}")
}

pub fn verb_by_target(target: &str) -> String {
    format!("verbs/_by_target/{target}")
}

pub fn metadata(id: &str) -> String {
    format!("metadata/{id}")
}

pub fn index_shard(partition: u32, file: &str) -> String {
    format!("index/{partition}/{file}")
}

pub fn statistics_day(date: &str) -> String {
    format!("statistics/{date}.json")
}

pub const STATISTICS_LEGACY: &str = "statistics/legacy.json";

pub const MANIFEST: &str = "manifest.json";

pub fn lock(name: &str) -> String {
    format!("locks/{name}.lock")
}

pub fn quarantine(original_key: &str) -> String {
    format!("_quarantine/{original_key}")
}

pub fn wal_entry(instance: &str, seq: u64) -> String {
    format!("wal/{instance}/{seq:020}")
}

/// Prefix-shard an id by the first two hex digits of its SHA-256 digest,
/// spreading keys across object-store partitions (§4.A "Object-store
/// adapter").
#[must_use]
pub fn shard_prefix(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    format!("{:02x}", digest[0])
}
