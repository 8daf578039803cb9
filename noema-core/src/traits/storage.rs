//! ABOUTME: The storage adapter contract (§4.A): a content-addressed key/value store
//! ABOUTME: with atomic create-if-absent as the basis for distributed locking

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Usage accounting returned by [`StorageAdapter::estimate_size`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub used_bytes: u64,
    /// `None` when the backend cannot report a quota (e.g. local disk).
    pub quota_bytes: Option<u64>,
    pub per_folder: HashMap<String, u64>,
}

/// Uniform contract for persisting nouns, verbs, metadata, statistics, and
/// index shards (§4.A). Every concrete adapter — memory, local filesystem,
/// S3-compatible object store — implements exactly this trait; there is no
/// inheritance chain (§9).
///
/// Keys are logical paths such as `nouns/<id>` or `locks/<key>.lock`; the
/// adapter owns how that maps onto its backend (a file, an object, a map
/// entry).
#[async_trait]
pub trait StorageAdapter: Send + Sync + std::fmt::Debug {
    /// Write `bytes` at `key`, replacing any prior value. Must be
    /// all-or-nothing: a reader never observes a partial write.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Read the bytes at `key`. Returns `Ok(None)` rather than an error
    /// when absent — "not found" is not a failure at this layer.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate every key with the given prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Atomically create `key` with `bytes` only if it does not already
    /// exist. Returns `true` if this call created it, `false` if another
    /// writer beat it to the key. This is the sole primitive locking is
    /// built from (§4.F).
    async fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool>;

    /// Report approximate usage for capacity planning and alerting.
    async fn estimate_size(&self) -> Result<SizeEstimate>;
}
