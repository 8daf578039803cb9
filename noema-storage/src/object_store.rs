//! ABOUTME: S3-compatible object-store adapter (§4.A "Object-store adapter")
//! ABOUTME: One object per entity; conditional-create via `If-None-Match: *`; prefix-sharded keys

use crate::keys::shard_prefix;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use noema_core::{Error, Result, SizeEstimate, StorageAdapter};
use std::collections::HashMap;
use std::time::Duration;

const RETRY_BASE_MS: u64 = 1_000;
const RETRY_CAP_MS: u64 = 30_000;
const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Retry `op` while it raises a [`Error::is_retryable`] error, with
/// exponential backoff from `RETRY_BASE_MS` capped at `RETRY_CAP_MS`,
/// giving up after `RETRY_MAX_ATTEMPTS` retries (§7 "Propagation policy").
async fn retry_with_backoff<T, F, Fut>(op_name: &'static str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < RETRY_MAX_ATTEMPTS => {
                attempt += 1;
                let backoff_ms = RETRY_BASE_MS.saturating_mul(1u64 << (attempt - 1)).min(RETRY_CAP_MS);
                tracing::warn!(operation = op_name, attempt, backoff_ms, error = %err, "retrying object-store operation");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

pub struct ObjectStoreAdapter {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl std::fmt::Debug for ObjectStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreAdapter")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStoreAdapter {
    pub async fn new(bucket: impl Into<String>, region: impl Into<String>, endpoint: Option<String>, prefix: Option<String>) -> Self {
        let region = aws_config::Region::new(region.into());
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    /// Prefix-shard by a hash of the entity id so object-store partitions
    /// aren't hot-spotted by lexicographically clustered ids (§4.A). Only
    /// applied to `nouns/<id>` and `verbs/<id>` keys, which are the
    /// high-cardinality, randomly-accessed ones; structural keys
    /// (manifest, locks, statistics, index shards) are left unsharded so
    /// their well-known paths stay predictable.
    fn object_key(&self, key: &str) -> String {
        let sharded = if let Some(id) = key.strip_prefix("nouns/").or_else(|| key.strip_prefix("verbs/")) {
            let folder = &key[..key.len() - id.len()];
            format!("{folder}{}/{id}", shard_prefix(id))
        } else {
            key.to_string()
        };
        match &self.prefix {
            Some(p) => format!("{p}/{sharded}"),
            None => sharded,
        }
    }

    fn transient(context: &str, err: impl std::fmt::Display) -> Error {
        Error::Transient(format!("{context}: {err}"))
    }
}

#[async_trait]
impl StorageAdapter for ObjectStoreAdapter {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let object_key = self.object_key(key);
        retry_with_backoff("put", || async {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(object_key.clone())
                .body(bytes.clone().into())
                .send()
                .await
                .map_err(|e| Self::transient("put", e))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object_key = self.object_key(key);
        retry_with_backoff("get", || async {
            match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(object_key.clone())
                .send()
                .await
            {
                Ok(output) => {
                    let bytes = output
                        .body
                        .collect()
                        .await
                        .map_err(|e| Self::transient("read body", e))?
                        .into_bytes()
                        .to_vec();
                    Ok(Some(bytes))
                }
                Err(err) => {
                    let service_err = err.into_service_error();
                    if service_err.is_no_such_key() {
                        Ok(None)
                    } else {
                        Err(Self::transient("get", service_err))
                    }
                }
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key);
        retry_with_backoff("delete", || async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(object_key.clone())
                .send()
                .await
                .map_err(|e| Self::transient("delete", e))?;
            Ok(())
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // Sharded folders mean a plain prefix no longer lists contiguously;
        // list every shard bucket and filter, paginating each.
        let list_prefix = match &self.prefix {
            Some(p) => format!("{p}/{prefix}"),
            None => prefix.to_string(),
        };
        let base_folder = prefix.split('/').next().unwrap_or("");
        let sharded = matches!(base_folder, "nouns" | "verbs");

        let mut out = Vec::new();
        let mut continuation: Option<String> = None;
        let effective_prefix = if sharded {
            // Sharding only adds a two-hex-digit path segment right after
            // the folder name, so a prefix scoped to the folder still
            // narrows the listing; the shard component itself is filtered
            // client-side.
            format!("{}/", base_folder)
        } else {
            list_prefix.clone()
        };
        let scan_prefix = match &self.prefix {
            Some(p) => format!("{p}/{effective_prefix}"),
            None => effective_prefix,
        };
        loop {
            let resp = retry_with_backoff("list", || async {
                let mut req = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&scan_prefix);
                if let Some(token) = &continuation {
                    req = req.continuation_token(token);
                }
                req.send().await.map_err(|e| Self::transient("list", e))
            })
            .await?;
            for obj in resp.contents() {
                if let Some(k) = obj.key() {
                    let unprefixed = match &self.prefix {
                        Some(p) => k.strip_prefix(&format!("{p}/")).unwrap_or(k),
                        None => k,
                    };
                    let logical = if sharded {
                        unshard(unprefixed)
                    } else {
                        unprefixed.to_string()
                    };
                    if logical.starts_with(prefix) {
                        out.push(logical);
                    }
                }
            }
            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(out)
    }

    async fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        let object_key = self.object_key(key);
        retry_with_backoff("put_if_absent", || async {
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(object_key.clone())
                .if_none_match("*")
                .body(bytes.clone().into())
                .send()
                .await;
            match result {
                Ok(_) => Ok(true),
                Err(err) => {
                    let svc = err.into_service_error();
                    if svc.meta().code() == Some("PreconditionFailed") {
                        Ok(false)
                    } else {
                        Err(Self::transient("put_if_absent", svc))
                    }
                }
            }
        })
        .await
    }

    async fn estimate_size(&self) -> Result<SizeEstimate> {
        let mut per_folder: HashMap<String, u64> = HashMap::new();
        let mut used_bytes = 0u64;
        let mut continuation: Option<String> = None;
        loop {
            let resp = retry_with_backoff("estimate_size", || async {
                let mut req = self.client.list_objects_v2().bucket(&self.bucket);
                if let Some(p) = &self.prefix {
                    req = req.prefix(p);
                }
                if let Some(token) = &continuation {
                    req = req.continuation_token(token);
                }
                req.send().await.map_err(|e| Self::transient("estimate_size", e))
            })
            .await?;
            for obj in resp.contents() {
                let size = obj.size().unwrap_or(0).max(0) as u64;
                used_bytes += size;
                if let Some(k) = obj.key() {
                    let folder = k.split('/').next().unwrap_or("").to_string();
                    *per_folder.entry(folder).or_default() += size;
                }
            }
            if resp.is_truncated().unwrap_or(false) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(SizeEstimate {
            used_bytes,
            quota_bytes: None,
            per_folder,
        })
    }
}

/// Strip the two-hex-digit shard segment inserted by [`ObjectStoreAdapter::object_key`].
fn unshard(object_key: &str) -> String {
    let mut parts: Vec<&str> = object_key.split('/').collect();
    if parts.len() >= 3 && parts[1].len() == 2 && parts[1].chars().all(|c| c.is_ascii_hexdigit()) {
        parts.remove(1);
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unshard_reverses_shard_insertion() {
        assert_eq!(unshard("nouns/ab/id-123"), "nouns/id-123");
        assert_eq!(unshard("manifest.json"), "manifest.json");
    }
}
