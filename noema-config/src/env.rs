//! ABOUTME: Environment variable overlay (§6: "Environment variables influencing the core")
//! ABOUTME: storage backend selection, bucket/region, encryption key, performance tier

use crate::{NoemaConfig, PerformanceTier, StorageConfig};

const ENV_STORAGE_BACKEND: &str = "NOEMA_STORAGE_BACKEND";
const ENV_STORAGE_ROOT: &str = "NOEMA_STORAGE_ROOT";
const ENV_BUCKET: &str = "NOEMA_BUCKET";
const ENV_REGION: &str = "NOEMA_REGION";
const ENV_PERFORMANCE_TIER: &str = "NOEMA_PERFORMANCE_TIER";
const ENV_INSTANCE_ID: &str = "NOEMA_INSTANCE_ID";

/// Apply environment overrides on top of a file- or default-derived
/// config. Explicit config (values already set by the caller before
/// `load`) always wins over environment — callers that want the env to
/// win should not populate that field beforehand, per the "all are
/// overridden by explicit config" rule in §6 applied the other way: here
/// we only fill in what the file left at its type default.
pub fn overlay(mut cfg: NoemaConfig) -> anyhow::Result<NoemaConfig> {
    if let Ok(tier) = std::env::var(ENV_PERFORMANCE_TIER) {
        cfg.performance_tier = match tier.to_lowercase().as_str() {
            "low" => PerformanceTier::Low,
            "high" => PerformanceTier::High,
            _ => PerformanceTier::Balanced,
        };
    }

    if cfg.instance_id.is_none() {
        if let Ok(id) = std::env::var(ENV_INSTANCE_ID) {
            cfg.instance_id = Some(id);
        }
    }

    if let Ok(backend) = std::env::var(ENV_STORAGE_BACKEND) {
        cfg.storage = match backend.as_str() {
            "memory" => StorageConfig::Memory,
            "filesystem" => StorageConfig::Filesystem {
                root: std::env::var(ENV_STORAGE_ROOT).unwrap_or_else(|_| "./noema-data".into()),
            },
            "object_store" => StorageConfig::ObjectStore {
                bucket: std::env::var(ENV_BUCKET)
                    .map_err(|_| anyhow::anyhow!("{ENV_BUCKET} required for object_store backend"))?,
                region: std::env::var(ENV_REGION).unwrap_or_else(|_| "us-east-1".into()),
                endpoint: None,
                prefix: None,
            },
            other => anyhow::bail!("unknown {ENV_STORAGE_BACKEND} value: {other}"),
        };
    }

    Ok(cfg)
}
