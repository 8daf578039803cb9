//! ABOUTME: Config validation run before a database is opened

use crate::{NoemaConfig, StorageConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("dimension must be greater than zero")]
    ZeroDimension,
    #[error("m must be at least 2, got {0}")]
    MTooSmall(u32),
    #[error("ef_construction ({ef_construction}) must be >= m ({m})")]
    EfConstructionTooSmall { ef_construction: u32, m: u32 },
    #[error("instance_id is required when storage is not memory (multi-instance deployments)")]
    MissingInstanceId,
    #[error("object_store bucket must not be empty")]
    EmptyBucket,
}

/// Validate a fully-merged config (§6).
pub fn validate(cfg: &NoemaConfig) -> Result<(), ValidationError> {
    if cfg.dimension == 0 {
        return Err(ValidationError::ZeroDimension);
    }
    if cfg.m < 2 {
        return Err(ValidationError::MTooSmall(cfg.m));
    }
    if cfg.ef_construction < cfg.m {
        return Err(ValidationError::EfConstructionTooSmall {
            ef_construction: cfg.ef_construction,
            m: cfg.m,
        });
    }
    match &cfg.storage {
        StorageConfig::Memory => {}
        StorageConfig::Filesystem { .. } => {
            if cfg.instance_id.is_none() {
                return Err(ValidationError::MissingInstanceId);
            }
        }
        StorageConfig::ObjectStore { bucket, .. } => {
            if bucket.is_empty() {
                return Err(ValidationError::EmptyBucket);
            }
            if cfg.instance_id.is_none() {
                return Err(ValidationError::MissingInstanceId);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimension() {
        let cfg = NoemaConfig::minimal(0);
        assert!(matches!(validate(&cfg), Err(ValidationError::ZeroDimension)));
    }

    #[test]
    fn rejects_ef_construction_below_m() {
        let mut cfg = NoemaConfig::minimal(8);
        cfg.ef_construction = 1;
        assert!(matches!(
            validate(&cfg),
            Err(ValidationError::EfConstructionTooSmall { .. })
        ));
    }

    #[test]
    fn filesystem_backend_requires_instance_id() {
        let mut cfg = NoemaConfig::minimal(8);
        cfg.storage = StorageConfig::Filesystem {
            root: "/tmp/noema".into(),
        };
        assert!(matches!(
            validate(&cfg),
            Err(ValidationError::MissingInstanceId)
        ));
    }
}
