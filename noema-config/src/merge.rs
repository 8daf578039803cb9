//! ABOUTME: Layered config merge: defaults < file < environment < explicit overrides

use crate::NoemaConfig;

/// Merge `override_cfg` onto `base`, preferring `override_cfg`'s value for
/// any field it set explicitly. Only the handful of fields that are
/// meaningfully optional at the file layer (`instance_id`,
/// `memory_budget_bytes`) fall back to `base`; everything else is always
/// taken from the higher-precedence layer since `NoemaConfig` fields are
/// not individually optional once defaulted.
#[must_use]
pub fn merge(base: NoemaConfig, override_cfg: NoemaConfig) -> NoemaConfig {
    NoemaConfig {
        dimension: override_cfg.dimension,
        distance: override_cfg.distance,
        m: override_cfg.m,
        ef_construction: override_cfg.ef_construction,
        storage: override_cfg.storage,
        role: override_cfg.role,
        instance_id: override_cfg.instance_id.or(base.instance_id),
        performance_tier: override_cfg.performance_tier,
        manifest_refresh_secs: override_cfg.manifest_refresh_secs,
        memory_budget_bytes: override_cfg.memory_budget_bytes.or(base.memory_budget_bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_instance_id_wins_when_present() {
        let base = NoemaConfig {
            instance_id: Some("base-id".into()),
            ..NoemaConfig::minimal(8)
        };
        let over = NoemaConfig {
            instance_id: Some("override-id".into()),
            ..NoemaConfig::minimal(8)
        };
        let merged = merge(base, over);
        assert_eq!(merged.instance_id.as_deref(), Some("override-id"));
    }

    #[test]
    fn base_instance_id_survives_when_override_absent() {
        let base = NoemaConfig {
            instance_id: Some("base-id".into()),
            ..NoemaConfig::minimal(8)
        };
        let over = NoemaConfig::minimal(8);
        let merged = merge(base, over);
        assert_eq!(merged.instance_id.as_deref(), Some("base-id"));
    }
}
