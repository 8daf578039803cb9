//! ABOUTME: Typed configuration for a noema database (§6 `open(config)`)
//! ABOUTME: Layers defaults < file < environment < explicit overrides (see `merge`)

pub mod env;
pub mod merge;
pub mod storage;
pub mod validation;

pub use storage::StorageConfig;

use noema_core::{DistanceMetric, Role};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Performance tier; maps to hot-cache fraction and `ef_*` defaults (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Low,
    Balanced,
    High,
}

impl Default for PerformanceTier {
    fn default() -> Self {
        Self::Balanced
    }
}

impl PerformanceTier {
    #[must_use]
    pub const fn default_ef_search(self) -> u32 {
        match self {
            Self::Low => 40,
            Self::Balanced => 100,
            Self::High => 256,
        }
    }

    /// Fraction of the memory budget reserved for the hot cache, before
    /// the role-specific adjustment described in §5.
    #[must_use]
    pub const fn hot_cache_fraction(self) -> f32 {
        match self {
            Self::Low => 0.3,
            Self::Balanced => 0.5,
            Self::High => 0.8,
        }
    }
}

/// Top-level database configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoemaConfig {
    /// Fixed forever once the database is created.
    pub dimension: u32,
    #[serde(default)]
    pub distance: DistanceMetric,
    #[serde(default = "defaults::m")]
    pub m: u32,
    #[serde(default = "defaults::ef_construction")]
    pub ef_construction: u32,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub role: Role,
    /// Required whenever more than one instance shares a storage backend.
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub performance_tier: PerformanceTier,
    /// Seconds between manifest polls for readers/hybrid instances (§4.F).
    #[serde(default = "defaults::manifest_refresh_secs")]
    pub manifest_refresh_secs: u64,
    /// Approximate host memory budget in bytes, used to size the hot
    /// cache (§5). `None` lets the facade sample host hints instead.
    #[serde(default)]
    pub memory_budget_bytes: Option<u64>,
}

mod defaults {
    pub const fn m() -> u32 {
        16
    }
    pub const fn ef_construction() -> u32 {
        200
    }
    pub const fn manifest_refresh_secs() -> u64 {
        10
    }
}

impl NoemaConfig {
    #[must_use]
    pub fn minimal(dimension: u32) -> Self {
        Self {
            dimension,
            distance: DistanceMetric::default(),
            m: defaults::m(),
            ef_construction: defaults::ef_construction(),
            storage: StorageConfig::default(),
            role: Role::default(),
            instance_id: None,
            performance_tier: PerformanceTier::default(),
            manifest_refresh_secs: defaults::manifest_refresh_secs(),
            memory_budget_bytes: None,
        }
    }

    /// Load from a TOML file, then overlay environment variables, then
    /// validate (§6: "All are overridden by explicit config").
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let base: Self = toml::from_str(&text)?;
        let overlaid = env::overlay(base)?;
        validation::validate(&overlaid)?;
        Ok(overlaid)
    }
}
