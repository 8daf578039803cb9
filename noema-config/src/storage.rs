//! ABOUTME: Storage backend selection (§6: `storage: {memory | filesystem | object_store}`)

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which concrete [`noema_core::StorageAdapter`] to construct.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Memory,
    Filesystem {
        root: String,
    },
    ObjectStore {
        bucket: String,
        region: String,
        /// Credentials are resolved through the standard AWS provider chain
        /// when omitted (env vars, instance profile, shared config).
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}
