//! Swappable adjacency-traversal contract, mirroring the storage crate's
//! backend-abstraction pattern: callers depend on graph behavior without
//! committing to one sidecar-index layout.

use async_trait::async_trait;
use noema_core::{Direction, Noun, Value, Verb, VerbId};
use std::collections::BTreeMap;

use crate::error::Result;

#[async_trait]
pub trait GraphLayer: Send + Sync {
    /// Create a typed directed edge. If `source` or `target` does not
    /// resolve to an existing noun, a placeholder is created for it
    /// (`is_placeholder=true`, zero vector) so traversal works before the
    /// real noun arrives.
    async fn add_verb(
        &self,
        source: &str,
        target: &str,
        verb_type: &str,
        metadata: BTreeMap<String, Value>,
        vector: Option<Vec<f32>>,
    ) -> Result<VerbId>;

    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>>;

    async fn delete_verb(&self, id: &VerbId) -> Result<bool>;

    /// List verbs touching `id`, filtered by direction and, optionally,
    /// verb type.
    async fn adjacency(
        &self,
        id: &str,
        direction: Direction,
        type_filter: Option<&str>,
    ) -> Result<Vec<Verb>>;

    /// Replace a placeholder's metadata/vector once the real noun
    /// arrives via `add`; existing adjacency is left untouched.
    async fn materialize_placeholder(&self, noun: Noun) -> Result<()>;
}
