//! ABOUTME: The embedding function seam injected by the external collaborator (§9)

use crate::types::Vector;
use async_trait::async_trait;

/// The text-embedding model is an external collaborator (§1): the core
/// never hosts or trains one. Callers inject an implementation of this
/// trait at `open(config)` time; there is no global singleton (§9).
#[async_trait]
pub trait Embed: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vector>;
}
