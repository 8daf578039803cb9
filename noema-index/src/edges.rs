//! ABOUTME: Bidirectional-edge mutation helpers, maintaining invariant I2 on every call

use noema_core::{NounId, Result};
use noema_storage::CacheTier;

/// Add `b` to `a`'s neighbor set at `level` and persist `a`. Does not
/// touch `b`'s side — call twice (swap arguments) for a true
/// bidirectional edge, as insert always does.
pub async fn add_directed_edge(cache: &CacheTier, a: &NounId, b: &NounId, level: u8) -> Result<()> {
    if let Some(mut noun) = cache.get_noun(a).await? {
        let inserted = noun.connections.entry(level).or_default().insert(b.clone());
        if inserted {
            noun.top_layer = noun.top_layer.max(level);
            cache.put_noun(&noun).await?;
        }
    }
    Ok(())
}

/// Add a true bidirectional edge between `a` and `b` at `level`.
pub async fn connect(cache: &CacheTier, a: &NounId, b: &NounId, level: u8) -> Result<()> {
    add_directed_edge(cache, a, b, level).await?;
    add_directed_edge(cache, b, a, level).await
}

/// Remove `b` from `a`'s neighbor set at `level`, if present.
pub async fn remove_directed_edge(cache: &CacheTier, a: &NounId, b: &NounId, level: u8) -> Result<()> {
    if let Some(mut noun) = cache.get_noun(a).await? {
        let removed = noun
            .connections
            .get_mut(&level)
            .is_some_and(|neighbors| neighbors.remove(b));
        if removed {
            cache.put_noun(&noun).await?;
        }
    }
    Ok(())
}

/// Remove the edge on both sides, preserving invariant I2.
pub async fn disconnect(cache: &CacheTier, a: &NounId, b: &NounId, level: u8) -> Result<()> {
    remove_directed_edge(cache, a, b, level).await?;
    remove_directed_edge(cache, b, a, level).await
}
