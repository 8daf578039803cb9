//! ABOUTME: Request/response shapes for the database facade's public operations (§4.G, §6)

use noema_core::{Filter, NounId, NounMetadata, Value, Vector, Verb};
use std::collections::BTreeMap;
use std::time::Instant;

/// What to embed: a caller-supplied vector, or text the facade must turn
/// into one via the configured [`noema_core::Embed`] collaborator.
pub enum Embedding {
    Vector(Vector),
    Text(String),
}

/// Options accepted by `search` (§4.G, §6).
#[derive(Default)]
pub struct SearchOptions {
    pub filter: Option<Filter>,
    pub ef_search: Option<usize>,
    pub include_relationships: bool,
    pub deadline: Option<Instant>,
}

/// One ranked result from `search` or `searchByFilter`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: NounId,
    pub distance: f32,
    pub metadata: NounMetadata,
    pub relationships: Option<Vec<Verb>>,
}

/// `search`'s return value. `partial=true` means the deadline elapsed
/// before every candidate was scored (§5 "Cancellation and timeouts").
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub partial: bool,
}

#[must_use]
pub fn metadata_from(pairs: BTreeMap<String, Value>) -> NounMetadata {
    let mut metadata = NounMetadata::new();
    for (k, v) in pairs {
        metadata.set(k, v);
    }
    metadata
}
