//! Storage-backed adjacency store (§4.E).
//!
//! Verbs are written under `/verbs/<id>`; a secondary index of
//! `source -> [verb id]` and `target -> [verb id]` is kept as sidecar
//! JSON arrays under `/verbs/_by_source/<id>` and `/verbs/_by_target/<id>`
//! for adapters (memory, filesystem, object store) that have no native
//! query capability of their own.

use async_trait::async_trait;
use noema_core::{Direction, Noun, NounId, Result as CoreResult, StorageAdapter, Value, Verb, VerbId};
use noema_storage::{keys, CacheTier};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::traits::GraphLayer;

/// Storage-backed [`GraphLayer`]. Holds an `Arc<CacheTier>` so noun
/// placeholder creation and real-noun resolution share the same hot/warm
/// caches the index uses.
pub struct GraphStore {
    storage: Arc<dyn StorageAdapter>,
    cache: Arc<CacheTier>,
    dimension: usize,
}

impl GraphStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageAdapter>, cache: Arc<CacheTier>, dimension: usize) -> Self {
        Self {
            storage,
            cache,
            dimension,
        }
    }

    async fn ensure_noun(&self, id: &str) -> CoreResult<()> {
        let noun_id = NounId::from(id);
        if self.cache.get_noun(&noun_id).await?.is_none() {
            self.cache
                .put_noun(&Noun::placeholder(noun_id, self.dimension))
                .await?;
        }
        Ok(())
    }

    async fn read_sidecar(&self, key: &str) -> Result<Vec<String>> {
        match self.storage.get(key).await.map_err(GraphError::Core)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(GraphError::Serialization),
            None => Ok(Vec::new()),
        }
    }

    async fn write_sidecar(&self, key: &str, ids: &[String]) -> Result<()> {
        let bytes = serde_json::to_vec(ids)?;
        self.storage.put(key, bytes).await.map_err(GraphError::Core)
    }

    async fn append_sidecar(&self, key: &str, id: &str) -> Result<()> {
        let mut ids = self.read_sidecar(key).await?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
            self.write_sidecar(key, &ids).await?;
        }
        Ok(())
    }

    async fn remove_from_sidecar(&self, key: &str, id: &str) -> Result<()> {
        let mut ids = self.read_sidecar(key).await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            self.write_sidecar(key, &ids).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl GraphLayer for GraphStore {
    async fn add_verb(
        &self,
        source: &str,
        target: &str,
        verb_type: &str,
        metadata: BTreeMap<String, Value>,
        vector: Option<Vec<f32>>,
    ) -> Result<VerbId> {
        self.ensure_noun(source).await.map_err(GraphError::Core)?;
        self.ensure_noun(target).await.map_err(GraphError::Core)?;

        let mut verb = Verb::new(NounId::from(source), NounId::from(target), verb_type);
        verb.vector = vector;
        for (k, v) in metadata {
            verb.metadata.set(k, v);
        }
        verb.metadata.stamp_created(None);

        let bytes = serde_json::to_vec(&verb)?;
        self.storage
            .put(&keys::verb(verb.id.as_str()), bytes)
            .await
            .map_err(GraphError::Core)?;

        self.append_sidecar(&keys::verb_by_source(source), verb.id.as_str())
            .await?;
        self.append_sidecar(&keys::verb_by_target(target), verb.id.as_str())
            .await?;

        Ok(verb.id)
    }

    async fn get_verb(&self, id: &VerbId) -> Result<Option<Verb>> {
        match self
            .storage
            .get(&keys::verb(id.as_str()))
            .await
            .map_err(GraphError::Core)?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete_verb(&self, id: &VerbId) -> Result<bool> {
        let Some(verb) = self.get_verb(id).await? else {
            return Ok(false);
        };
        self.storage
            .delete(&keys::verb(id.as_str()))
            .await
            .map_err(GraphError::Core)?;
        self.remove_from_sidecar(&keys::verb_by_source(verb.source.as_str()), id.as_str())
            .await?;
        self.remove_from_sidecar(&keys::verb_by_target(verb.target.as_str()), id.as_str())
            .await?;
        Ok(true)
    }

    async fn adjacency(
        &self,
        id: &str,
        direction: Direction,
        type_filter: Option<&str>,
    ) -> Result<Vec<Verb>> {
        let mut ids: HashSet<String> = HashSet::new();
        match direction {
            Direction::Out => ids.extend(self.read_sidecar(&keys::verb_by_source(id)).await?),
            Direction::In => ids.extend(self.read_sidecar(&keys::verb_by_target(id)).await?),
            Direction::Any => {
                ids.extend(self.read_sidecar(&keys::verb_by_source(id)).await?);
                ids.extend(self.read_sidecar(&keys::verb_by_target(id)).await?);
            }
        }

        let mut verbs = Vec::with_capacity(ids.len());
        for verb_id in ids {
            if let Some(verb) = self.get_verb(&VerbId::from(verb_id)).await? {
                if type_filter.map_or(true, |t| t == verb.verb_type) {
                    verbs.push(verb);
                }
            }
        }
        verbs.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(verbs)
    }

    async fn materialize_placeholder(&self, noun: Noun) -> Result<()> {
        if noun.metadata.is_placeholder() {
            return Err(GraphError::InvalidInput(
                "materialize_placeholder called with a still-placeholder noun".into(),
            ));
        }
        self.cache.put_noun(&noun).await.map_err(GraphError::Core)?;
        Ok(())
    }
}
