//! ABOUTME: The single user entry point composing storage, cache, index, graph, and coordination (§4.G)

use crate::budget::AdaptiveBudget;
use crate::input::{metadata_from, Embedding, SearchHit, SearchOptions, SearchOutcome};
use noema_config::{NoemaConfig, StorageConfig};
use noema_coordinator::{default_instance_id, Coordinator, ManifestStore, ManifestWatcher};
use noema_core::{
    Direction, Embed, Error, Filter, InstanceId, Manifest, Noun, NounId, Result, Role,
    StorageAdapter, Value, VerbId,
};
use noema_graph::{GraphLayer, GraphStore};
use noema_index::{HnswIndex, IndexConfig};
use noema_storage::cache::CacheSizing;
use noema_storage::{CacheTier, FilesystemAdapter, MemoryAdapter, ObjectStoreAdapter, StatisticsStore, WriteAheadLog};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const DEFAULT_MEMORY_BUDGET_BYTES: u64 = 256 * 1024 * 1024;
const AVG_ENTITY_BYTES: u64 = 512;
const LOCK_REFRESH_DIVISOR: u64 = 3;
const MIN_FILTER_EXPANSION: usize = 2;
const MAX_FILTER_EXPANSION: usize = 8;

fn map_graph_err(err: noema_graph::GraphError) -> Error {
    match err {
        noema_graph::GraphError::Core(inner) => inner,
        other => Error::InvalidArgument(other.to_string()),
    }
}

async fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageAdapter>> {
    Ok(match config {
        StorageConfig::Memory => Arc::new(MemoryAdapter::new()) as Arc<dyn StorageAdapter>,
        StorageConfig::Filesystem { root } => {
            Arc::new(FilesystemAdapter::new(root.clone()).await?) as Arc<dyn StorageAdapter>
        }
        StorageConfig::ObjectStore { bucket, region, endpoint, prefix } => Arc::new(
            ObjectStoreAdapter::new(bucket.clone(), region.clone(), endpoint.clone(), prefix.clone()).await,
        ) as Arc<dyn StorageAdapter>,
    })
}

/// A hybrid vector + graph database. Cheap to clone via `Arc`-wrapped
/// fields internally, but the type itself is held behind a single owner
/// per process — open it once at startup.
pub struct Database {
    config: NoemaConfig,
    instance_id: InstanceId,
    storage: Arc<dyn StorageAdapter>,
    cache: Arc<CacheTier>,
    index: Arc<HnswIndex>,
    graph: Arc<GraphStore>,
    statistics: Arc<StatisticsStore>,
    coordinator: Arc<Coordinator>,
    embed: Option<Arc<dyn Embed>>,
    budget: AdaptiveBudget,
    manifest_watcher: Option<Arc<ManifestWatcher>>,
    manifest_watcher_handle: Option<JoinHandle<()>>,
    lock_refresher: Option<JoinHandle<()>>,
    noun_total: AtomicU64,
    verb_total: AtomicU64,
}

impl Database {
    /// Open a database against `config`. `embed` is required only if
    /// callers ever pass [`Embedding::Text`] to [`Self::add`] (§9 "the
    /// embedding model is an external collaborator").
    pub async fn open(config: NoemaConfig, embed: Option<Arc<dyn Embed>>) -> Result<Self> {
        let storage = build_storage(&config.storage).await?;
        let instance_id = InstanceId::from(
            config
                .instance_id
                .clone()
                .unwrap_or_else(|| default_instance_id().to_string()),
        );

        let manifest_store = ManifestStore::new(storage.clone());
        let manifest = match manifest_store.read().await? {
            Some(existing) => {
                if existing.dimension != config.dimension as usize {
                    return Err(Error::DimensionMismatch {
                        expected: existing.dimension,
                        actual: config.dimension as usize,
                    });
                }
                existing
            }
            None => {
                let fresh = Manifest::new(config.dimension as usize, config.distance, config.m, config.ef_construction);
                manifest_store.write(&fresh).await?;
                fresh
            }
        };

        let memory_budget = config.memory_budget_bytes.unwrap_or(DEFAULT_MEMORY_BUDGET_BYTES);
        let cache = Arc::new(CacheTier::new(
            storage.clone(),
            CacheSizing::from_budget(memory_budget, config.role, AVG_ENTITY_BYTES),
        ));

        let wal = if config.role.may_write() {
            let wal = Arc::new(WriteAheadLog::new(storage.clone(), instance_id.to_string()));
            wal.recover_sequence().await?;
            Some(wal)
        } else {
            None
        };

        let index = Arc::new(HnswIndex::new(
            cache.clone(),
            storage.clone(),
            wal.clone(),
            IndexConfig {
                dimension: manifest.dimension,
                distance: manifest.distance,
                m: manifest.m,
                ef_construction: manifest.ef_construction,
                partition_count: manifest.partition_count,
            },
        ));

        if let Some(wal) = &wal {
            let replayed = wal
                .replay(|entry| {
                    let index = index.clone();
                    async move {
                        if entry.kind == "index_insert" {
                            if let Some(id) = entry.payload.get("id").and_then(|v| v.as_str()) {
                                index.reconnect_orphan(&NounId::from(id)).await?;
                            }
                        }
                        Ok(())
                    }
                })
                .await?;
            if replayed > 0 {
                info!(replayed, "recovered in-flight writes from write-ahead log");
            }
        }

        let graph = Arc::new(GraphStore::new(storage.clone(), cache.clone(), manifest.dimension));
        let statistics = Arc::new(StatisticsStore::new(storage.clone(), instance_id.to_string()));

        let coordinator = Arc::new(Coordinator::new(storage.clone(), instance_id.clone(), config.role));
        let mut lock_refresher = None;
        if config.role.may_write() {
            let manifest = coordinator.manifest_store().read().await?.unwrap_or(manifest.clone());
            if !manifest.assignments.contains_key(instance_id.0.as_str()) {
                coordinator.rebalance(&[instance_id.clone()]).await?;
            }
            let current = coordinator.manifest_store().read().await?.unwrap_or(manifest);
            coordinator.reconcile_ownership(&current).await?;

            let refresh_interval = Duration::from_millis(coordinator.lock_ttl_ms() / LOCK_REFRESH_DIVISOR);
            let coordinator_for_task = coordinator.clone();
            lock_refresher = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(refresh_interval);
                loop {
                    ticker.tick().await;
                    if let Err(err) = coordinator_for_task.refresh_owned_locks().await {
                        warn!(%err, "partition lock refresh failed");
                    }
                }
            }));
        }

        let (manifest_watcher, manifest_watcher_handle) = if config.role != Role::Writer {
            let watcher = Arc::new(ManifestWatcher::new(
                coordinator.manifest_store(),
                cache.clone(),
                Duration::from_secs(config.manifest_refresh_secs),
            ));
            let handle = watcher.clone().start();
            (Some(watcher), Some(handle))
        } else {
            (None, None)
        };

        let budget = AdaptiveBudget::new(cache.clone(), config.performance_tier.default_ef_search());

        Ok(Self {
            config,
            instance_id,
            storage,
            cache,
            index,
            graph,
            statistics,
            coordinator,
            embed,
            budget,
            manifest_watcher,
            manifest_watcher_handle,
            lock_refresher,
            noun_total: AtomicU64::new(0),
            verb_total: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Recompute partition ownership across `writers` (§4.F "Rebalance
    /// triggers"). Call when a writer joins or leaves the deployment.
    pub async fn rebalance(&self, writers: &[InstanceId]) -> Result<()> {
        let manifest = self.coordinator.rebalance(writers).await?;
        self.coordinator.reconcile_ownership(&manifest).await?;
        self.cache.invalidate_all();
        Ok(())
    }

    async fn resolve_vector(&self, embedding: Embedding) -> Result<Vec<f32>> {
        match embedding {
            Embedding::Vector(v) => Ok(v),
            Embedding::Text(text) => {
                let embed = self
                    .embed
                    .as_ref()
                    .ok_or_else(|| Error::InvalidArgument("no embed collaborator configured for text input".into()))?;
                embed
                    .embed(&text)
                    .await
                    .map_err(|err| Error::InvalidArgument(err.to_string()))
            }
        }
    }

    fn require_write(&self) -> Result<()> {
        if self.config.role.may_write() {
            Ok(())
        } else {
            Err(Error::RoleViolation(format!("{:?} instance cannot write", self.config.role)))
        }
    }

    fn validate_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension as usize {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension as usize,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Insert a noun (§6 `add`). If `id` names an existing placeholder
    /// created by a prior `addVerb`, its metadata and vector are
    /// overwritten and it is re-inserted into the index as a real node
    /// (§4.E "Consistency").
    pub async fn add(&self, embedding: Embedding, metadata: BTreeMap<String, Value>, id: Option<NounId>) -> Result<NounId> {
        self.require_write()?;
        let vector = self.resolve_vector(embedding).await?;
        self.validate_dimension(&vector)?;

        let id = id.unwrap_or_else(NounId::generate);
        let existing = self.cache.get_noun(&id).await?;

        let mut noun = Noun::new(id.clone(), vector);
        for (k, v) in metadata {
            noun.metadata.set(k, v);
        }
        noun.metadata.stamp_created(Some(self.instance_id.0.as_str()));

        match existing {
            Some(placeholder) if placeholder.metadata.is_placeholder() => {
                self.graph.materialize_placeholder(noun.clone()).await.map_err(map_graph_err)?;
                self.index.insert(noun).await?;
            }
            Some(_) => return Err(Error::Conflict(format!("noun {id} already exists"))),
            None => self.index.insert(noun).await?,
        }

        let total = self.noun_total.fetch_add(1, Ordering::Relaxed) + 1;
        let mut delta = noema_core::Statistics::new();
        delta.noun_count.insert(self.instance_id.to_string(), total);
        self.statistics.record(&delta).await?;
        Ok(id)
    }

    /// Create a typed relationship between two nouns (§4.E `addVerb`).
    pub async fn add_verb(
        &self,
        source: NounId,
        target: NounId,
        verb_type: impl Into<String>,
        metadata: BTreeMap<String, Value>,
        vector: Option<Vec<f32>>,
    ) -> Result<VerbId> {
        self.require_write()?;
        if let Some(v) = &vector {
            self.validate_dimension(v)?;
        }
        let id = self
            .graph
            .add_verb(source.as_str(), target.as_str(), &verb_type.into(), metadata, vector)
            .await
            .map_err(map_graph_err)?;

        let total = self.verb_total.fetch_add(1, Ordering::Relaxed) + 1;
        let mut delta = noema_core::Statistics::new();
        delta.verb_count.insert(self.instance_id.to_string(), total);
        self.statistics.record(&delta).await?;
        Ok(id)
    }

    /// Existence check, routed direct to storage regardless of role
    /// (§4.G "a write-only instance ... allows get").
    pub async fn get(&self, id: &NounId) -> Result<Option<Noun>> {
        self.cache.get_noun(id).await
    }

    pub async fn get_verb(&self, id: &VerbId) -> Result<Option<noema_core::Verb>> {
        self.graph.get_verb(id).await.map_err(map_graph_err)
    }

    pub async fn delete_verb(&self, id: &VerbId) -> Result<bool> {
        self.require_write()?;
        self.graph.delete_verb(id).await.map_err(map_graph_err)
    }

    /// List verbs touching `id`, independent of whether `id` resolves
    /// to a placeholder or a materialized noun.
    pub async fn adjacency(
        &self,
        id: &str,
        direction: noema_core::Direction,
        type_filter: Option<&str>,
    ) -> Result<Vec<noema_core::Verb>> {
        self.graph.adjacency(id, direction, type_filter).await.map_err(map_graph_err)
    }

    /// Remove a noun. `hard=true` drops it from the HNSW graph with
    /// neighbor reconnection (§4.D); `hard=false` only tombstones it.
    pub async fn delete(&self, id: &NounId, hard: bool) -> Result<bool> {
        self.require_write()?;
        if hard {
            self.index.hard_delete(id).await
        } else {
            self.index.soft_delete(id).await
        }
    }

    /// Vector similarity search with optional post-filtering and graph
    /// expansion (§4.G). Honors `options.deadline`: on expiry the
    /// returned [`SearchOutcome`] has `partial=true` and whatever hits had
    /// already been scored.
    pub async fn search(&self, query: &[f32], k: usize, options: SearchOptions) -> Result<SearchOutcome> {
        if !self.config.role.may_search() {
            return Err(Error::RoleViolation(format!("{:?} instance cannot search", self.config.role)));
        }
        self.validate_dimension(query)?;

        let (ef_floor, expansion_allowed) = self.budget.sample();
        let ef_search = options.ef_search.unwrap_or(ef_floor as usize);
        let include_relationships = options.include_relationships && expansion_allowed;

        let work = self.run_search(query, k, ef_search, options.filter.as_ref(), include_relationships);
        match options.deadline {
            None => work.await,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                match tokio::time::timeout(remaining, work).await {
                    Ok(result) => result,
                    Err(_) => Ok(SearchOutcome { hits: Vec::new(), partial: true }),
                }
            }
        }
    }

    async fn run_search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: Option<&Filter>,
        include_relationships: bool,
    ) -> Result<SearchOutcome> {
        let mut expansion = MIN_FILTER_EXPANSION;
        let mut hits = Vec::new();

        loop {
            let raw = self.index.search(query, k * expansion, ef_search).await?;
            hits.clear();
            for (id, distance) in raw {
                let Some(noun) = self.cache.get_noun(&id).await? else {
                    continue;
                };
                if noun.metadata.is_placeholder() || noun.metadata.is_tombstoned() {
                    continue;
                }
                if let Some(filter) = filter {
                    if !filter.matches(&noun.metadata) {
                        continue;
                    }
                }
                let relationships = if include_relationships {
                    Some(
                        self.graph
                            .adjacency(id.as_str(), Direction::Any, None)
                            .await
                            .map_err(map_graph_err)?,
                    )
                } else {
                    None
                };
                hits.push(SearchHit { id, distance, metadata: noun.metadata, relationships });
                if hits.len() >= k {
                    break;
                }
            }

            if hits.len() >= k || expansion >= MAX_FILTER_EXPANSION {
                break;
            }
            expansion *= 2;
        }

        hits.truncate(k);
        Ok(SearchOutcome { hits, partial: false })
    }

    /// Metadata-only search: every noun matching `filter`, no vector
    /// involved (§6 `searchByFilter`).
    pub async fn search_by_filter(&self, filter: &Filter, k: usize) -> Result<Vec<SearchHit>> {
        if !self.config.role.may_search() {
            return Err(Error::RoleViolation(format!("{:?} instance cannot search", self.config.role)));
        }
        let keys = self.storage.list("nouns/").await?;
        let mut hits = Vec::new();
        for key in keys {
            let Some(id) = key.strip_prefix("nouns/") else { continue };
            let id = NounId::from(id);
            let Some(noun) = self.cache.get_noun(&id).await? else { continue };
            if noun.metadata.is_placeholder() || noun.metadata.is_tombstoned() {
                continue;
            }
            if !filter.matches(&noun.metadata) {
                continue;
            }
            hits.push(SearchHit { id, distance: 0.0, metadata: noun.metadata, relationships: None });
            if hits.len() >= k {
                break;
            }
        }
        Ok(hits)
    }

    pub async fn get_statistics(&self) -> Result<noema_core::Statistics> {
        self.statistics.read().await
    }

    /// Wipe every noun, verb, and statistic, resetting the manifest to a
    /// fresh, unpartitioned state. Destructive; intended for test fixtures
    /// and local development, not production rebalancing.
    pub async fn clear(&self) -> Result<()> {
        self.require_write()?;
        for prefix in ["nouns/", "verbs/", "statistics/", "index/"] {
            for key in self.storage.list(prefix).await? {
                self.storage.delete(&key).await?;
            }
        }
        self.cache.invalidate_all();
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(watcher) = &self.manifest_watcher {
            watcher.stop();
        }
        if let Some(handle) = self.manifest_watcher_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.lock_refresher.take() {
            handle.abort();
        }
    }
}

#[must_use]
pub fn noun_metadata(pairs: BTreeMap<String, Value>) -> noema_core::NounMetadata {
    metadata_from(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_config::NoemaConfig;

    const DIM: u32 = 4;

    fn vector(seed: u32) -> Vec<f32> {
        (0..DIM).map(|i| (seed + i) as f32).collect()
    }

    async fn open_hybrid() -> Database {
        Database::open(NoemaConfig::minimal(DIM), None).await.unwrap()
    }

    #[tokio::test]
    async fn add_then_get_round_trips_the_noun() {
        let db = open_hybrid().await;
        let mut metadata = BTreeMap::new();
        metadata.insert("label".to_string(), Value::from("widget"));

        let id = db.add(Embedding::Vector(vector(1)), metadata, None).await.unwrap();
        let noun = db.get(&id).await.unwrap().unwrap();
        assert_eq!(noun.vector, vector(1));
        assert_eq!(noun.metadata.get("label"), Some(&Value::from("widget")));
    }

    #[tokio::test]
    async fn adding_over_an_existing_real_noun_conflicts() {
        let db = open_hybrid().await;
        let id = db.add(Embedding::Vector(vector(1)), BTreeMap::new(), None).await.unwrap();
        let err = db
            .add(Embedding::Vector(vector(2)), BTreeMap::new(), Some(id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn add_verb_materializes_and_add_overwrites_the_placeholder() {
        let db = open_hybrid().await;
        let source = NounId::from("alice");
        let target = NounId::from("bob");
        db.add_verb(source.clone(), target.clone(), "knows", BTreeMap::new(), None)
            .await
            .unwrap();

        let placeholder = db.get(&target).await.unwrap().unwrap();
        assert!(placeholder.metadata.is_placeholder());

        db.add(Embedding::Vector(vector(3)), BTreeMap::new(), Some(target.clone()))
            .await
            .unwrap();
        let materialized = db.get(&target).await.unwrap().unwrap();
        assert!(!materialized.metadata.is_placeholder());
        assert_eq!(materialized.vector, vector(3));
    }

    #[tokio::test]
    async fn soft_delete_tombstones_without_removing_from_storage() {
        let db = open_hybrid().await;
        let id = db.add(Embedding::Vector(vector(1)), BTreeMap::new(), None).await.unwrap();
        assert!(db.delete(&id, false).await.unwrap());
        let noun = db.get(&id).await.unwrap().unwrap();
        assert!(noun.metadata.is_tombstoned());
    }

    #[tokio::test]
    async fn search_excludes_tombstoned_and_placeholder_nouns() {
        let db = open_hybrid().await;
        let keep = db.add(Embedding::Vector(vector(1)), BTreeMap::new(), None).await.unwrap();
        let gone = db.add(Embedding::Vector(vector(2)), BTreeMap::new(), None).await.unwrap();
        db.delete(&gone, false).await.unwrap();
        db.add_verb(keep.clone(), NounId::from("ghost"), "knows", BTreeMap::new(), None)
            .await
            .unwrap();

        let outcome = db.search(&vector(1), 10, SearchOptions::default()).await.unwrap();
        let ids: Vec<_> = outcome.hits.iter().map(|h| h.id.clone()).collect();
        assert!(ids.contains(&keep));
        assert!(!ids.contains(&gone));
        assert!(!ids.contains(&NounId::from("ghost")));
    }

    #[tokio::test]
    async fn search_applies_metadata_filter() {
        let db = open_hybrid().await;
        let mut wanted_meta = BTreeMap::new();
        wanted_meta.insert("kind".to_string(), Value::from("cat"));
        let wanted = db.add(Embedding::Vector(vector(1)), wanted_meta, None).await.unwrap();

        let mut other_meta = BTreeMap::new();
        other_meta.insert("kind".to_string(), Value::from("dog"));
        db.add(Embedding::Vector(vector(1)), other_meta, None).await.unwrap();

        let filter = Filter::Eq { key: "kind".to_string(), value: Value::from("cat") };
        let options = SearchOptions { filter: Some(filter), ..Default::default() };
        let outcome = db.search(&vector(1), 10, options).await.unwrap();
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].id, wanted);
    }

    #[tokio::test]
    async fn write_only_instance_rejects_search() {
        let mut config = NoemaConfig::minimal(DIM);
        config.role = Role::Writer;
        let db = Database::open(config, None).await.unwrap();
        let err = db.search(&vector(1), 5, SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::RoleViolation(_)));
    }

    #[tokio::test]
    async fn write_only_instance_still_allows_get_direct_to_storage() {
        let mut config = NoemaConfig::minimal(DIM);
        config.role = Role::Writer;
        let db = Database::open(config, None).await.unwrap();
        let id = db.add(Embedding::Vector(vector(1)), BTreeMap::new(), None).await.unwrap();
        assert!(db.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reader_instance_rejects_add() {
        let mut config = NoemaConfig::minimal(DIM);
        config.role = Role::Reader;
        let db = Database::open(config, None).await.unwrap();
        let err = db.add(Embedding::Vector(vector(1)), BTreeMap::new(), None).await.unwrap_err();
        assert!(matches!(err, Error::RoleViolation(_)));
    }

    #[tokio::test]
    async fn clear_removes_every_noun() {
        let db = open_hybrid().await;
        let id = db.add(Embedding::Vector(vector(1)), BTreeMap::new(), None).await.unwrap();
        db.clear().await.unwrap();
        assert!(db.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let db = open_hybrid().await;
        let err = db
            .add(Embedding::Vector(vec![1.0, 2.0]), BTreeMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn add_then_get_round_trips_on_the_filesystem_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NoemaConfig::minimal(DIM);
        config.storage = noema_config::StorageConfig::Filesystem {
            root: dir.path().to_string_lossy().into_owned(),
        };
        let mut metadata = BTreeMap::new();
        metadata.insert("label".to_string(), Value::from("widget"));

        let id = {
            let db = Database::open(config.clone(), None).await.unwrap();
            db.add(Embedding::Vector(vector(1)), metadata, None).await.unwrap()
        };

        let reopened = Database::open(config, None).await.unwrap();
        let noun = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(noun.vector, vector(1));
        assert_eq!(noun.metadata.get("label"), Some(&Value::from("widget")));
    }
}
