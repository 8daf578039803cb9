//! ABOUTME: HNSW index facade: insert, search, soft/hard delete, partitioned lookup (§4.D)

use crate::edges::{connect, disconnect};
use crate::geometry::Candidate;
use crate::partition::{partition_for, Partition};
use crate::prune::select_neighbors_heuristic;
use crate::search::{greedy_descend, search_layer};
use dashmap::DashMap;
use noema_core::{DistanceMetric, Error, Noun, NounId, Result};
use noema_storage::{CacheTier, WriteAheadLog};
use std::sync::Arc;

/// Immutable geometry, fixed for the lifetime of a database (manifest-stored).
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub dimension: usize,
    pub distance: DistanceMetric,
    pub m: u32,
    pub ef_construction: u32,
    pub partition_count: u32,
}

/// Below this neighbor degree a hard delete triggers reconnection to
/// keep the layer-0 graph connected (invariant I3).
const RECONNECT_THRESHOLD: usize = 2;

pub struct HnswIndex {
    cache: Arc<CacheTier>,
    storage: Arc<dyn noema_core::StorageAdapter>,
    wal: Option<Arc<WriteAheadLog>>,
    config: IndexConfig,
    partitions: DashMap<u32, Arc<Partition>>,
}

impl HnswIndex {
    #[must_use]
    pub fn new(
        cache: Arc<CacheTier>,
        storage: Arc<dyn noema_core::StorageAdapter>,
        wal: Option<Arc<WriteAheadLog>>,
        config: IndexConfig,
    ) -> Self {
        Self {
            cache,
            storage,
            wal,
            config,
            partitions: DashMap::new(),
        }
    }

    async fn partition(&self, id: u32) -> Result<Arc<Partition>> {
        if let Some(p) = self.partitions.get(&id) {
            return Ok(p.clone());
        }
        let partition = Arc::new(Partition::load(self.storage.clone(), id).await?);
        self.partitions.insert(id, partition.clone());
        Ok(partition)
    }

    fn level_mult(&self) -> f64 {
        1.0 / f64::from(self.config.m).max(2.0).ln()
    }

    /// Sample a node's top layer: `⌊-ln(U(0,1)) · level_mult⌋` (§4.D).
    fn sample_level(&self) -> u8 {
        let u: f64 = rand::random::<f64>().max(f64::EPSILON);
        let level = (-u.ln() * self.level_mult()).floor();
        level.clamp(0.0, 63.0) as u8
    }

    fn m_max(&self, level: u8) -> usize {
        if level == 0 {
            (self.config.m as usize) * 2
        } else {
            self.config.m as usize
        }
    }

    /// Insert a new noun. Caller must have validated it doesn't already
    /// exist (re-inserting an id is `materialize_placeholder`'s job, not
    /// this one).
    pub async fn insert(&self, mut noun: Noun) -> Result<()> {
        if noun.vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: noun.vector.len(),
            });
        }

        let partition_id = partition_for(&noun.id, self.config.partition_count);
        let partition = self.partition(partition_id).await?;

        let wal_seq = match &self.wal {
            Some(wal) => Some(
                wal.append(
                    "index_insert",
                    serde_json::json!({"id": noun.id.as_str(), "partition": partition_id}),
                )
                .await?,
            ),
            None => None,
        };

        let query = noun.vector.clone();
        let id = noun.id.clone();
        let top_layer = self.sample_level();
        noun.top_layer = top_layer;
        // Persist the orphan node before touching any edges: a crash
        // past this point leaves a node with no edges, which the WAL
        // replay on restart must finish connecting (§4.D "Failure
        // semantics").
        self.cache.put_noun(&noun).await?;

        let resolved_entry = match partition.entry_point().await {
            Some(entry_id) => match self.cache.get_noun(&entry_id).await? {
                Some(entry_noun) => Some((entry_id, entry_noun)),
                None => {
                    tracing::warn!(
                        entity = %entry_id,
                        partition = partition_id,
                        "partition entry point missing from storage, reseeding with new node"
                    );
                    partition.set_entry_point(None).await?;
                    None
                }
            },
            None => None,
        };

        match resolved_entry {
            None => {
                partition.set_entry_point(Some(id.clone())).await?;
                partition.add_member(id.clone()).await?;
            }
            Some((entry_id, entry_noun)) => {
                let entry_top_layer = entry_noun.top_layer;

                let mut current = Candidate::new(
                    self.config.distance.distance(&query, &entry_noun.vector),
                    entry_id.clone(),
                );
                for level in ((top_layer + 1)..=entry_top_layer).rev() {
                    current = greedy_descend(&self.cache, self.config.distance, &query, current, level).await?;
                }

                let mut entry_points = vec![current.id.clone()];
                let top = top_layer.min(entry_top_layer);
                for level in (0..=top).rev() {
                    let candidates = search_layer(
                        &self.cache,
                        self.config.distance,
                        &query,
                        &entry_points,
                        self.config.ef_construction as usize,
                        level,
                    )
                    .await?;

                    let selected = select_neighbors_heuristic(
                        &self.cache,
                        self.config.distance,
                        &candidates,
                        self.config.m as usize,
                    )
                    .await?;

                    for neighbor_id in &selected {
                        connect(&self.cache, &id, neighbor_id, level).await?;
                        self.reprune_if_overflowing(neighbor_id, level).await?;
                    }

                    entry_points = candidates.into_iter().map(|c| c.id).collect();
                    if entry_points.is_empty() {
                        entry_points = vec![id.clone()];
                    }
                }

                if top_layer > entry_top_layer {
                    partition.set_entry_point(Some(id.clone())).await?;
                }
                partition.add_member(id.clone()).await?;
            }
        }

        if let Some(seq) = wal_seq {
            if let Some(wal) = &self.wal {
                wal.truncate_through(seq).await?;
            }
        }
        Ok(())
    }

    async fn reprune_if_overflowing(&self, id: &NounId, level: u8) -> Result<()> {
        let m_max = self.m_max(level);
        let Some(noun) = self.cache.get_noun(id).await? else {
            return Ok(());
        };
        let neighbors: Vec<NounId> = noun.neighbors_at(level).iter().cloned().collect();
        if neighbors.len() <= m_max {
            return Ok(());
        }

        let mut candidates = Vec::with_capacity(neighbors.len());
        for neighbor_id in &neighbors {
            if let Some(neighbor) = self.cache.get_noun(neighbor_id).await? {
                let d = self.config.distance.distance(&noun.vector, &neighbor.vector);
                candidates.push(Candidate::new(d, neighbor_id.clone()));
            }
        }

        let selected = select_neighbors_heuristic(&self.cache, self.config.distance, &candidates, m_max).await?;
        let selected_set: std::collections::HashSet<_> = selected.iter().collect();
        for dropped in neighbors.iter().filter(|n| !selected_set.contains(n)) {
            disconnect(&self.cache, id, dropped, level).await?;
        }
        Ok(())
    }

    /// Layer-by-layer 1-best descent then a layer-0 beam search
    /// (§4.D "Query"). Filters tombstoned and placeholder nouns from the
    /// returned results (invariant I5) without pruning them from
    /// traversal — the graph must stay connected.
    pub async fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(NounId, f32)>> {
        if query.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }

        let mut merged: Vec<Candidate> = Vec::new();
        for partition_id in 0..self.config.partition_count.max(1) {
            let partition = self.partition(partition_id).await?;
            let Some(entry_id) = partition.entry_point().await else {
                continue;
            };
            let Some(entry_noun) = self.cache.get_noun(&entry_id).await? else {
                continue;
            };
            let mut current = Candidate::new(
                self.config.distance.distance(query, &entry_noun.vector),
                entry_id.clone(),
            );
            for level in (1..=entry_noun.top_layer).rev() {
                current = greedy_descend(&self.cache, self.config.distance, query, current, level).await?;
            }
            let layer0 = search_layer(
                &self.cache,
                self.config.distance,
                query,
                &[current.id],
                ef_search.max(k),
                0,
            )
            .await?;
            merged.extend(layer0);
        }

        merged.sort();
        let mut results = Vec::with_capacity(k);
        for candidate in merged {
            if results.len() >= k {
                break;
            }
            let Some(noun) = self.cache.get_noun(&candidate.id).await? else {
                continue;
            };
            if noun.metadata.is_placeholder() || noun.metadata.is_tombstoned() {
                continue;
            }
            results.push((candidate.id, candidate.distance));
        }
        Ok(results)
    }

    /// Soft delete: tombstone the metadata, keep adjacency intact so
    /// the layer-0 graph remains connected (§4.D "Delete").
    pub async fn soft_delete(&self, id: &NounId) -> Result<bool> {
        let Some(mut noun) = self.cache.get_noun(id).await? else {
            return Ok(false);
        };
        noun.metadata.mark_tombstoned();
        self.cache.put_noun(&noun).await?;
        Ok(true)
    }

    /// Hard delete: remove the node, drop every back-edge, reconnect any
    /// neighbor whose degree falls below the reconnection threshold, and
    /// promote a new entry point if the deleted node held it (§4.D "Delete").
    pub async fn hard_delete(&self, id: &NounId) -> Result<bool> {
        let Some(noun) = self.cache.get_noun(id).await? else {
            return Ok(false);
        };
        let partition_id = partition_for(id, self.config.partition_count);
        let partition = self.partition(partition_id).await?;

        for (&level, neighbors) in &noun.connections {
            let neighbor_ids: Vec<NounId> = neighbors.iter().cloned().collect();
            for neighbor_id in &neighbor_ids {
                disconnect(&self.cache, id, neighbor_id, level).await?;
                let Some(neighbor) = self.cache.get_noun(neighbor_id).await? else {
                    continue;
                };
                if neighbor.neighbors_at(level).len() < RECONNECT_THRESHOLD {
                    let others: Vec<&NounId> = neighbor_ids.iter().filter(|n| *n != neighbor_id).collect();
                    if let Some(nearest) = self.nearest_of(&neighbor.vector, &others).await? {
                        connect(&self.cache, neighbor_id, &nearest, level).await?;
                    }
                }
            }
        }

        self.cache.invalidate(id).await;
        self.storage.delete(&noema_storage::keys::noun(id.as_str())).await?;
        partition.remove_member(id).await?;

        if partition.entry_point().await.as_ref() == Some(id) {
            let replacement = self.promote_entry_point(&partition).await?;
            partition.set_entry_point(replacement).await?;
        }
        Ok(true)
    }

    async fn nearest_of(&self, vector: &[f32], candidates: &[&NounId]) -> Result<Option<NounId>> {
        let mut best: Option<(f32, NounId)> = None;
        for id in candidates {
            let Some(noun) = self.cache.get_noun(id).await? else {
                continue;
            };
            let d = self.config.distance.distance(vector, &noun.vector);
            if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
                best = Some((d, (*id).clone()));
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    async fn promote_entry_point(&self, partition: &Partition) -> Result<Option<NounId>> {
        let members = partition.members().await;
        let mut best: Option<(u8, NounId)> = None;
        for id in members {
            let Some(noun) = self.cache.get_noun(&id).await? else {
                continue;
            };
            if best.as_ref().map_or(true, |(layer, _)| noun.top_layer > *layer) {
                best = Some((noun.top_layer, id));
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    /// Finish connecting a node that was persisted by [`Self::insert`] but
    /// never got edges wired in because the process crashed in between
    /// (§4.D "Failure semantics"). A no-op if the node already has
    /// neighbors or no longer exists. Called from WAL replay at startup.
    pub async fn reconnect_orphan(&self, id: &NounId) -> Result<()> {
        let Some(noun) = self.cache.get_noun(id).await? else {
            return Ok(());
        };
        if !noun.connections.is_empty() {
            return Ok(());
        }

        let partition_id = partition_for(id, self.config.partition_count);
        let partition = self.partition(partition_id).await?;
        let Some(entry_id) = partition.entry_point().await else {
            partition.set_entry_point(Some(id.clone())).await?;
            partition.add_member(id.clone()).await?;
            return Ok(());
        };
        if &entry_id == id {
            return Ok(());
        }

        let entry_noun = match self.cache.get_noun(&entry_id).await? {
            Some(noun) => noun,
            None => {
                tracing::warn!(
                    entity = %entry_id,
                    partition = partition_id,
                    "partition entry point missing from storage, reseeding with orphan"
                );
                partition.set_entry_point(Some(id.clone())).await?;
                partition.add_member(id.clone()).await?;
                return Ok(());
            }
        };
        let entry_top_layer = entry_noun.top_layer;
        let query = noun.vector.clone();
        let top_layer = noun.top_layer;

        let mut current = Candidate::new(self.config.distance.distance(&query, &entry_noun.vector), entry_id);
        for level in ((top_layer + 1)..=entry_top_layer).rev() {
            current = greedy_descend(&self.cache, self.config.distance, &query, current, level).await?;
        }

        let mut entry_points = vec![current.id];
        let top = top_layer.min(entry_top_layer);
        for level in (0..=top).rev() {
            let candidates = search_layer(
                &self.cache,
                self.config.distance,
                &query,
                &entry_points,
                self.config.ef_construction as usize,
                level,
            )
            .await?;
            let selected = select_neighbors_heuristic(&self.cache, self.config.distance, &candidates, self.config.m as usize).await?;
            for neighbor_id in &selected {
                connect(&self.cache, id, neighbor_id, level).await?;
                self.reprune_if_overflowing(neighbor_id, level).await?;
            }
            entry_points = candidates.into_iter().map(|c| c.id).collect();
            if entry_points.is_empty() {
                entry_points = vec![id.clone()];
            }
        }

        if top_layer > entry_top_layer {
            partition.set_entry_point(Some(id.clone())).await?;
        }
        partition.add_member(id.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_storage::cache::CacheSizing;
    use noema_storage::MemoryAdapter;
    use proptest::prelude::*;

    fn config() -> IndexConfig {
        IndexConfig {
            dimension: 2,
            distance: DistanceMetric::Euclidean,
            m: 4,
            ef_construction: 20,
            partition_count: 1,
        }
    }

    fn make_index() -> HnswIndex {
        let storage = Arc::new(MemoryAdapter::new());
        let cache = Arc::new(CacheTier::new(
            storage.clone(),
            CacheSizing::from_budget(1 << 20, noema_core::Role::Hybrid, 64),
        ));
        HnswIndex::new(cache, storage, None, config())
    }

    #[tokio::test]
    async fn insert_then_search_finds_exact_match() {
        let index = make_index();
        for (id, x, y) in [("a", 0.0, 0.0), ("b", 10.0, 10.0), ("c", 20.0, 20.0)] {
            index.insert(Noun::new(NounId::from(id), vec![x, y])).await.unwrap();
        }
        let results = index.search(&[10.1, 9.9], 1, 10).await.unwrap();
        assert_eq!(results[0].0, NounId::from("b"));
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let index = make_index();
        let err = index
            .insert(Noun::new(NounId::from("bad"), vec![1.0, 2.0, 3.0]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn soft_deleted_noun_is_excluded_from_search_results() {
        let index = make_index();
        index.insert(Noun::new(NounId::from("a"), vec![0.0, 0.0])).await.unwrap();
        index.insert(Noun::new(NounId::from("b"), vec![1.0, 1.0])).await.unwrap();
        index.soft_delete(&NounId::from("a")).await.unwrap();
        let results = index.search(&[0.0, 0.0], 5, 10).await.unwrap();
        assert!(results.iter().all(|(id, _)| id != &NounId::from("a")));
    }

    #[tokio::test]
    async fn hard_delete_removes_node_and_promotes_entry_point_if_needed() {
        let index = make_index();
        for (id, x) in [("a", 0.0), ("b", 1.0), ("c", 2.0)] {
            index.insert(Noun::new(NounId::from(id), vec![x, 0.0])).await.unwrap();
        }
        let partition = index.partition(0).await.unwrap();
        let entry = partition.entry_point().await.unwrap();
        assert!(index.hard_delete(&entry).await.unwrap());
        assert!(index.cache.get_noun(&entry).await.unwrap().is_none());
        assert!(partition.entry_point().await.is_some());
    }

    #[tokio::test]
    async fn reconnect_orphan_wires_up_a_noun_persisted_without_edges() {
        let index = make_index();
        index.insert(Noun::new(NounId::from("a"), vec![0.0, 0.0])).await.unwrap();
        index.insert(Noun::new(NounId::from("b"), vec![1.0, 1.0])).await.unwrap();

        let orphan = Noun::new(NounId::from("c"), vec![2.0, 2.0]);
        index.cache.put_noun(&orphan).await.unwrap();
        index.reconnect_orphan(&NounId::from("c")).await.unwrap();

        let reloaded = index.cache.get_noun(&NounId::from("c")).await.unwrap().unwrap();
        assert!(!reloaded.connections.is_empty());
    }

    #[tokio::test]
    async fn reconnect_orphan_is_a_noop_for_an_already_connected_noun() {
        let index = make_index();
        index.insert(Noun::new(NounId::from("a"), vec![0.0, 0.0])).await.unwrap();
        index.insert(Noun::new(NounId::from("b"), vec![1.0, 1.0])).await.unwrap();
        index.reconnect_orphan(&NounId::from("b")).await.unwrap();
        let reloaded = index.cache.get_noun(&NounId::from("b")).await.unwrap().unwrap();
        assert!(!reloaded.connections.is_empty());
    }

    async fn assert_bidirectional(index: &HnswIndex, ids: &[NounId]) {
        for id in ids {
            let noun = index.cache.get_noun(id).await.unwrap().unwrap();
            for (&level, neighbors) in &noun.connections {
                for neighbor_id in neighbors {
                    let neighbor = index.cache.get_noun(neighbor_id).await.unwrap().unwrap();
                    assert!(
                        neighbor.neighbors_at(level).contains(id),
                        "{id} -> {neighbor_id} at level {level} has no back-edge"
                    );
                    assert!(level <= noun.top_layer.min(neighbor.top_layer));
                }
            }
        }
    }

    proptest! {
        #[test]
        fn dimension_is_preserved_across_insert_and_reload(
            x in -100.0f32..100.0, y in -100.0f32..100.0,
        ) {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let index = make_index();
                index.insert(Noun::new(NounId::from("p"), vec![x, y])).await.unwrap();
                let reloaded = index.cache.get_noun(&NounId::from("p")).await.unwrap().unwrap();
                prop_assert_eq!(reloaded.vector.len(), 2);
                Ok(())
            })?;
        }

        #[test]
        fn adjacency_stays_bidirectional_after_arbitrary_inserts_and_deletes(
            points in proptest::collection::vec((-50.0f32..50.0, -50.0f32..50.0), 3..16),
            delete_every_third in any::<bool>(),
        ) {
            tokio::runtime::Runtime::new().unwrap().block_on(async {
                let index = make_index();
                let mut ids = Vec::new();
                for (i, (x, y)) in points.iter().enumerate() {
                    let id = NounId::from(format!("n{i}"));
                    index.insert(Noun::new(id.clone(), vec![*x, *y])).await.unwrap();
                    ids.push(id);
                }
                if delete_every_third {
                    for (i, id) in ids.iter().enumerate() {
                        if i % 3 == 0 {
                            index.hard_delete(id).await.unwrap();
                        }
                    }
                    let mut survivors = Vec::new();
                    for id in ids {
                        if index.cache.get_noun(&id).await.unwrap().is_some() {
                            survivors.push(id);
                        }
                    }
                    ids = survivors;
                }
                assert_bidirectional(&index, &ids).await;
                Ok(())
            })?;
        }
    }
}
