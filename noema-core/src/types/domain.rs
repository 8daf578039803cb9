//! ABOUTME: Noun, Verb, Statistics, Manifest, and Lock record shapes (§3)

use super::{DistanceMetric, NounId, Value, Vector, VerbId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Reserved metadata keys recognized by the facade and index.
pub mod reserved_keys {
    pub const NOUN_TYPE: &str = "noun_type";
    pub const LABEL: &str = "label";
    pub const IS_PLACEHOLDER: &str = "is_placeholder";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const CREATED_BY: &str = "created_by";
    pub const TOMBSTONED: &str = "_tombstoned";
}

/// Free-form key/value record attached to a [`NounId`].
///
/// Backed by a `BTreeMap` so serialized output (and therefore content
/// hashing) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NounMetadata(pub BTreeMap<String, Value>);

impl NounMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.get(reserved_keys::IS_PLACEHOLDER)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.get(reserved_keys::TOMBSTONED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn mark_tombstoned(&mut self) {
        self.set(reserved_keys::TOMBSTONED, true);
    }

    pub fn stamp_created(&mut self, by: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        self.set(reserved_keys::CREATED_AT, now.clone());
        self.set(reserved_keys::UPDATED_AT, now);
        if let Some(by) = by {
            self.set(reserved_keys::CREATED_BY, by.to_string());
        }
    }

    pub fn stamp_updated(&mut self) {
        self.set(reserved_keys::UPDATED_AT, Utc::now().to_rfc3339());
    }

    fn placeholder() -> Self {
        let mut m = Self::new();
        m.set(reserved_keys::IS_PLACEHOLDER, true);
        m
    }
}

/// An indexed entity: an embedding plus its per-layer HNSW adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Noun {
    pub id: NounId,
    pub vector: Vector,
    pub metadata: NounMetadata,
    /// HNSW neighbor lists per layer; non-empty only for levels at or
    /// below this noun's assigned top layer (invariant I2).
    pub connections: BTreeMap<u8, HashSet<NounId>>,
    /// Highest layer this noun participates in.
    pub top_layer: u8,
}

impl Noun {
    #[must_use]
    pub fn new(id: NounId, vector: Vector) -> Self {
        Self {
            id,
            vector,
            metadata: NounMetadata::new(),
            connections: BTreeMap::new(),
            top_layer: 0,
        }
    }

    #[must_use]
    pub fn placeholder(id: NounId, dimension: usize) -> Self {
        Self {
            id,
            vector: vec![0.0; dimension],
            metadata: NounMetadata::placeholder(),
            connections: BTreeMap::new(),
            top_layer: 0,
        }
    }

    #[must_use]
    pub fn neighbors_at(&self, level: u8) -> &HashSet<NounId> {
        static EMPTY: std::sync::OnceLock<HashSet<NounId>> = std::sync::OnceLock::new();
        self.connections
            .get(&level)
            .unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }
}

/// A typed directed relationship between two nouns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verb {
    pub id: VerbId,
    pub source: NounId,
    pub target: NounId,
    pub verb_type: String,
    pub vector: Option<Vector>,
    pub weight: f32,
    pub metadata: NounMetadata,
    pub connections: BTreeMap<u8, HashSet<VerbId>>,
    pub top_layer: u8,
}

impl Verb {
    #[must_use]
    pub fn new(source: NounId, target: NounId, verb_type: impl Into<String>) -> Self {
        Self {
            id: VerbId::generate(),
            source,
            target,
            verb_type: verb_type.into(),
            vector: None,
            weight: 1.0,
            metadata: NounMetadata::new(),
            connections: BTreeMap::new(),
            top_layer: 0,
        }
    }
}

/// Per-day counters, reconciled across writers by "merge = max for shared
/// keys, sum for disjoint keys" (§4.C, invariant I6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub noun_count: HashMap<String, u64>,
    pub verb_count: HashMap<String, u64>,
    pub metadata_count: HashMap<String, u64>,
    pub index_size: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile `other` into `self` using the merge rule from §4.C: for a
    /// counter key present on both sides take the element-wise maximum
    /// (reconciling two writers who each observed the same global add);
    /// for a key unique to one side, sum it in (covers partition-disjoint
    /// services). Satisfies invariant I6 and property P9.
    pub fn merge(&mut self, other: &Self) {
        fn merge_map(into: &mut HashMap<String, u64>, from: &HashMap<String, u64>) {
            for (k, v) in from {
                into.entry(k.clone())
                    .and_modify(|existing| *existing = (*existing).max(*v))
                    .or_insert(*v);
            }
        }
        merge_map(&mut self.noun_count, &other.noun_count);
        merge_map(&mut self.verb_count, &other.verb_count);
        merge_map(&mut self.metadata_count, &other.metadata_count);
        self.index_size = self.index_size.max(other.index_size);
        self.last_updated = match (self.last_updated, other.last_updated) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
    }
}

/// Versioned geometry and partition-layout record, stored once per
/// database at `/manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u64,
    pub dimension: usize,
    pub distance: DistanceMetric,
    pub m: u32,
    pub ef_construction: u32,
    /// `instance_id -> [partition ids it owns]`.
    pub assignments: BTreeMap<String, Vec<u32>>,
    pub partition_count: u32,
}

impl Manifest {
    #[must_use]
    pub fn new(dimension: usize, distance: DistanceMetric, m: u32, ef_construction: u32) -> Self {
        Self {
            version: 0,
            dimension,
            distance,
            m,
            ef_construction,
            assignments: BTreeMap::new(),
            partition_count: 1,
        }
    }

    pub fn bump(&mut self) {
        self.version += 1;
    }
}

/// `{owner, acquired_at, ttl_ms}` stored at `/locks/<key>.lock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl Lock {
    #[must_use]
    pub fn new(owner: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            owner: owner.into(),
            acquired_at: Utc::now(),
            ttl_ms,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.acquired_at + chrono::Duration::milliseconds(self.ttl_ms as i64)
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.expires_at() < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_merge_is_max_for_shared_keys() {
        let mut a = Statistics::new();
        a.noun_count.insert("writer-1".into(), 10);
        let mut b = Statistics::new();
        b.noun_count.insert("writer-1".into(), 7);
        a.merge(&b);
        assert_eq!(a.noun_count["writer-1"], 10);
    }

    #[test]
    fn statistics_merge_sums_disjoint_keys() {
        let mut a = Statistics::new();
        a.noun_count.insert("writer-1".into(), 10);
        let mut b = Statistics::new();
        b.noun_count.insert("writer-2".into(), 5);
        a.merge(&b);
        assert_eq!(a.noun_count["writer-1"], 10);
        assert_eq!(a.noun_count["writer-2"], 5);
    }

    #[test]
    fn placeholder_noun_is_marked() {
        let n = Noun::placeholder(NounId::from("p1"), 3);
        assert!(n.metadata.is_placeholder());
        assert_eq!(n.vector, vec![0.0, 0.0, 0.0]);
    }
}
