//! Hybrid vector + graph database. [`Database::open`] is the single
//! entry point: it wires together storage, the three-tier cache, the
//! HNSW index, the typed-verb graph layer, and instance coordination
//! behind the operations described by [`NoemaConfig`] (§4.G, §6).
//!
//! Re-exports the configuration and domain types callers need to open a
//! database and shape requests; everything else (`noema-index`,
//! `noema-graph`, `noema-coordinator`) is an implementation detail a
//! caller should not need to depend on directly.

pub mod budget;
pub mod database;
pub mod input;

pub use database::Database;
pub use input::{Embedding, SearchHit, SearchOptions, SearchOutcome};

pub use noema_config::{NoemaConfig, PerformanceTier, StorageConfig};
pub use noema_core::{
    DistanceMetric, Direction, Error, Filter, InstanceId, Noun, NounId, NounMetadata, Result,
    Role, Value, Verb, VerbId,
};
