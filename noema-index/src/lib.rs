//! # HNSW Index
//!
//! A hand-rolled hierarchical navigable small-world graph: geometric
//! insert with heuristic neighbor pruning, layer-by-layer query, soft
//! and hard delete with neighbor reconnection, and consistent-hash
//! partitioning for on-disk operation beyond the in-memory threshold
//! (§4.D).
//!
//! Built directly against [`noema_storage::CacheTier`] rather than a
//! third-party ANN crate: the delete path needs to walk and mutate
//! adjacency lists by hand to keep invariant I2 (bidirectional edges)
//! and invariant I3 (layer-0 connectivity) intact, which off-the-shelf
//! HNSW implementations don't expose.

pub mod edges;
pub mod geometry;
pub mod index;
pub mod partition;
pub mod prune;
pub mod search;

pub use index::{HnswIndex, IndexConfig};
pub use partition::{partition_for, Partition};
