//! # Graph Layer
//!
//! Typed directed edges (verbs) between nouns, with adjacency queries by
//! source, target, or either direction, and placeholder-noun handling so
//! `addVerb` can reference ids that haven't been `add`-ed yet.
//!
//! ## Placeholder semantics
//!
//! `add_verb` referencing an unknown noun id creates a placeholder
//! (zero vector, `is_placeholder=true`) that participates in traversal
//! but never in similarity search. When a real [`noema_core::Noun`]
//! with the same id later arrives, the caller invokes
//! [`GraphLayer::materialize_placeholder`] to overwrite the placeholder
//! in place; existing adjacency edges are unaffected.
//!
//! ## Sidecar indexing
//!
//! `adjacency` is backed by a `source -> [verb id]` / `target -> [verb
//! id]` secondary index maintained as JSON sidecar files, since none of
//! the storage adapters this crate runs over (memory, filesystem,
//! S3-compatible object storage) offer native secondary indexing.

pub mod error;
pub mod prelude;
pub mod storage;
pub mod traits;

pub use error::{GraphError, Result};
pub use storage::GraphStore;
pub use traits::GraphLayer;
