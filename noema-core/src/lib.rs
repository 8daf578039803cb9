//! ABOUTME: Foundation layer for noema: domain types, error taxonomy, and the storage contract
//! ABOUTME: Every other noema crate depends on this one; it depends on nothing noema-specific

pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Embed, SizeEstimate, StorageAdapter};
pub use types::{
    DistanceMetric, Direction, Filter, InstanceId, Lock, Manifest, Noun, NounId, NounMetadata,
    Role, Statistics, Value, Verb, Vector, VerbId,
};
