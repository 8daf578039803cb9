//! ABOUTME: Domain types shared across the storage, index, graph, and coordinator crates
//! ABOUTME: `NounId`/`VerbId`, the dynamic `Value`, and the noun/verb/statistics/manifest/lock records

mod domain;
mod filter;
mod value;

pub use domain::{Lock, Manifest, Noun, NounMetadata, Statistics, Verb};
pub use filter::Filter;
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A finite ordered sequence of `f32`; length must equal the database's
/// fixed dimension `D` (invariant I1).
pub type Vector = Vec<f32>;

/// Opaque, content- or UUID-derived identifier for a [`Noun`](domain::Noun).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NounId(pub String);

impl NounId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NounId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NounId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NounId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier for a [`Verb`](domain::Verb).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerbId(pub String);

impl VerbId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VerbId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VerbId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier for a single database instance, used in lock
/// ownership, partition assignment, and WAL directory naming.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Distance function over [`Vector`]s. Immutable once stored in the
/// manifest (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Cosine,
    Manhattan,
    NegDot,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

impl DistanceMetric {
    /// Distance between two vectors of equal length under this metric.
    /// Lower is closer for every variant, including `NegDot` (negated dot
    /// product, so "more similar" still means "smaller distance").
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
            Self::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Self::NegDot => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (na * nb)
                }
            }
        }
    }
}

/// An instance's role determines write eligibility (§4.F, §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reader,
    Writer,
    Hybrid,
}

impl Default for Role {
    fn default() -> Self {
        Self::Hybrid
    }
}

impl Role {
    /// Whether this role may ever attempt a write (subsequent lock
    /// acquisition still gates the individual partition).
    #[must_use]
    pub const fn may_write(self) -> bool {
        matches!(self, Self::Writer | Self::Hybrid)
    }

    /// Strict write-only instances reject `search` (§4.G, scenario 3).
    #[must_use]
    pub const fn may_search(self) -> bool {
        matches!(self, Self::Reader | Self::Hybrid)
    }
}

/// Direction of adjacency traversal (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
    In,
    Any,
}
