//! ABOUTME: Error taxonomy shared across every noema crate
//! ABOUTME: Provides `Error` and the crate-wide `Result` alias

use thiserror::Error;

/// The full error taxonomy for noema operations.
///
/// Variants map directly onto the propagation policy each call site is
/// expected to follow: `Transient` and `Conflict` are retried by the layer
/// that raised them before ever reaching a caller; `Corruption` causes the
/// offending entity to be quarantined and the operation to report
/// `NotFound` instead of surfacing this variant; the rest are terminal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("role violation: {0}")]
    RoleViolation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("corruption detected in {entity}: {reason}")]
    Corruption { entity: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for errors the adapter layer should retry with backoff (§7).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict(_))
    }

    #[must_use]
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(id.to_string())
    }

    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Convenience `Result` alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
