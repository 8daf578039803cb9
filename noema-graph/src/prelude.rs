//! Common imports for the graph layer

pub use crate::error::{GraphError, Result};
pub use crate::storage::GraphStore;
pub use crate::traits::GraphLayer;
