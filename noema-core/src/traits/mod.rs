//! ABOUTME: Trait seams implemented by the storage, index, graph, and coordinator crates

pub mod embed;
pub mod storage;

pub use embed::Embed;
pub use storage::{SizeEstimate, StorageAdapter};
