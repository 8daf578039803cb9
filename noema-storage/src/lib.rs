//! ABOUTME: Storage adapters (§4.A), cache tier (§4.B), statistics store (§4.C), and WAL (§7)
//! ABOUTME: Concrete backends: in-memory, local filesystem, and S3-compatible object storage

pub mod cache;
pub mod keys;
pub mod memory;
pub mod statistics;
pub mod wal;

#[cfg(feature = "object-store")]
pub mod object_store;

pub mod filesystem;

pub use cache::CacheTier;
pub use memory::MemoryAdapter;
pub use filesystem::FilesystemAdapter;
pub use statistics::StatisticsStore;
pub use wal::WriteAheadLog;

#[cfg(feature = "object-store")]
pub use object_store::ObjectStoreAdapter;
