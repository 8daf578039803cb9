//! Instance-role coordination: the distributed lock protocol, the
//! consistent-hash ring that assigns partitions to writers, and the
//! manifest store/watcher readers use to stay current with schema and
//! assignment changes (§4.F).
//!
//! A writer or hybrid instance owns a [`Coordinator`], acquires a
//! partition's lock before writing to it, and refreshes that lock on a
//! timer for as long as it holds the partition. A reader instance never
//! locks anything; it only runs a [`ManifestWatcher`] so its cache gets
//! invalidated when another instance advances the manifest.

pub mod coordinator;
pub mod lock;
pub mod manifest;
pub mod ring;

pub use coordinator::Coordinator;
pub use lock::LockManager;
pub use manifest::{default_instance_id, ManifestStore, ManifestWatcher};
pub use ring::assign_partitions;
