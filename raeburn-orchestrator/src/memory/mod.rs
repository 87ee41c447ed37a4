//! Sharded persistent memory: entries, shards, blobs, and the store API.

mod blobs;
mod entry;
mod shard;
mod store;

pub use blobs::BlobStore;
pub use entry::{AddOptions, EntryPatch, MemoryEntry};
pub use shard::ShardKey;
pub use store::{MaintenanceReport, MemoryConfig, MemoryStore, SearchOptions};
