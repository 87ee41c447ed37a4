//! Error types for the memory store and the orchestration pipeline.

use thiserror::Error;

/// Failures surfaced by the sharded memory store.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// The backing store reported corruption; nothing was written.
    #[error("store corruption in shard {shard}: {detail}")]
    Corruption { shard: String, detail: String },

    /// A shard stayed locked past the busy timeout and one internal retry.
    #[error("shard {shard} locked past timeout")]
    ShardLockTimeout { shard: String },

    /// No live entry with the given id exists in any shard.
    #[error("memory entry not found: {id}")]
    NotFound { id: String },

    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A pipeline failure, tagged with the step that raised it.
#[derive(Error, Debug)]
#[error("pipeline step '{step}' failed: {source}")]
pub struct PipelineError {
    pub step: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl PipelineError {
    pub fn at(step: &'static str, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            step,
            source: Box::new(source),
        }
    }
}
