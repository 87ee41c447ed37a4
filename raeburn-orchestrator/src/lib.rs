//! # Raeburn Orchestrator
//!
//! The memory and orchestration half of the Raeburn workspace: a sharded
//! persistent memory store over embedded SQLite, a context injector that
//! folds relevant memories into prompts, and the session-scoped pipeline
//! that routes an assembled prompt through the models SDK, picks a winner,
//! and records the interaction.
//!
//! ## Overview
//!
//! - **Memory store** ([`memory`]): per-agent shard files with WAL
//!   journaling and FTS5 full-text search; TTL expiry, tag and metadata
//!   filtering, soft delete, blob side files, importance decay, hybrid
//!   relevance ranking, dump/load migration, and integrity checks.
//! - **Context injector** ([`injector`]): top-k relevant memories rendered
//!   into a literal `Context:` block ahead of the prompt.
//! - **Pipeline** ([`pipeline`]): persona resolution, context injection,
//!   routing (parallel when priority demands it), judge-backed winner
//!   selection, and durable quality/interaction records. `dry-run` mode
//!   skips the interaction write.
//!
//! ## Usage
//!
//! ```rust
//! use raeburn_models_sdk::registry::ModelRegistry;
//! use raeburn_models_sdk::router::Router;
//! use raeburn_orchestrator::memory::{MemoryConfig, MemoryStore};
//! use raeburn_orchestrator::pipeline::{Orchestrator, OrchestratorTask};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ModelRegistry::load_default());
//! let store = Arc::new(MemoryStore::open(MemoryConfig::from_env())?);
//! let orchestrator = Orchestrator::new(Router::new(registry), store);
//!
//! let outcome = orchestrator.run(OrchestratorTask::new("What is Raeburn?")).await?;
//! println!("{} answered with score {:.3}", outcome.model_used, outcome.score);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod injector;
pub mod judge;
pub mod memory;
pub mod persona;
pub mod pipeline;

pub use error::{MemoryError, PipelineError};
pub use injector::ContextInjector;
pub use judge::JudgeBackend;
pub use memory::{AddOptions, EntryPatch, MemoryConfig, MemoryEntry, MemoryStore, SearchOptions};
pub use persona::{AgentPersona, PersonaRegistry};
pub use pipeline::{Orchestrator, OrchestratorMode, OrchestratorTask, RunOutcome};
