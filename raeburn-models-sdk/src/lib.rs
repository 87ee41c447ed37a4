//! # Raeburn Models SDK
//!
//! Multi-provider language-model routing: provider adapters with in-band
//! failure reporting and per-instance health, a capability-gated model
//! registry, a pure hybrid scorer, and a bias-weighted router that fans
//! prompts out and returns every candidate ranked best-first.
//!
//! ## Overview
//!
//! - **Provider adapters** ([`providers`]): one adapter per upstream kind
//!   (openai-compatible, openrouter, huggingface, ollama, local echo),
//!   each with bounded retry, exponential backoff, a hard per-attempt
//!   timeout, and health counters. Failures are returned in the response,
//!   never raised.
//! - **Model registry** ([`registry`]): descriptors loaded from
//!   `model_registry.json` plus the `models_installed.json` overlay;
//!   candidate selection gated by task bans, capability flags, role
//!   support, host allow lists, and failure thresholds. An empty result
//!   always falls back to the synthetic echo model.
//! - **Scorer** ([`scoring`]): deterministic blend of length, error-free
//!   match, prompt similarity, and inverse latency; weights configurable
//!   through `RAEBURN_SCORE_WEIGHTS`.
//! - **Router** ([`router`]): parallel or sequential dispatch with an
//!   optional fan-out deadline; score times bias multiplier (task
//!   affinity, cost, speed, health history) decides the ranking.
//!
//! ## Usage
//!
//! ```rust
//! use raeburn_models_sdk::registry::ModelRegistry;
//! use raeburn_models_sdk::router::{RouteRequest, Router};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), raeburn_models_sdk::RouterError> {
//! let registry = Arc::new(ModelRegistry::load_default());
//! let router = Router::new(registry);
//!
//! let best = router.route_first(RouteRequest::new("hello")).await?;
//! println!("{} -> {}", best.model, best.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod router;
pub mod scoring;

pub use error::RouterError;
pub use providers::{AdapterState, HealthSnapshot, ProviderAdapter, ProviderResponse};
pub use registry::{Capabilities, ModelDescriptor, ModelRegistry, ProviderKind, RouterBias, Selection};
pub use retry::{AttemptError, ExpBackoff};
pub use router::{RouteRequest, RoutedResponse, Router};
pub use scoring::{hybrid_score, sequence_ratio, ScoreWeights};

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
