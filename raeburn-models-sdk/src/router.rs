//! # Bias-weighted Router
//!
//! Fans a prompt out to the registry's selected adapters, scores every
//! response, applies the per-model bias multiplier, and returns the full
//! candidate list ranked best-first.
//!
//! ## Guarantees
//!
//! - **Never empty**: selection falls back to the echo model, so every
//!   route call yields at least one candidate.
//! - **No adapter failure escapes**: a failed or panicked dispatch becomes
//!   a synthesized error response that is scored like any other (its match
//!   sub-score collapses to zero, so it sinks in the ranking).
//! - **Stable ties**: equal final scores keep registry insertion order.
//! - **Deadline**: an optional caller deadline cancels outstanding
//!   dispatches; cancelled candidates carry `error = "cancelled"`.
//!
//! The core API is async. `route_blocking` is the one sync entry point,
//! run on a dedicated thread with its own runtime so it is safe to call
//! even from code already inside a tokio runtime.

use crate::error::RouterError;
use crate::providers::{HealthSnapshot, ProviderAdapter, ProviderResponse};
use crate::registry::{ModelDescriptor, ModelRegistry, Selection};
use crate::scoring::{hybrid_score, ScoreWeights};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One routing request. `parallel` defaults on; `deadline` bounds the whole
/// fan-out.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub prompt: String,
    pub session_id: String,
    pub parallel: bool,
    pub limit_models: Option<usize>,
    pub task: Option<String>,
    pub require_json: bool,
    pub require_streaming: bool,
    pub required_roles: Option<Vec<String>>,
    pub deadline: Option<Duration>,
}

impl RouteRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: "default".to_string(),
            parallel: true,
            limit_models: None,
            task: None,
            require_json: false,
            require_streaming: false,
            required_roles: None,
            deadline: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    fn selection(&self) -> Selection {
        Selection {
            limit: self.limit_models,
            task: self.task.clone(),
            require_json: self.require_json,
            require_streaming: self.require_streaming,
            required_roles: self.required_roles.clone(),
        }
    }
}

/// A scored candidate. `raw` keeps the full provider response for callers
/// that need the health snapshot.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub model: String,
    pub content: String,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub raw: ProviderResponse,
    pub score: f64,
}

pub struct Router {
    registry: Arc<ModelRegistry>,
    weights: ScoreWeights,
}

impl Router {
    /// Router over a registry, scoring weights from the environment.
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            weights: ScoreWeights::from_env(),
        }
    }

    pub fn with_weights(registry: Arc<ModelRegistry>, weights: ScoreWeights) -> Self {
        Self { registry, weights }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Route a prompt and return all candidates, best first.
    pub async fn route(&self, request: RouteRequest) -> Result<Vec<RoutedResponse>, RouterError> {
        if request.prompt.trim().is_empty() {
            return Err(RouterError::bad_request("prompt must not be empty"));
        }
        if request.limit_models == Some(0) {
            return Err(RouterError::bad_request("limit_models must be positive"));
        }

        let adapters = self.registry.choose(&request.selection());
        if (request.require_json || request.require_streaming)
            && adapters.len() == 1
            && adapters[0].name() == "local-echo"
        {
            tracing::warn!(
                session = %request.session_id,
                "capability-gated selection fell back to local-echo, which may not satisfy the requested capability"
            );
        }

        let deadline = request.deadline.map(|d| Instant::now() + d);
        let responses = if request.parallel {
            self.dispatch_parallel(&adapters, &request, deadline).await
        } else {
            self.dispatch_sequential(&adapters, &request, deadline).await
        };

        let mut routed: Vec<RoutedResponse> = adapters
            .iter()
            .zip(responses)
            .map(|(adapter, response)| {
                let base = hybrid_score(&request.prompt, &response, &self.weights);
                let bias = bias_multiplier(
                    adapter.descriptor(),
                    &response.health,
                    adapter.state().last_passed_health().is_some(),
                    request.task.as_deref(),
                );
                RoutedResponse {
                    model: response.model.clone(),
                    content: response.content.clone(),
                    latency_ms: response.latency_ms,
                    error: response.error.clone(),
                    raw: response,
                    score: base * bias,
                }
            })
            .collect();

        // Stable sort keeps registry order on score ties.
        routed.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(routed)
    }

    /// Convenience wrapper returning the top-ranked candidate.
    pub async fn route_first(&self, request: RouteRequest) -> Result<RoutedResponse, RouterError> {
        let mut ranked = self.route(request).await?;
        if ranked.is_empty() {
            // Unreachable by construction; guard anyway.
            return Err(RouterError::runtime("routing produced no candidates"));
        }
        Ok(ranked.remove(0))
    }

    /// Blocking entry point for non-async callers. Runs the route on a
    /// dedicated thread with its own current-thread runtime, so calling it
    /// from inside another runtime cannot deadlock that runtime's reactor.
    pub fn route_blocking(
        &self,
        request: RouteRequest,
    ) -> Result<Vec<RoutedResponse>, RouterError> {
        let registry = Arc::clone(&self.registry);
        let weights = self.weights;
        std::thread::scope(|scope| {
            scope
                .spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| RouterError::runtime(format!("runtime build failed: {e}")))?;
                    runtime.block_on(Router { registry, weights }.route(request))
                })
                .join()
                .unwrap_or_else(|_| Err(RouterError::runtime("routing thread panicked")))
        })
    }

    async fn dispatch_parallel(
        &self,
        adapters: &[Arc<dyn ProviderAdapter>],
        request: &RouteRequest,
        deadline: Option<Instant>,
    ) -> Vec<ProviderResponse> {
        let handles: Vec<_> = adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let prompt = request.prompt.clone();
                let session_id = request.session_id.clone();
                tokio::spawn(async move { adapter.generate(&prompt, &session_id).await })
            })
            .collect();

        let results = join_all(handles.into_iter().zip(adapters).map(|(handle, adapter)| {
            let adapter = Arc::clone(adapter);
            async move {
                join_with_deadline(handle, deadline)
                    .await
                    .unwrap_or_else(|error| synthesized_error(adapter.as_ref(), error))
            }
        }))
        .await;
        results
    }

    async fn dispatch_sequential(
        &self,
        adapters: &[Arc<dyn ProviderAdapter>],
        request: &RouteRequest,
        deadline: Option<Instant>,
    ) -> Vec<ProviderResponse> {
        let mut responses = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let expired = deadline.map(|d| Instant::now() >= d).unwrap_or(false);
            if expired {
                responses.push(synthesized_error(adapter.as_ref(), "cancelled".to_string()));
                continue;
            }
            let cloned = Arc::clone(adapter);
            let prompt = request.prompt.clone();
            let session_id = request.session_id.clone();
            let handle = tokio::spawn(async move { cloned.generate(&prompt, &session_id).await });
            let joined = join_with_deadline(handle, deadline).await;
            responses.push(joined.unwrap_or_else(|error| synthesized_error(adapter.as_ref(), error)));
        }
        responses
    }
}

/// Await a dispatch, cancelling the underlying task if the deadline fires
/// first.
async fn join_with_deadline(
    handle: tokio::task::JoinHandle<ProviderResponse>,
    deadline: Option<Instant>,
) -> Result<ProviderResponse, String> {
    match deadline {
        Some(deadline) => {
            let abort = handle.abort_handle();
            match tokio::time::timeout_at(deadline.into(), handle).await {
                Ok(joined) => joined.map_err(|e| join_error_text(&e)),
                Err(_) => {
                    abort.abort();
                    Err("cancelled".to_string())
                }
            }
        }
        None => handle.await.map_err(|e| join_error_text(&e)),
    }
}

fn join_error_text(error: &tokio::task::JoinError) -> String {
    if error.is_panic() {
        format!("dispatch panicked: {error}")
    } else {
        "cancelled".to_string()
    }
}

/// Stand-in response for a dispatch that never completed (panic, deadline).
/// Scored normally; its zero match sub-score sinks it.
fn synthesized_error(adapter: &dyn ProviderAdapter, error: String) -> ProviderResponse {
    ProviderResponse {
        model: adapter.name().to_string(),
        content: String::new(),
        latency_ms: 0,
        error: Some(error),
        health: adapter.state().snapshot(),
    }
}

/// Task-, cost-, speed-, and health-derived multiplier applied on top of
/// the base hybrid score.
fn bias_multiplier(
    descriptor: &ModelDescriptor,
    health: &HealthSnapshot,
    passed_health_before: bool,
    task: Option<&str>,
) -> f64 {
    let mut bias = 1.0;
    if let Some(task) = task {
        let contains = |tags: &[String]| tags.iter().any(|t| t == task);
        if contains(&descriptor.router_bias.prefer_for) {
            bias *= 1.2;
        }
        if contains(&descriptor.router_bias.avoid_for) {
            bias *= 0.7;
        }
        if contains(&descriptor.strengths) {
            bias *= 1.15;
        }
        if contains(&descriptor.weaknesses) {
            bias *= 0.85;
        }
    }
    bias *= 1.0 / (1.0 + descriptor.cost_usd_per_1k.max(0.0));
    if descriptor.speed_tps_estimate > 0.0 {
        bias *= 1.0 + descriptor.speed_tps_estimate.min(100.0) / 1000.0;
    }
    if health.failure_count > 0 {
        bias *= (1.0 - 0.1 * health.failure_count as f64).max(0.2);
    }
    if !health.health_ok {
        bias *= 0.8;
    }
    if !passed_health_before {
        bias *= 0.9;
    }
    bias
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> ModelDescriptor {
        let mut d = ModelDescriptor::local_echo();
        d.name = name.to_string();
        d
    }

    fn healthy() -> HealthSnapshot {
        HealthSnapshot {
            health_ok: true,
            failure_count: 0,
            recent_latency_ms: 0.0,
        }
    }

    #[test]
    fn failure_count_only_lowers_bias() {
        let d = descriptor("m");
        let mut previous = f64::MAX;
        for failures in 0..20 {
            let bias = bias_multiplier(
                &d,
                &HealthSnapshot {
                    health_ok: true,
                    failure_count: failures,
                    recent_latency_ms: 0.0,
                },
                true,
                None,
            );
            assert!(bias <= previous);
            previous = bias;
        }
    }

    #[test]
    fn failure_penalty_floors_at_one_fifth() {
        let d = descriptor("m");
        let heavy = bias_multiplier(
            &d,
            &HealthSnapshot {
                health_ok: true,
                failure_count: 100,
                recent_latency_ms: 0.0,
            },
            true,
            None,
        );
        assert!((heavy - 0.2).abs() < 1e-9);
    }

    #[test]
    fn cost_demotes_and_speed_promotes() {
        let mut cheap = descriptor("cheap");
        cheap.speed_tps_estimate = 100.0;
        let mut costly = descriptor("costly");
        costly.cost_usd_per_1k = 1.0;

        let cheap_bias = bias_multiplier(&cheap, &healthy(), true, None);
        let costly_bias = bias_multiplier(&costly, &healthy(), true, None);
        assert!(cheap_bias > costly_bias);
        // Speed bonus saturates at 100 tps.
        let mut faster = cheap.clone();
        faster.speed_tps_estimate = 500.0;
        assert!((bias_multiplier(&faster, &healthy(), true, None) - cheap_bias).abs() < 1e-12);
    }

    #[test]
    fn task_affinity_tags_apply() {
        let mut d = descriptor("m");
        d.router_bias.prefer_for = vec!["code".to_string()];
        d.strengths = vec!["code".to_string()];
        let with_task = bias_multiplier(&d, &healthy(), true, Some("code"));
        let without = bias_multiplier(&d, &healthy(), true, None);
        assert!((with_task / without - 1.2 * 1.15).abs() < 1e-9);
    }

    #[test]
    fn unprobed_adapter_pays_ten_percent() {
        let d = descriptor("m");
        let probed = bias_multiplier(&d, &healthy(), true, None);
        let unprobed = bias_multiplier(&d, &healthy(), false, None);
        assert!((unprobed / probed - 0.9).abs() < 1e-9);
    }
}
