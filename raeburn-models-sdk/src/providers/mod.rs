//! # Provider Adapters
//!
//! One adapter per upstream generation endpoint, behind a small common
//! trait. The contract is deliberately narrow:
//!
//! - **In-band failure**: `generate` always returns a [`ProviderResponse`];
//!   upstream trouble lands in its `error` field and is never raised. The
//!   router turns an error into a zero match sub-score instead of an
//!   exception path.
//! - **Per-instance health**: each adapter owns an [`AdapterState`] with a
//!   monotonic failure counter (one tick per failed HTTP attempt), an
//!   `health_ok` flag cleared on terminal failure and restored by a single
//!   success, and an EWMA of observed latency (alpha 0.2, seeded with the
//!   first sample). Nothing is shared across adapters.
//! - **Credential-missing fallback**: when an upstream needs credentials
//!   that are not configured, the adapter answers immediately with the
//!   literal `"<prompt> - <provider>"` content and `error =
//!   "missing_credentials"`, an honestly low-value candidate the scorer can
//!   still rank.
//!
//! Construction is dispatched over the closed
//! [`ProviderKind`](crate::registry::ProviderKind) set by [`create_adapter`].

use crate::registry::{ModelDescriptor, ProviderKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub mod http_client;
pub mod huggingface;
pub mod local_echo;
pub mod ollama;
pub mod openai;
pub mod openrouter;

const EWMA_ALPHA: f64 = 0.2;

/// Error string reported when an upstream requires credentials that are
/// not configured.
pub const MISSING_CREDENTIALS: &str = "missing_credentials";

/// Point-in-time copy of an adapter's health, attached to every response.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HealthSnapshot {
    pub health_ok: bool,
    pub failure_count: u32,
    pub recent_latency_ms: f64,
}

/// Normalized result of one `generate` call.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub model: String,
    pub content: String,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub health: HealthSnapshot,
}

/// Mutable per-adapter health state. Counters are atomic; the latency EWMA
/// and the health-pass stamp sit behind a mutex held only for the update.
#[derive(Debug)]
pub struct AdapterState {
    health_ok: AtomicBool,
    failure_count: AtomicU32,
    recent_latency_ms: Mutex<Option<f64>>,
    last_passed_health: Mutex<Option<DateTime<Utc>>>,
}

impl AdapterState {
    pub fn new(last_passed_health: Option<DateTime<Utc>>) -> Self {
        Self {
            health_ok: AtomicBool::new(true),
            failure_count: AtomicU32::new(0),
            recent_latency_ms: Mutex::new(None),
            last_passed_health: Mutex::new(last_passed_health),
        }
    }

    /// One failed attempt (HTTP miss or missing credentials). The counter is
    /// monotonic for the life of the process.
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Terminal outcome of a `generate` call: fold the wall-clock latency
    /// into the EWMA and set the health flag. A single success clears
    /// transient unhealth.
    pub fn settle(&self, latency_ms: u64, failed: bool) {
        let mut ewma = self.recent_latency_ms.lock().unwrap_or_else(|e| e.into_inner());
        *ewma = Some(match *ewma {
            None => latency_ms as f64,
            Some(prev) => EWMA_ALPHA * latency_ms as f64 + (1.0 - EWMA_ALPHA) * prev,
        });
        drop(ewma);
        self.health_ok.store(!failed, Ordering::Relaxed);
    }

    /// Stamp a successful health probe.
    pub fn mark_health_passed(&self) {
        let mut stamp = self
            .last_passed_health
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *stamp = Some(Utc::now());
    }

    pub fn health_ok(&self) -> bool {
        self.health_ok.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn last_passed_health(&self) -> Option<DateTime<Utc>> {
        *self
            .last_passed_health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            health_ok: self.health_ok(),
            failure_count: self.failure_count(),
            recent_latency_ms: self
                .recent_latency_ms
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .unwrap_or(0.0),
        }
    }
}

/// Common surface of all provider adapters.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The model name this adapter serves (unique within a registry).
    fn name(&self) -> &str;

    /// The immutable descriptor this adapter was built from.
    fn descriptor(&self) -> &ModelDescriptor;

    /// The adapter's mutable health state.
    fn state(&self) -> &AdapterState;

    /// One-shot generation. Never fails outward; see module docs.
    async fn generate(&self, prompt: &str, session_id: &str) -> ProviderResponse;

    /// On-demand health probe: a canned minimal generation. A pass stamps
    /// the adapter's `last_passed_health`.
    async fn probe(&self) -> bool {
        let response = self.generate("ping", "health").await;
        let ok = response.error.is_none();
        if ok {
            self.state().mark_health_passed();
        }
        ok
    }
}

/// Assemble a response and settle health state in one place, so every
/// adapter reports latency and health identically.
pub(crate) fn finish_response(
    name: &str,
    state: &AdapterState,
    started: Instant,
    content: String,
    error: Option<String>,
) -> ProviderResponse {
    let latency_ms = started.elapsed().as_millis() as u64;
    state.settle(latency_ms, error.is_some());
    ProviderResponse {
        model: name.to_string(),
        content,
        latency_ms,
        error,
        health: state.snapshot(),
    }
}

/// Build the adapter implementation for a descriptor's provider tag.
pub fn create_adapter(descriptor: ModelDescriptor) -> Arc<dyn ProviderAdapter> {
    tracing::debug!(
        model = %descriptor.name,
        provider = descriptor.provider.as_str(),
        "constructing adapter"
    );
    match descriptor.provider {
        ProviderKind::LocalEcho => Arc::new(local_echo::LocalEchoAdapter::new(descriptor)),
        ProviderKind::OpenAiCompatible => Arc::new(openai::OpenAiAdapter::new(descriptor)),
        ProviderKind::OpenRouter => Arc::new(openrouter::OpenRouterAdapter::new(descriptor)),
        ProviderKind::HuggingFace => Arc::new(huggingface::HuggingFaceAdapter::new(descriptor)),
        ProviderKind::Ollama => Arc::new(ollama::OllamaAdapter::new(descriptor)),
    }
}

/// Parse an RFC 3339 `last_passed_health` string from a descriptor into the
/// seed stamp for [`AdapterState`].
pub(crate) fn seed_health_stamp(descriptor: &ModelDescriptor) -> Option<DateTime<Utc>> {
    descriptor
        .last_passed_health
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_seeds_with_first_sample() {
        let state = AdapterState::new(None);
        state.settle(100, false);
        assert!((state.snapshot().recent_latency_ms - 100.0).abs() < 1e-9);
        state.settle(200, false);
        // 0.2 * 200 + 0.8 * 100
        assert!((state.snapshot().recent_latency_ms - 120.0).abs() < 1e-9);
    }

    #[test]
    fn single_success_clears_unhealth() {
        let state = AdapterState::new(None);
        state.record_failure();
        state.settle(50, true);
        assert!(!state.health_ok());
        assert_eq!(state.failure_count(), 1);
        state.settle(50, false);
        assert!(state.health_ok());
        // Failure count is monotonic.
        assert_eq!(state.failure_count(), 1);
    }

    #[test]
    fn health_pass_stamp() {
        let state = AdapterState::new(None);
        assert!(state.last_passed_health().is_none());
        state.mark_health_passed();
        assert!(state.last_passed_health().is_some());
    }
}
