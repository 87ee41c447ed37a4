//! # Model Registry
//!
//! Owns the immutable model descriptors and the adapter instances built
//! from them. Descriptors come from `model_registry.json` merged with the
//! `models_installed.json` overlay; an empty result is replaced by a single
//! synthetic `local-echo` descriptor so the registry is never empty and
//! routing always has a candidate.
//!
//! Adapters are constructed lazily on first use and cached by model name;
//! the cache map is concurrent, so reads after publication take no lock.

mod descriptor;

pub use descriptor::{Capabilities, ModelDescriptor, ProviderKind, RouterBias};

use crate::config;
use crate::providers::{create_adapter, ProviderAdapter};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Candidate filters for [`ModelRegistry::choose`]; all default to "no
/// constraint".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub limit: Option<usize>,
    pub task: Option<String>,
    pub require_json: bool,
    pub require_streaming: bool,
    pub required_roles: Option<Vec<String>>,
}

pub struct ModelRegistry {
    descriptors: Vec<Arc<ModelDescriptor>>,
    adapters: DashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ModelRegistry {
    /// Load from the configured registry directory (`RAEBURN_CONFIG_DIR`).
    pub fn load_default() -> Self {
        Self::from_parts(&config::load_model_registry(), &config::load_installed_models())
    }

    /// Build from already-parsed registry and installed-models documents.
    pub fn from_parts(registry: &Value, installed: &Value) -> Self {
        let mut descriptors = Vec::new();
        for entry in registry
            .get("models")
            .and_then(Value::as_array)
            .map(|a| a.as_slice())
            .unwrap_or_default()
        {
            let Some(mut descriptor) = ModelDescriptor::from_value(entry) else {
                continue;
            };
            // Overlay merge: installation status and discovered endpoint,
            // without clobbering values the registry file already set.
            if let Some(info) = installed.get(&descriptor.name).and_then(Value::as_object) {
                descriptor
                    .extras
                    .entry("installed".to_string())
                    .or_insert_with(|| info.get("installed").cloned().unwrap_or(Value::Bool(true)));
                if let Some(endpoint) = info.get("endpoint").and_then(Value::as_str) {
                    descriptor
                        .extras
                        .entry("endpoint".to_string())
                        .or_insert_with(|| Value::String(endpoint.to_string()));
                }
            } else {
                descriptor
                    .extras
                    .entry("installed".to_string())
                    .or_insert(Value::Bool(true));
            }
            descriptors.push(Arc::new(descriptor));
        }
        if descriptors.is_empty() {
            tracing::debug!("registry empty, installing synthetic local-echo model");
            descriptors.push(Arc::new(ModelDescriptor::local_echo()));
        }
        Self {
            descriptors,
            adapters: DashMap::new(),
        }
    }

    /// Build directly from descriptors; the injection point for tests and
    /// embedders.
    pub fn from_descriptors(descriptors: Vec<ModelDescriptor>) -> Self {
        let mut descriptors: Vec<Arc<ModelDescriptor>> =
            descriptors.into_iter().map(Arc::new).collect();
        if descriptors.is_empty() {
            descriptors.push(Arc::new(ModelDescriptor::local_echo()));
        }
        Self {
            descriptors,
            adapters: DashMap::new(),
        }
    }

    pub fn models(&self) -> &[Arc<ModelDescriptor>] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDescriptor>> {
        self.descriptors.iter().find(|d| d.name == name).cloned()
    }

    /// Adapter for a descriptor, constructed on first use and cached by name.
    pub fn adapter_for(&self, descriptor: &Arc<ModelDescriptor>) -> Arc<dyn ProviderAdapter> {
        self.adapters
            .entry(descriptor.name.clone())
            .or_insert_with(|| create_adapter(descriptor.as_ref().clone()))
            .clone()
    }

    /// The guaranteed fallback adapter, synthesized when the registry does
    /// not already define `local-echo`.
    fn fallback_adapter(&self) -> Arc<dyn ProviderAdapter> {
        let echo = self
            .descriptors
            .iter()
            .find(|d| d.name == "local-echo")
            .cloned()
            .unwrap_or_else(|| Arc::new(ModelDescriptor::local_echo()));
        self.adapter_for(&echo)
    }

    /// Capability- and health-gated candidate selection, preserving
    /// registry order. Never returns an empty list: when every descriptor
    /// is filtered out, the echo fallback is returned alone.
    pub fn choose(&self, selection: &Selection) -> Vec<Arc<dyn ProviderAdapter>> {
        let mut chosen: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
        for descriptor in &self.descriptors {
            if let Some(task) = &selection.task {
                if descriptor.forbidden_tasks.iter().any(|t| t == task) {
                    continue;
                }
            }
            let adapter = self.adapter_for(descriptor);
            if let Some(threshold) = descriptor.auto_disable_threshold_failures {
                if adapter.state().failure_count() >= threshold {
                    tracing::debug!(model = %descriptor.name, threshold, "auto-disabled by failure count");
                    continue;
                }
            }
            if selection.require_json && !descriptor.capabilities.json_mode {
                continue;
            }
            if selection.require_streaming && !descriptor.capabilities.streaming {
                continue;
            }
            if let Some(required) = &selection.required_roles {
                let supported = &descriptor.capabilities.roles_supported;
                if !required.iter().all(|role| supported.contains(role)) {
                    continue;
                }
            }
            if !descriptor.host_allowed(descriptor.endpoint()) {
                continue;
            }
            chosen.push(adapter);
            if let Some(limit) = selection.limit {
                if chosen.len() >= limit {
                    break;
                }
            }
        }
        if chosen.is_empty() {
            chosen.push(self.fallback_adapter());
        }
        chosen
    }

    /// On-demand health probe of one model by name. A pass stamps the
    /// adapter's `last_passed_health`.
    pub async fn probe(&self, name: &str) -> bool {
        match self.get(name) {
            Some(descriptor) => self.adapter_for(&descriptor).probe().await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_doc(models: Value) -> Value {
        json!({ "models": models })
    }

    #[test]
    fn empty_registry_installs_echo() {
        let registry = ModelRegistry::from_parts(&json!({}), &json!({}));
        assert_eq!(registry.models().len(), 1);
        assert_eq!(registry.models()[0].name, "local-echo");
    }

    #[test]
    fn installed_overlay_supplies_endpoint() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([{ "name": "m", "provider": "ollama" }])),
            &json!({ "m": { "installed": true, "endpoint": "http://box:11434/api/generate" } }),
        );
        let d = registry.get("m").unwrap();
        assert_eq!(d.endpoint(), Some("http://box:11434/api/generate"));
    }

    #[test]
    fn choose_filters_forbidden_tasks() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([
                { "name": "banned", "forbidden_tasks": ["medical"] },
                { "name": "free" }
            ])),
            &json!({}),
        );
        let chosen = registry.choose(&Selection {
            task: Some("medical".to_string()),
            ..Default::default()
        });
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].name(), "free");
    }

    #[test]
    fn choose_respects_capability_gates_and_falls_back() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([
                { "name": "plain", "capabilities": { "json_mode": false } }
            ])),
            &json!({}),
        );
        let chosen = registry.choose(&Selection {
            require_json: true,
            ..Default::default()
        });
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].name(), "local-echo");
    }

    #[test]
    fn choose_enforces_required_roles() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([
                { "name": "user-only", "capabilities": { "roles_supported": ["user"] } },
                { "name": "full", "provider": "openai-compatible" }
            ])),
            &json!({}),
        );
        let chosen = registry.choose(&Selection {
            required_roles: Some(vec!["system".to_string(), "user".to_string()]),
            ..Default::default()
        });
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].name(), "full");
    }

    #[test]
    fn choose_applies_limit_in_registry_order() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([
                { "name": "a" }, { "name": "b" }, { "name": "c" }
            ])),
            &json!({}),
        );
        let chosen = registry.choose(&Selection {
            limit: Some(2),
            ..Default::default()
        });
        let names: Vec<&str> = chosen.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn choose_skips_disallowed_hosts() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([
                {
                    "name": "pinned",
                    "provider": "ollama",
                    "allowed_hosts": ["trusted.internal"],
                    "endpoint": "http://other.internal:11434/api/generate"
                }
            ])),
            &json!({}),
        );
        let chosen = registry.choose(&Selection::default());
        assert_eq!(chosen[0].name(), "local-echo");
    }

    #[test]
    fn auto_disable_threshold_excludes_failing_adapter() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([
                { "name": "flaky", "auto_disable_threshold_failures": 2 },
                { "name": "steady" }
            ])),
            &json!({}),
        );
        let flaky = registry.get("flaky").unwrap();
        let adapter = registry.adapter_for(&flaky);
        adapter.state().record_failure();
        adapter.state().record_failure();

        let chosen = registry.choose(&Selection::default());
        let names: Vec<&str> = chosen.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["steady"]);
    }

    #[test]
    fn adapter_cache_returns_same_instance() {
        let registry = ModelRegistry::from_parts(
            &registry_doc(json!([{ "name": "m" }])),
            &json!({}),
        );
        let d = registry.get("m").unwrap();
        let a = registry.adapter_for(&d);
        let b = registry.adapter_for(&d);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
