use crate::config;
use crate::providers::http_client::{AuthStrategy, HttpProviderClient};
use crate::providers::{
    finish_response, AdapterState, ProviderAdapter, ProviderResponse, MISSING_CREDENTIALS,
};
use crate::registry::ModelDescriptor;
use crate::retry::{retry, ExpBackoff};
use serde_json::{json, Value};
use std::time::Instant;

const DEFAULT_BASE: &str = "https://api.openai.com/v1";
const MAX_ATTEMPTS: u32 = 3;

/// Adapter for OpenAI-style chat-completion endpoints (OpenAI itself,
/// LiteLLM, self-hosted gateways).
pub struct OpenAiAdapter {
    descriptor: ModelDescriptor,
    state: AdapterState,
    endpoint: String,
    api_key: Option<String>,
    allow_unauthenticated: bool,
    client: Result<HttpProviderClient, String>,
}

impl OpenAiAdapter {
    pub fn new(descriptor: ModelDescriptor) -> Self {
        let api_key = descriptor
            .extra_str("api_key")
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()));
        let base = descriptor
            .endpoint()
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_API_BASE").ok().filter(|b| !b.is_empty()))
            .unwrap_or_else(|| DEFAULT_BASE.to_string());
        let endpoint = if base.ends_with("/chat/completions") {
            base
        } else {
            format!("{}/chat/completions", base.trim_end_matches('/'))
        };
        let allow_unauthenticated = descriptor
            .extras
            .get("allow_unauthenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let auth = match &api_key {
            Some(token) => AuthStrategy::Bearer {
                token: token.clone(),
            },
            None => AuthStrategy::None,
        };
        let client = HttpProviderClient::new(config::router_timeout(), &[], auth);
        let stamp = super::seed_health_stamp(&descriptor);

        Self {
            descriptor,
            state: AdapterState::new(stamp),
            endpoint,
            api_key,
            allow_unauthenticated,
            client,
        }
    }

    fn model_id(&self) -> &str {
        self.descriptor
            .extra_str("model")
            .unwrap_or(&self.descriptor.name)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn state(&self) -> &AdapterState {
        &self.state
    }

    async fn generate(&self, prompt: &str, session_id: &str) -> ProviderResponse {
        let started = Instant::now();
        let name = self.descriptor.name.clone();

        let tag = self.descriptor.provider.fallback_tag();
        if self.api_key.is_none() && !self.allow_unauthenticated {
            self.state.record_failure();
            return finish_response(
                &name,
                &self.state,
                started,
                format!("{prompt} - {tag}"),
                Some(MISSING_CREDENTIALS.to_string()),
            );
        }

        let client = match &self.client {
            Ok(client) => client,
            Err(e) => {
                self.state.record_failure();
                return finish_response(&name, &self.state, started, String::new(), Some(e.clone()));
            }
        };

        let payload = json!({
            "model": self.model_id(),
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        tracing::debug!(model = %name, session = session_id, "openai-compatible dispatch");
        let result = retry(
            || client.post_json(&self.endpoint, &payload),
            MAX_ATTEMPTS,
            ExpBackoff::default(),
            |_| self.state.record_failure(),
        )
        .await;

        match result {
            Ok(body) => {
                let parsed = body["choices"][0]["message"]["content"]
                    .as_str()
                    .unwrap_or("")
                    .to_string();
                let content = if parsed.is_empty() {
                    format!("{prompt} - {tag}")
                } else {
                    parsed
                };
                finish_response(&name, &self.state, started, content, None)
            }
            Err(err) => {
                tracing::warn!(model = %name, session = session_id, error = %err, "generation failed");
                finish_response(&name, &self.state, started, String::new(), Some(err.to_string()))
            }
        }
    }
}
