use crate::config;
use crate::providers::http_client::{AuthStrategy, HttpProviderClient};
use crate::providers::{finish_response, AdapterState, ProviderAdapter, ProviderResponse};
use crate::registry::ModelDescriptor;
use crate::retry::{retry, ExpBackoff};
use serde_json::{json, Value};
use std::time::Instant;

const DEFAULT_URL: &str = "http://localhost:11434/api/generate";
const MAX_ATTEMPTS: u32 = 3;

/// Local Ollama adapter; needs no credentials.
pub struct OllamaAdapter {
    descriptor: ModelDescriptor,
    state: AdapterState,
    endpoint: String,
    client: Result<HttpProviderClient, String>,
}

impl OllamaAdapter {
    pub fn new(descriptor: ModelDescriptor) -> Self {
        let endpoint = descriptor
            .endpoint()
            .map(str::to_string)
            .or_else(|| std::env::var("OLLAMA_URL").ok().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let client = HttpProviderClient::new(config::router_timeout(), &[], AuthStrategy::None);
        let stamp = super::seed_health_stamp(&descriptor);

        Self {
            descriptor,
            state: AdapterState::new(stamp),
            endpoint,
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
impl ProviderAdapter for OllamaAdapter {
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

        let client = match &self.client {
            Ok(client) => client,
            Err(e) => {
                self.state.record_failure();
                return finish_response(&name, &self.state, started, String::new(), Some(e.clone()));
            }
        };

        let payload = json!({
            "model": self.model_id(),
            "prompt": prompt,
        });

        tracing::debug!(model = %name, session = session_id, "ollama dispatch");
        let result = retry(
            || client.post_json(&self.endpoint, &payload),
            MAX_ATTEMPTS,
            ExpBackoff::default(),
            |_| self.state.record_failure(),
        )
        .await;

        match result {
            Ok(body) => {
                let parsed = body
                    .get("response")
                    .or_else(|| body.get("output"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                let content = if parsed.is_empty() {
                    format!("{prompt} - {}", self.descriptor.provider.fallback_tag())
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
