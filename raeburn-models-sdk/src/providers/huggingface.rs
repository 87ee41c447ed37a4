use crate::config;
use crate::providers::http_client::{AuthStrategy, HttpProviderClient};
use crate::providers::{
    finish_response, AdapterState, ProviderAdapter, ProviderResponse, MISSING_CREDENTIALS,
};
use crate::registry::ModelDescriptor;
use crate::retry::{retry, ExpBackoff};
use serde_json::{json, Value};
use std::time::Instant;

const MAX_ATTEMPTS: u32 = 3;

/// HuggingFace serverless inference adapter.
pub struct HuggingFaceAdapter {
    descriptor: ModelDescriptor,
    state: AdapterState,
    endpoint: String,
    token: Option<String>,
    client: Result<HttpProviderClient, String>,
}

impl HuggingFaceAdapter {
    pub fn new(descriptor: ModelDescriptor) -> Self {
        let token = descriptor
            .extra_str("api_key")
            .map(str::to_string)
            .or_else(|| std::env::var("HF_API_TOKEN").ok().filter(|t| !t.is_empty()));
        let model_id = descriptor
            .extra_str("model")
            .unwrap_or(&descriptor.name)
            .to_string();
        let endpoint = descriptor
            .endpoint()
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("https://api-inference.huggingface.co/models/{model_id}")
            });

        let auth = match &token {
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
            token,
            client,
        }
    }

    /// The inference API answers either `[{"generated_text": ...}]` or a
    /// bare `{"generated_text": ...}` object depending on the model.
    fn extract_content(body: &Value) -> String {
        let node = match body {
            Value::Array(items) => items.first(),
            other => Some(other),
        };
        node.and_then(|v| v.get("generated_text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for HuggingFaceAdapter {
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

        if self.token.is_none() {
            self.state.record_failure();
            let tag = self.descriptor.provider.fallback_tag();
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

        let payload = json!({ "inputs": prompt });

        tracing::debug!(model = %name, session = session_id, "huggingface dispatch");
        let result = retry(
            || client.post_json(&self.endpoint, &payload),
            MAX_ATTEMPTS,
            ExpBackoff::default(),
            |_| self.state.record_failure(),
        )
        .await;

        match result {
            Ok(body) => {
                let content = Self::extract_content(&body);
                finish_response(&name, &self.state, started, content, None)
            }
            Err(err) => {
                tracing::warn!(model = %name, session = session_id, error = %err, "generation failed");
                finish_response(&name, &self.state, started, String::new(), Some(err.to_string()))
            }
        }
    }
}
