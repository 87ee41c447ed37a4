use crate::config;
use crate::providers::http_client::{AuthStrategy, HttpProviderClient};
use crate::providers::{
    finish_response, AdapterState, ProviderAdapter, ProviderResponse, MISSING_CREDENTIALS,
};
use crate::registry::ModelDescriptor;
use crate::retry::{retry, ExpBackoff};
use serde_json::json;
use std::time::Instant;

const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const MAX_ATTEMPTS: u32 = 3;

/// OpenRouter adapter (OpenAI-compatible API with attribution headers).
pub struct OpenRouterAdapter {
    descriptor: ModelDescriptor,
    state: AdapterState,
    endpoint: String,
    api_key: Option<String>,
    client: Result<HttpProviderClient, String>,
}

impl OpenRouterAdapter {
    pub fn new(descriptor: ModelDescriptor) -> Self {
        let api_key = descriptor
            .extra_str("api_key")
            .map(str::to_string)
            .or_else(|| {
                std::env::var("OPENROUTER_API_KEY")
                    .ok()
                    .filter(|k| !k.is_empty())
            });
        let endpoint = descriptor
            .endpoint()
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string();

        let auth = match &api_key {
            Some(token) => AuthStrategy::Bearer {
                token: token.clone(),
            },
            None => AuthStrategy::None,
        };
        let headers = [
            ("HTTP-Referer".to_string(), "https://raeburn.ai".to_string()),
            ("X-Title".to_string(), "Raeburn".to_string()),
        ];
        let client = HttpProviderClient::new(config::router_timeout(), &headers, auth);
        let stamp = super::seed_health_stamp(&descriptor);

        Self {
            descriptor,
            state: AdapterState::new(stamp),
            endpoint,
            api_key,
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
impl ProviderAdapter for OpenRouterAdapter {
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

        if self.api_key.is_none() {
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

        let payload = json!({
            "model": self.model_id(),
            "messages": [{"role": "user", "content": prompt}],
        });

        tracing::debug!(model = %name, session = session_id, "openrouter dispatch");
        let result = retry(
            || client.post_json(&self.endpoint, &payload),
            MAX_ATTEMPTS,
            ExpBackoff::default(),
            |_| self.state.record_failure(),
        )
        .await;

        match result {
            Ok(body) => {
                let content = body["choices"][0]["message"]["content"]
                    .as_str()
                    .unwrap_or("")
                    .to_string();
                finish_response(&name, &self.state, started, content, None)
            }
            Err(err) => {
                tracing::warn!(model = %name, session = session_id, error = %err, "generation failed");
                finish_response(&name, &self.state, started, String::new(), Some(err.to_string()))
            }
        }
    }
}
