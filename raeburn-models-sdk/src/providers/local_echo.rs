use crate::providers::{finish_response, AdapterState, ProviderAdapter, ProviderResponse};
use crate::registry::ModelDescriptor;
use std::time::Instant;

/// Deterministic in-process echo model; the guaranteed routing fallback.
pub struct LocalEchoAdapter {
    descriptor: ModelDescriptor,
    state: AdapterState,
}

impl LocalEchoAdapter {
    pub fn new(descriptor: ModelDescriptor) -> Self {
        let stamp = super::seed_health_stamp(&descriptor);
        Self {
            descriptor,
            state: AdapterState::new(stamp),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for LocalEchoAdapter {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn state(&self) -> &AdapterState {
        &self.state
    }

    async fn generate(&self, prompt: &str, _session_id: &str) -> ProviderResponse {
        let started = Instant::now();
        let content = format!("{prompt} [local:{}]", self.descriptor.name);
        finish_response(&self.descriptor.name, &self.state, started, content, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_prompt_with_model_tag() {
        let adapter = LocalEchoAdapter::new(ModelDescriptor::local_echo());
        let response = adapter.generate("hello", "s1").await;
        assert_eq!(response.content, "hello [local:local-echo]");
        assert!(response.error.is_none());
        assert!(response.health.health_ok);
    }
}
