//! Context injection: prepend an agent's most relevant memories to a prompt.

use crate::error::MemoryError;
use crate::memory::MemoryStore;
use std::sync::Arc;

pub const DEFAULT_CONTEXT_LIMIT: usize = 5;

/// Pulls top-k relevant memories for an agent and folds them into the
/// prompt as a literal `Context:` block. An empty fetch returns the prompt
/// unchanged.
pub struct ContextInjector {
    store: Arc<MemoryStore>,
    limit: usize,
}

impl ContextInjector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let limit = std::env::var("RAEBURN_ORCHESTRATOR_MEMORY_LIMIT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_CONTEXT_LIMIT);
        Self { store, limit }
    }

    pub fn with_limit(store: Arc<MemoryStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// Augmented prompt:
    ///
    /// ```text
    /// Context:
    /// - <entry text>
    /// - ...
    ///
    /// Prompt: <prompt>
    /// ```
    pub fn inject(
        &self,
        agent: &str,
        prompt: &str,
        tags: Option<&[String]>,
    ) -> Result<String, MemoryError> {
        let memories = self
            .store
            .get_relevant(agent, Some(prompt), tags, self.limit)?;
        if memories.is_empty() {
            return Ok(prompt.to_string());
        }
        let bullets: Vec<String> = memories.iter().map(|m| format!("- {}", m.text)).collect();
        Ok(format!("Context:\n{}\n\nPrompt: {prompt}", bullets.join("\n")))
    }

    /// The raw relevant entries, for callers that format context
    /// themselves.
    pub fn fetch(
        &self,
        agent: &str,
        query: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Vec<crate::memory::MemoryEntry>, MemoryError> {
        self.store.get_relevant(agent, query, tags, self.limit)
    }
}
