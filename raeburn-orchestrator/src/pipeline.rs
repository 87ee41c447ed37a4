//! # Orchestration Pipeline
//!
//! The session-scoped driver tying the pieces together: resolve the
//! persona, inject memory context, route the assembled prompt, pick the
//! winner, and record the quality and interaction entries. Each step that
//! fails propagates as a [`PipelineError`] naming the step; the
//! interaction is only written after a winner exists, so routing failures
//! leave no partial records.

use crate::error::PipelineError;
use crate::injector::ContextInjector;
use crate::judge::{pick_winner, JudgeBackend};
use crate::memory::{AddOptions, MemoryStore};
use crate::persona::{build_prompt, PersonaRegistry, DEFAULT_ROLE};
use raeburn_models_sdk::config::env_flag;
use raeburn_models_sdk::router::{RouteRequest, Router};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// Operating mode from `RAEBURN_ORCHESTRATOR_MODE`.
///
/// `DryRun` skips the interaction write; `Test` additionally suppresses
/// the completion log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorMode {
    Prod,
    DryRun,
    Test,
}

impl OrchestratorMode {
    pub fn from_env() -> Self {
        match std::env::var("RAEBURN_ORCHESTRATOR_MODE").as_deref() {
            Ok("dry-run") => Self::DryRun,
            Ok("test") => Self::Test,
            _ => Self::Prod,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::DryRun => "dry-run",
            Self::Test => "test",
        }
    }
}

/// One unit of work for the pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorTask {
    pub user_input: String,
    pub agent_role: String,
    pub priority: i64,
}

impl OrchestratorTask {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            agent_role: DEFAULT_ROLE.to_string(),
            priority: 1,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.agent_role = role.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// What one pipeline run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub result: String,
    pub model_used: String,
    pub score: f64,
    pub agent: String,
    pub session_id: String,
    pub mode: OrchestratorMode,
    pub duration_ms: u64,
    pub priority: i64,
}

pub struct Orchestrator {
    router: Router,
    store: Arc<MemoryStore>,
    injector: ContextInjector,
    personas: PersonaRegistry,
    mode: OrchestratorMode,
    judge: JudgeBackend,
}

impl Orchestrator {
    /// Wire a pipeline over an existing router and store; mode and judge
    /// backend come from the environment.
    pub fn new(router: Router, store: Arc<MemoryStore>) -> Self {
        let injector = ContextInjector::new(Arc::clone(&store));
        Self {
            router,
            store,
            injector,
            personas: PersonaRegistry::default(),
            mode: OrchestratorMode::from_env(),
            judge: JudgeBackend::from_env(),
        }
    }

    pub fn with_mode(mut self, mode: OrchestratorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_judge(mut self, judge: JudgeBackend) -> Self {
        self.judge = judge;
        self
    }

    /// Persona registration point for embedders and tests.
    pub fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Run one task through the full pipeline.
    pub async fn run(&self, task: OrchestratorTask) -> Result<RunOutcome, PipelineError> {
        let started = Instant::now();
        let session_id = gen_session_id();
        let persona = self.personas.resolve(&task.agent_role);
        let agent = persona.name.clone();

        let context: Vec<String> = self
            .injector
            .fetch(&agent, Some(&task.user_input), None)
            .map_err(|e| PipelineError::at("inject_context", e))?
            .into_iter()
            .map(|m| format!("- {}", m.text))
            .collect();

        let prompt = build_prompt(&persona, &task.user_input, &context);
        let parallel = task.priority > 1 || env_flag("RAEBURN_ORCHESTRATOR_PARALLEL");

        let mut request = RouteRequest::new(prompt).with_session(session_id.clone());
        request.parallel = parallel;
        let ranked = self
            .router
            .route(request)
            .await
            .map_err(|e| PipelineError::at("route", e))?;

        let winner_idx = pick_winner(self.judge, &self.router, &ranked, &task.user_input).await;
        let winner = &ranked[winner_idx];
        let duration_ms = started.elapsed().as_millis() as u64;

        self.record_quality(&agent, &winner.model, winner.score, &session_id)
            .map_err(|e| PipelineError::at("record_quality", e))?;

        if self.mode != OrchestratorMode::DryRun {
            self.record_interaction(&task, winner, &agent, &session_id, duration_ms)
                .map_err(|e| PipelineError::at("record_interaction", e))?;
        }

        if self.mode != OrchestratorMode::Test {
            tracing::info!(
                session = %session_id,
                model = %winner.model,
                score = winner.score,
                duration_ms,
                "orchestration complete"
            );
        }

        Ok(RunOutcome {
            result: winner.content.clone(),
            model_used: winner.model.clone(),
            score: winner.score,
            agent,
            session_id,
            mode: self.mode,
            duration_ms,
            priority: task.priority,
        })
    }

    fn record_quality(
        &self,
        agent: &str,
        model: &str,
        score: f64,
        session_id: &str,
    ) -> Result<(), crate::error::MemoryError> {
        let mut metadata = Map::new();
        metadata.insert("model".to_string(), json!(model));
        metadata.insert("score".to_string(), json!(score));
        metadata.insert("session_id".to_string(), json!(session_id));
        metadata.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        self.store.add(
            agent,
            &format!("{model} scored {score:.3}"),
            AddOptions {
                tags: vec!["quality".to_string()],
                metadata,
                source: Some("orchestrator".to_string()),
                ..Default::default()
            },
        )?;
        Ok(())
    }

    fn record_interaction(
        &self,
        task: &OrchestratorTask,
        winner: &raeburn_models_sdk::router::RoutedResponse,
        agent: &str,
        session_id: &str,
        duration_ms: u64,
    ) -> Result<(), crate::error::MemoryError> {
        let mut metadata = Map::new();
        metadata.insert("session_id".to_string(), json!(session_id));
        metadata.insert("user_input".to_string(), json!(task.user_input));
        metadata.insert("agent_role".to_string(), json!(task.agent_role));
        metadata.insert("priority".to_string(), json!(task.priority));
        metadata.insert("chosen_model".to_string(), json!(winner.model));
        metadata.insert("content".to_string(), json!(winner.content));
        metadata.insert("score".to_string(), json!(winner.score));
        metadata.insert("duration_ms".to_string(), json!(duration_ms));
        metadata.insert("mode".to_string(), Value::String(self.mode.as_str().to_string()));
        self.store.add(
            agent,
            &format!("User: {}\nAssistant: {}", task.user_input, winner.content),
            AddOptions {
                tags: vec!["interaction".to_string()],
                metadata,
                source: Some("orchestrator".to_string()),
                ..Default::default()
            },
        )?;
        Ok(())
    }
}

/// Short opaque session id, unique per invocation.
fn gen_session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("sess_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_short_and_unique() {
        let a = gen_session_id();
        let b = gen_session_id();
        assert!(a.starts_with("sess_"));
        assert_eq!(a.len(), 13);
        assert_ne!(a, b);
    }

    #[test]
    fn task_defaults() {
        let task = OrchestratorTask::new("hello");
        assert_eq!(task.agent_role, DEFAULT_ROLE);
        assert_eq!(task.priority, 1);
    }
}
