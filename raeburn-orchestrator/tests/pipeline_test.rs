use raeburn_models_sdk::registry::{ModelDescriptor, ModelRegistry};
use raeburn_models_sdk::router::Router;
use raeburn_orchestrator::memory::{MemoryConfig, MemoryStore};
use raeburn_orchestrator::persona::AgentPersona;
use raeburn_orchestrator::pipeline::{Orchestrator, OrchestratorMode, OrchestratorTask};
use serde_json::json;
use std::sync::Arc;

fn echo_router(models: Vec<serde_json::Value>) -> Router {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let descriptors = models
        .into_iter()
        .map(|v| ModelDescriptor::from_value(&v).expect("descriptor"))
        .collect();
    Router::new(Arc::new(ModelRegistry::from_descriptors(descriptors)))
}

fn orchestrator_at(dir: &tempfile::TempDir, mode: OrchestratorMode) -> Orchestrator {
    let store = Arc::new(MemoryStore::open(MemoryConfig::at(dir.path())).expect("store"));
    Orchestrator::new(echo_router(vec![json!({"name": "local-echo", "provider": "local"})]), store)
        .with_mode(mode)
}

#[tokio::test]
async fn run_produces_a_winner_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, OrchestratorMode::Prod);

    let outcome = orchestrator
        .run(OrchestratorTask::new("hello pipeline"))
        .await
        .expect("run");

    assert_eq!(outcome.model_used, "local-echo");
    assert!(outcome.result.contains("User: hello pipeline"));
    assert!(outcome.score > 0.0);
    assert!(outcome.session_id.starts_with("sess_"));
    assert_eq!(outcome.agent, "generalist");
    assert_eq!(outcome.priority, 1);

    let store = orchestrator.store();
    let interactions = store.by_tag("generalist", "interaction", 10).unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(
        interactions[0].metadata.get("chosen_model"),
        Some(&json!("local-echo"))
    );
    assert_eq!(
        interactions[0].metadata.get("session_id"),
        Some(&json!(outcome.session_id))
    );

    let quality = store.by_tag("generalist", "quality", 10).unwrap();
    assert_eq!(quality.len(), 1);
    assert_eq!(quality[0].metadata.get("model"), Some(&json!("local-echo")));
}

#[tokio::test]
async fn dry_run_skips_the_interaction_write() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, OrchestratorMode::DryRun);

    let outcome = orchestrator
        .run(OrchestratorTask::new("x"))
        .await
        .expect("run");
    assert_eq!(outcome.mode, OrchestratorMode::DryRun);
    assert!(!outcome.result.is_empty());

    let store = orchestrator.store();
    assert!(store.by_tag("generalist", "interaction", 10).unwrap().is_empty());
    // The quality record is still written.
    assert_eq!(store.by_tag("generalist", "quality", 10).unwrap().len(), 1);
}

#[tokio::test]
async fn persona_shapes_the_routed_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, OrchestratorMode::Test);
    orchestrator.personas().register(
        "reviewer",
        AgentPersona {
            name: "reviewer".to_string(),
            system_prompt: Some("You are a careful reviewer.".to_string()),
            prompt_style: Some("terse".to_string()),
        },
    );

    let outcome = orchestrator
        .run(OrchestratorTask::new("check this").with_role("reviewer"))
        .await
        .expect("run");

    // The echo model reflects the assembled prompt back.
    assert!(outcome.result.starts_with("You are a careful reviewer.\n\nUser: check this"));
    assert!(outcome.result.contains("Style: terse"));
    assert_eq!(outcome.agent, "reviewer");
}

#[tokio::test]
async fn injected_memory_reaches_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, OrchestratorMode::Test);

    orchestrator
        .store()
        .add(
            "generalist",
            "Fact: the deploy window is Tuesday",
            raeburn_orchestrator::memory::AddOptions {
                tags: vec!["fact".to_string()],
                ..Default::default()
            },
        )
        .unwrap();

    let outcome = orchestrator
        .run(OrchestratorTask::new("When is the deploy window?"))
        .await
        .expect("run");

    assert!(outcome
        .result
        .contains("Context:\n- Fact: the deploy window is Tuesday"));
}

#[tokio::test]
async fn high_priority_runs_parallel_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::open(MemoryConfig::at(dir.path())).unwrap());
    let router = echo_router(vec![
        json!({"name": "aa", "provider": "local"}),
        json!({"name": "bb", "provider": "local"}),
    ]);
    let orchestrator = Orchestrator::new(router, store).with_mode(OrchestratorMode::Test);

    let outcome = orchestrator
        .run(OrchestratorTask::new("fan out").with_priority(3))
        .await
        .expect("run");
    assert_eq!(outcome.priority, 3);
    assert_eq!(outcome.model_used, "aa");
}

#[tokio::test]
async fn unknown_role_falls_back_to_generalist() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_at(&dir, OrchestratorMode::Test);

    let outcome = orchestrator
        .run(OrchestratorTask::new("hi").with_role("astronaut"))
        .await
        .expect("run");
    assert_eq!(outcome.agent, "generalist");
}
