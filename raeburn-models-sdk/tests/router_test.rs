use raeburn_models_sdk::registry::{ModelDescriptor, ModelRegistry};
use raeburn_models_sdk::router::{RouteRequest, Router};
use raeburn_models_sdk::RouterError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn descriptor(value: serde_json::Value) -> ModelDescriptor {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    ModelDescriptor::from_value(&value).expect("descriptor")
}

fn router_for(models: Vec<serde_json::Value>) -> Router {
    let registry = ModelRegistry::from_descriptors(models.into_iter().map(descriptor).collect());
    Router::new(Arc::new(registry))
}

#[tokio::test]
async fn empty_registry_routes_to_echo() {
    let registry = ModelRegistry::from_parts(&json!({}), &json!({}));
    let router = Router::new(Arc::new(registry));

    let best = router
        .route_first(RouteRequest::new("hello"))
        .await
        .expect("route");
    assert_eq!(best.model, "local-echo");
    assert_eq!(best.content, "hello [local:local-echo]");
    assert!(best.error.is_none());
    assert!(best.score > 0.0);
}

#[tokio::test]
async fn cost_bias_demotes_expensive_model() {
    let router = router_for(vec![
        json!({"name": "A", "provider": "local", "cost": 1.0}),
        json!({"name": "B", "provider": "local", "cost": 0.0}),
    ]);

    let ranked = router.route(RouteRequest::new("hi")).await.expect("route");
    let names: Vec<&str> = ranked.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
}

#[tokio::test]
async fn equal_scores_keep_registry_order() {
    // Same-length names produce byte-identical sub-scores, so the final
    // scores tie exactly and the stable sort must keep registry order.
    let router = router_for(vec![
        json!({"name": "aa", "provider": "local"}),
        json!({"name": "bb", "provider": "local"}),
    ]);

    let ranked = router.route(RouteRequest::new("tie")).await.expect("route");
    assert!((ranked[0].score - ranked[1].score).abs() < f64::EPSILON);
    assert_eq!(ranked[0].model, "aa");
    assert_eq!(ranked[1].model, "bb");
}

#[tokio::test]
async fn retry_exhaustion_reports_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let router = router_for(vec![json!({
        "name": "flaky",
        "provider": "openai-compatible",
        "endpoint": format!("{}/v1", server.uri()),
        "api_key": "test-key",
    })]);

    let ranked = router.route(RouteRequest::new("ping")).await.expect("route");
    let flaky = ranked.iter().find(|r| r.model == "flaky").expect("candidate");
    assert!(flaky.error.is_some());
    assert_eq!(flaky.content, "");
    assert_eq!(flaky.raw.health.failure_count, 3);
    assert!(!flaky.raw.health.health_ok);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(vec![json!({
        "name": "strict",
        "provider": "openai-compatible",
        "endpoint": format!("{}/v1", server.uri()),
        "api_key": "test-key",
    })]);

    let best = router
        .route_first(RouteRequest::new("ping"))
        .await
        .expect("route");
    assert!(best.error.as_deref().unwrap_or("").contains("400"));
    assert_eq!(best.raw.health.failure_count, 1);
}

#[tokio::test]
async fn successful_upstream_content_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "pong"}}]
        })))
        .mount(&server)
        .await;

    let router = router_for(vec![json!({
        "name": "up",
        "provider": "openai-compatible",
        "endpoint": format!("{}/v1", server.uri()),
        "api_key": "test-key",
    })]);

    let best = router
        .route_first(RouteRequest::new("ping"))
        .await
        .expect("route");
    assert_eq!(best.model, "up");
    assert_eq!(best.content, "pong");
    assert!(best.error.is_none());
    assert!(best.raw.health.health_ok);
}

#[tokio::test]
async fn missing_credentials_yield_synthetic_candidate() {
    let router = router_for(vec![json!({
        "name": "keyless",
        "provider": "openrouter",
    })]);

    let best = router
        .route_first(RouteRequest::new("hello"))
        .await
        .expect("route");
    assert_eq!(best.error.as_deref(), Some("missing_credentials"));
    assert_eq!(best.content, "hello - openrouter");
}

#[tokio::test]
async fn deadline_cancels_slow_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(10))
                .set_body_json(json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let router = router_for(vec![
        json!({
            "name": "slow",
            "provider": "openai-compatible",
            "endpoint": format!("{}/v1", server.uri()),
            "api_key": "test-key",
        }),
        json!({"name": "echo", "provider": "local"}),
    ]);

    let ranked = router
        .route(RouteRequest::new("hurry").with_deadline(Duration::from_millis(200)))
        .await
        .expect("route");
    let slow = ranked.iter().find(|r| r.model == "slow").expect("candidate");
    assert_eq!(slow.error.as_deref(), Some("cancelled"));
    // The healthy echo model outranks the cancelled candidate.
    assert_eq!(ranked[0].model, "echo");
}

#[tokio::test]
async fn sequential_mode_preserves_scoring() {
    let router = router_for(vec![
        json!({"name": "a", "provider": "local"}),
        json!({"name": "b", "provider": "local", "cost": 2.0}),
    ]);

    let ranked = router
        .route(RouteRequest::new("hello").sequential())
        .await
        .expect("route");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].model, "a");
}

#[tokio::test]
async fn empty_prompt_is_a_bad_request() {
    let router = router_for(vec![json!({"name": "m", "provider": "local"})]);
    let err = router.route(RouteRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, RouterError::BadRequest { .. }));
}

#[test]
fn blocking_wrapper_routes_without_a_runtime() {
    let router = router_for(vec![json!({"name": "m", "provider": "local"})]);
    let ranked = router
        .route_blocking(RouteRequest::new("offline"))
        .expect("route");
    assert_eq!(ranked[0].model, "m");
    assert_eq!(ranked[0].content, "offline [local:m]");
}

#[tokio::test]
async fn blocking_wrapper_is_safe_inside_a_runtime() {
    let router = router_for(vec![json!({"name": "m", "provider": "local"})]);
    let ranked = tokio::task::spawn_blocking(move || {
        router.route_blocking(RouteRequest::new("nested"))
    })
    .await
    .expect("join")
    .expect("route");
    assert_eq!(ranked[0].model, "m");
}

#[tokio::test]
async fn probe_success_stamps_health() {
    let registry = Arc::new(ModelRegistry::from_descriptors(vec![descriptor(
        json!({"name": "m", "provider": "local"}),
    )]));
    let d = registry.get("m").unwrap();
    let adapter = registry.adapter_for(&d);
    assert!(adapter.state().last_passed_health().is_none());

    assert!(registry.probe("m").await);
    assert!(adapter.state().last_passed_health().is_some());
    assert!(!registry.probe("missing").await);
}
