//! Route tests against an in-process router and a fixture-backed provider

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use futures::stream;
use offerlab_api::{create_app, AppState};
use offerlab_core::{InferenceError, PipelineContext, PromptBuilder, PromptError, StageDefinition};
use offerlab_stages::{ChunkStream, InferenceCapability, InferenceRequest, PipelineConfig};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn fixtures_dir() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = std::path::Path::new(&manifest_dir).parent().unwrap().parent().unwrap();
    workspace_root.join("testing/fixtures/stages")
}

fn fixture(stage: u32) -> Option<String> {
    ["json", "md"]
        .iter()
        .map(|ext| fixtures_dir().join(format!("stage_{:02}.{}", stage, ext)))
        .find(|path| path.exists())
        .map(|path| std::fs::read_to_string(path).unwrap())
}

fn fixture_value(stage: u32) -> Value {
    let raw = fixture(stage).unwrap();
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

enum Behaviour {
    Fixtures,
    Fail(InferenceError),
    Reply(String),
}

/// Answers each `STAGE:<id>` prompt from the fixtures
struct FixtureInference(Behaviour);

#[async_trait]
impl InferenceCapability for FixtureInference {
    async fn infer(&self, request: InferenceRequest) -> Result<ChunkStream, InferenceError> {
        let text = match &self.0 {
            Behaviour::Fail(err) => return Err(err.clone()),
            Behaviour::Reply(text) => text.clone(),
            Behaviour::Fixtures => {
                let stage: u32 = request
                    .prompt
                    .strip_prefix("STAGE:")
                    .and_then(|id| id.parse().ok())
                    .unwrap();
                fixture(stage).ok_or_else(|| InferenceError::InvalidRequest(format!("no fixture for {}", stage)))?
            }
        };
        let chunks: Vec<Result<String, InferenceError>> = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(128)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

fn app(behaviour: Behaviour) -> (Router, AppState) {
    let prompts: Arc<dyn PromptBuilder> = Arc::new(
        |stage: &StageDefinition, _ctx: &PipelineContext| -> Result<String, PromptError> {
            Ok(format!("STAGE:{}", stage.id))
        },
    );
    let state = AppState::new(
        Arc::new(offerlab_registry::builtin().clone()),
        Arc::new(FixtureInference(behaviour)),
        prompts,
        PipelineConfig::default(),
    )
    .unwrap();
    (create_app(state.clone()), state)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn business() -> Value {
    json!({ "business": { "business_name": "School Run Strong", "niche": "fitness for working mothers" } })
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, body) = send_json(app, "GET", "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["stages"], 14);
}

#[tokio::test]
async fn test_registry_routes() {
    let (app, _) = app(Behaviour::Fixtures);

    let (status, body) = send_json(app.clone(), "GET", "/v1/registry/stages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stages"].as_array().unwrap().len(), 14);

    let (status, body) = send_json(app.clone(), "GET", "/v1/registry/stages/6", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Research Synthesis");

    let (status, body) = send_json(app.clone(), "GET", "/v1/registry/stages/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "unknown_stage");

    let (_, body) = send_json(app.clone(), "GET", "/v1/registry/upgrade-status", None).await;
    assert_eq!(body["non_baseline_stage_ids"], json!([1, 2, 3]));

    let (_, body) = send_json(app, "GET", "/v1/registry/pipelines", None).await;
    assert_eq!(body["pipelines"][2]["name"], "offer-design");
    assert_eq!(body["pipelines"][2]["required_upstream"], json!([1, 2, 3, 4, 5]));
}

#[tokio::test]
async fn test_run_single_stage() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, body) = send_json(app, "POST", "/v1/stages/1", Some(business())).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["stage"], 1);
    assert!(body["output"]["market_overview"].is_string());
    assert_eq!(body["validation"]["is_valid"], true);
    assert!(body["record"]["output_hash"].as_str().unwrap().starts_with("blake3:"));
}

#[tokio::test]
async fn test_stage_with_upstream() {
    let (app, _) = app(Behaviour::Fixtures);
    let mut request = business();
    request["upstream"] = json!({ "1": fixture_value(1), "2": fixture_value(2) });

    let (status, body) = send_json(app, "POST", "/v1/stages/3", Some(request)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["output"]["competitors"].is_array());
}

#[tokio::test]
async fn test_stage_without_upstream_conflicts() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, body) = send_json(app, "POST", "/v1/stages/7", Some(business())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "dependency_missing");
}

#[tokio::test]
async fn test_unknown_stage() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, _) = send_json(app, "POST", "/v1/stages/14", Some(business())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let (app, state) = app(Behaviour::Fail(InferenceError::Provider {
        status: 529,
        message: "overloaded".into(),
    }));
    let (status, body) = send_json(app.clone(), "POST", "/v1/stages/1", Some(business())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "transport_failure");
    assert!(body["error"]["message"].as_str().unwrap().contains("after 3 attempt(s)"));

    let metrics = state.metrics.encode().unwrap();
    assert!(metrics.contains(r#"offerlab_stage_failures_total{kind="transport_failure",stage="1"} 1"#), "{}", metrics);
}

#[tokio::test]
async fn test_rejected_output_is_unprocessable() {
    let (app, _) = app(Behaviour::Reply(r#"{"market_overview": "TBD"}"#.into()));
    let (status, body) = send_json(app, "POST", "/v1/stages/1", Some(business())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "validation_failure");
    assert!(!body["error"]["errors"].as_array().unwrap().is_empty());
    assert!(body["error"]["quality_score"].as_u64().unwrap() < 100);
}

#[tokio::test]
async fn test_run_research_pipeline() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, body) = send_json(app, "POST", "/v1/pipelines/research", Some(business())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"]["state"], "completed");
    assert_eq!(body["records"].as_array().unwrap().len(), 6);
    assert!(body["context"]["outputs"]["6"].is_string());
}

#[tokio::test]
async fn test_pipeline_needs_upstream() {
    let (app, _) = app(Behaviour::Fixtures);
    let mut request = business();
    request["upstream"] = json!({ "1": fixture_value(1) });

    let (status, body) = send_json(app, "POST", "/v1/pipelines/content", Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"]["message"],
        "pipeline 'content' needs upstream output for stages 2, 3, 4"
    );
}

#[tokio::test]
async fn test_unknown_pipeline() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, body) = send_json(app, "POST", "/v1/pipelines/launch", Some(business())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "unknown_pipeline");
}

#[tokio::test]
async fn test_stream_stage_events() {
    let (app, _) = app(Behaviour::Fixtures);
    let (status, bytes) = send(app, "POST", "/v1/stages/1/stream", Some(business())).await;
    let text = String::from_utf8(bytes).unwrap();

    let events: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("event:"))
        .map(str::trim)
        .collect();

    assert_eq!(status, StatusCode::OK);
    assert!(events.len() > 1, "{}", text);
    assert!(events[..events.len() - 1].iter().all(|e| *e == "chunk"));
    assert_eq!(events.last(), Some(&"done"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = app(Behaviour::Fixtures);
    send_json(app.clone(), "POST", "/v1/stages/1", Some(business())).await;

    let (status, bytes) = send(app, "GET", "/metrics", None).await;
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains(r#"offerlab_runs_total{outcome="completed",pipeline="stage-1"} 1"#), "{}", text);
    assert!(text.contains(r#"offerlab_stage_events_total{stage="1",status="completed"} 1"#));
}
