//! End-to-end pipeline runs against the stub provider and fixture outputs.

mod support;

use offerlab_core::{BusinessContext, PipelineContext, StageId, StageStatus};
use offerlab_registry::PipelineKind;
use offerlab_stages::{ChannelSink, PipelineConfig, PipelineOrchestrator, RecordingProgress, RunState};
use serde_json::Value;
use std::sync::Arc;
use support::{fixture, fixture_outputs, stage_prompts, StubInference};

fn orchestrator(stub: Arc<StubInference>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        Arc::new(offerlab_registry::builtin().clone()),
        stub,
        stage_prompts(),
        PipelineConfig::default(),
    )
}

fn business() -> BusinessContext {
    BusinessContext::new()
        .with("business_name", "School Run Strong")
        .with("niche", "fitness for working mothers")
}

fn ids(values: &[u32]) -> Vec<StageId> {
    values.iter().copied().map(StageId).collect()
}

#[tokio::test]
async fn test_research_pipeline_completes_in_order() {
    let stub = Arc::new(StubInference::new());
    let progress = Arc::new(RecordingProgress::new());
    let orch = orchestrator(stub.clone()).with_progress(progress.clone());

    let report = orch
        .run_pipeline(PipelineKind::Research, PipelineContext::new(business()), None)
        .await;

    assert_eq!(report.state, RunState::Completed);
    assert!(report.failure.is_none());
    assert_eq!(report.outputs().ids(), ids(&[1, 2, 3, 4, 5, 6]));
    assert_eq!(stub.calls(), ids(&[1, 2, 3, 4, 5, 6]));
    assert_eq!(report.records.len(), 6);
    assert_eq!(report.validations.len(), 6);

    for record in &report.records {
        assert_eq!(record.attempts, 1);
        assert_eq!(record.invocations, 1);
        assert!(record.output_hash.starts_with("blake3:"));
    }

    let synthesis = report.outputs().get(StageId(6)).unwrap();
    assert!(matches!(synthesis, Value::String(text) if text.starts_with("# Research Synthesis")));

    assert_eq!(
        progress.statuses(StageId(3)),
        vec![StageStatus::Pending, StageStatus::InProgress, StageStatus::Completed]
    );
}

#[tokio::test]
async fn test_stage_requests_use_registry_model_and_limits() {
    let stub = Arc::new(StubInference::new());
    let orch = orchestrator(stub.clone());
    orch.run_pipeline(PipelineKind::ResearchCore, PipelineContext::new(business()), None)
        .await;

    let requests = stub.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[0].model, offerlab_registry::model_plan::UPGRADE_MODEL);
    assert_eq!(requests[3].model, offerlab_registry::model_plan::BASELINE_MODEL);
    assert_eq!(requests[3].max_tokens, 6144);
    assert!(requests.iter().all(|r| r.stream));
}

#[tokio::test]
async fn test_offer_design_after_import() {
    let stub = Arc::new(StubInference::new());
    let orch = orchestrator(stub.clone());

    let mut ctx = PipelineContext::new(business().with("offer_preferences", "coaching, under $200"));
    orch.import_upstream(&mut ctx, &fixture_outputs(&[1, 2, 3, 4, 5])).unwrap();

    let report = orch.run_pipeline(PipelineKind::OfferDesign, ctx, None).await;

    assert!(report.is_completed(), "{:?}", report.failure);
    assert_eq!(
        report.outputs().ids(),
        ids(&[1, 2, 3, 4, 5, 7, 8, 9, 10, 11, 12, 13])
    );
    assert_eq!(stub.calls(), ids(&[7, 8, 9, 10, 11, 12, 13]));
    // Only executed stages get records
    assert_eq!(report.records.first().unwrap().stage, StageId(7));
}

#[tokio::test]
async fn test_content_pipeline_with_optional_offer_outputs() {
    let stub = Arc::new(StubInference::new());
    let orch = orchestrator(stub.clone());

    let mut ctx = PipelineContext::new(business());
    orch.import_upstream(&mut ctx, &fixture_outputs(&[1, 2, 3, 4, 5, 7, 8])).unwrap();

    let report = orch.run_pipeline(PipelineKind::Content, ctx, None).await;
    assert!(report.is_completed());
    assert_eq!(stub.calls(), ids(&[17]));
    let pillars = report.outputs().get(StageId(17)).unwrap();
    assert_eq!(pillars["content_pillars"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_import_is_ordered_and_dependency_checked() {
    let orch = orchestrator(Arc::new(StubInference::new()));

    // Out-of-order input is recorded in ascending id order
    let upstream = fixture_outputs(&[2, 1]);
    let mut ctx = PipelineContext::new(business());
    orch.import_upstream(&mut ctx, &upstream).unwrap();
    assert_eq!(ctx.outputs().ids(), ids(&[1, 2]));

    // Avatar without competitive landscape breaks the chain
    let mut ctx = PipelineContext::new(business());
    let err = orch
        .import_upstream(&mut ctx, &fixture_outputs(&[1, 2, 4]))
        .unwrap_err();
    assert_eq!(err.kind(), offerlab_core::ErrorKind::DependencyMissing);
    assert_eq!(ctx.outputs().ids(), ids(&[1, 2]));
}

#[tokio::test]
async fn test_chunks_are_forwarded_while_streaming() {
    let stub = Arc::new(StubInference::new());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orch = orchestrator(stub).with_chunk_sink(Arc::new(ChannelSink(tx)));

    let report = orch
        .run("single", &ids(&[1]), PipelineContext::new(business()), None)
        .await;
    assert!(report.is_completed());

    let mut streamed = String::new();
    while let Ok(chunk) = rx.try_recv() {
        streamed.push_str(&chunk);
    }
    assert_eq!(streamed, fixture(1).unwrap());
    assert_eq!(report.records[0].response_bytes, streamed.len());
}

#[tokio::test]
async fn test_report_serializes() {
    let orch = orchestrator(Arc::new(StubInference::new()));
    let report = orch
        .run("single", &ids(&[1]), PipelineContext::new(business()), None)
        .await;
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["state"]["state"], "completed");
    assert_eq!(json["pipeline"], "single");
    assert!(json["context"]["outputs"]["1"]["market_overview"].is_string());
    assert!(json["failure"].is_null());
}
