//! API Handlers
use crate::error::{status_for, ApiError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use offerlab_core::{BusinessContext, PipelineContext, StageId, StageOutputs, OFFERLAB_VERSION};
use offerlab_registry::PipelineKind;
use offerlab_stages::{CancellationToken, ChannelSink, RunReport};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;

/// Business inputs plus outputs validated by earlier runs
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub business: BusinessContext,
    #[serde(default)]
    pub upstream: StageOutputs,
}

fn prepare(state: &AppState, request: RunRequest) -> Result<PipelineContext, ApiError> {
    let mut ctx = PipelineContext::new(request.business);
    state.orchestrator(None).import_upstream(&mut ctx, &request.upstream)?;
    Ok(ctx)
}

fn stage_result(report: &RunReport, stage: StageId) -> Value {
    json!({
        "run_id": report.run_id,
        "stage": stage,
        "output": report.outputs().get(stage),
        "record": report.records.last(),
        "validation": report.validations.last(),
    })
}

/// Run a single stage against the supplied upstream outputs
pub async fn run_stage(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Value>, ApiError> {
    let stage = StageId(id);
    if !state.registry.contains(stage) {
        return Err(ApiError::UnknownStage(stage));
    }
    let ctx = prepare(&state, request)?;

    let report = state
        .orchestrator(None)
        .run(&format!("stage-{}", stage), &[stage], ctx, None)
        .await;
    state.metrics.record_run(&report);

    match report.failure {
        None => Ok(Json(stage_result(&report, stage))),
        Some(failure) => Err(ApiError::Stage(Box::new(failure))),
    }
}

/// Run a single stage and stream its text as server-sent events.
///
/// `chunk` events carry model text as it arrives; the stream ends with
/// one `done` event (the stage result) or one `failed` event.
pub async fn stream_stage(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let stage = StageId(id);
    if !state.registry.contains(stage) {
        return Err(ApiError::UnknownStage(stage));
    }
    let ctx = prepare(&state, request)?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator = state.orchestrator(Some(Arc::new(ChannelSink(tx))));
    let token = CancellationToken::new();
    // Cancels the run when the client drops the event stream
    let guard = token.clone().drop_guard();
    let metrics = state.metrics.clone();
    let run = tokio::spawn(async move {
        let report = orchestrator
            .run(&format!("stage-{}", stage), &[stage], ctx, Some(token))
            .await;
        metrics.record_run(&report);
        report
    });

    let events = async_stream::stream! {
        let _guard = guard;
        // The channel closes once the spawned run drops its orchestrator
        while let Some(chunk) = rx.recv().await {
            yield Ok(Event::default().event("chunk").data(chunk));
        }
        let last = match run.await {
            Ok(report) => match &report.failure {
                None => Event::default().event("done").json_data(stage_result(&report, stage)),
                Some(failure) => Event::default().event("failed").json_data(failure),
            },
            Err(e) => Ok(Event::default().event("failed").data(format!("run aborted: {}", e))),
        };
        match last {
            Ok(event) => yield Ok(event),
            Err(e) => yield Ok(Event::default().event("failed").data(e.to_string())),
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Run a named pipeline. The body is the full run report; the status
/// reflects the failure kind when the run did not complete.
pub async fn run_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RunRequest>,
) -> Result<Response, ApiError> {
    let kind: PipelineKind = name.parse().map_err(|_| ApiError::UnknownPipeline(name.clone()))?;

    let missing: Vec<StageId> = kind
        .required_upstream()
        .iter()
        .copied()
        .filter(|id| !request.upstream.contains(*id))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::MissingUpstream {
            pipeline: kind.name().to_string(),
            missing,
        });
    }

    let ctx = prepare(&state, request)?;
    let report = state.orchestrator(None).run_pipeline(kind, ctx, None).await;
    state.metrics.record_run(&report);

    let status = match &report.failure {
        None => StatusCode::OK,
        Some(failure) => status_for(failure.kind),
    };
    Ok((status, Json(report)).into_response())
}

pub async fn list_stages(State(state): State<AppState>) -> Json<Value> {
    let stages: Vec<_> = state.registry.iter().collect();
    Json(json!({ "stages": stages }))
}

pub async fn get_stage(State(state): State<AppState>, Path(id): Path<u32>) -> Result<Json<Value>, ApiError> {
    let def = state
        .registry
        .get_stage_config(StageId(id))
        .map_err(|_| ApiError::UnknownStage(StageId(id)))?;
    Ok(Json(json!(def)))
}

pub async fn upgrade_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.registry.upgrade_status()))
}

pub async fn list_pipelines() -> Json<Value> {
    let pipelines: Vec<Value> = PipelineKind::all()
        .iter()
        .map(|kind| {
            json!({
                "name": kind.name(),
                "stages": kind.stages(),
                "required_upstream": kind.required_upstream(),
            })
        })
        .collect();
    Json(json!({ "pipelines": pipelines }))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": OFFERLAB_VERSION,
            "stages": state.registry.len(),
        })),
    )
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.encode()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
