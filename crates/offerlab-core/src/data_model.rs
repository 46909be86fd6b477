//! Data Model: progress events and per-stage run records
use crate::stage::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status shown to a progress indicator for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub pipeline: String,
    pub stage: StageId,
    pub stage_name: String,
    pub status: StageStatus,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(
        run_id: impl Into<String>,
        pipeline: impl Into<String>,
        stage: StageId,
        stage_name: impl Into<String>,
        status: StageStatus,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline: pipeline.into(),
            stage,
            stage_name: stage_name.into(),
            status,
            at: Utc::now(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Trace of one completed stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub name: String,
    pub model_id: String,
    /// Inference attempts used by the successful invocation
    pub attempts: u32,
    /// Invocations needed before the output validated
    pub invocations: u32,
    pub latency_ms: u64,
    pub output_hash: String,
    pub quality_score: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub response_bytes: usize,
}

/// Content hash of a validated output
pub fn hash_output(output: &Value) -> String {
    let bytes = serde_json::to_vec(output).unwrap_or_default();
    format!("blake3:{}", blake3::hash(&bytes))
}
