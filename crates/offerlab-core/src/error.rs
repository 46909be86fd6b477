//! Unified Error Model
use crate::stage::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single inference call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl InferenceError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Network(_) | InferenceError::Stream(_) => true,
            InferenceError::Provider { status, .. } => *status == 429 || *status >= 500,
            InferenceError::InvalidRequest(_) | InferenceError::TimedOut(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("TRANSPORT/stage {stage}: inference failed after {attempts} attempt(s): {source}")]
    InferenceFailure {
        stage: StageId,
        attempts: u32,
        #[source]
        source: InferenceError,
    },

    #[error("MALFORMED/stage {stage}: {message}")]
    MalformedOutput { stage: StageId, message: String },

    #[error("VALIDATION/stage {stage}: {}", .errors.join("; "))]
    ValidationFailure {
        stage: StageId,
        errors: Vec<String>,
        quality_score: u32,
    },

    #[error("DEPENDENCY/stage {stage} requires stage {missing}, which has no validated output")]
    DependencyMissing { stage: StageId, missing: StageId },

    #[error("BUDGET/stage {stage}: ~{estimated_tokens} tokens exceeds the {limit} token window")]
    BudgetExceeded {
        stage: StageId,
        estimated_tokens: u32,
        limit: u32,
    },

    #[error("TIMEOUT/stage {stage}: no completion within {after:?}")]
    Timeout { stage: StageId, after: Duration },

    #[error("CANCELLED/stage {stage}")]
    Cancelled { stage: StageId },

    #[error("PROMPT/stage {stage}: {message}")]
    PromptBuild { stage: StageId, message: String },

    #[error("REGISTRY/stage {0} is not registered")]
    UnknownStage(StageId),

    #[error("STATE/stage {0} already has a recorded output")]
    DuplicateOutput(StageId),
}

/// Stable classification of a [`PipelineError`], used in reports and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TransportFailure,
    MalformedOutput,
    ValidationFailure,
    DependencyMissing,
    BudgetExceeded,
    Timeout,
    Cancelled,
    PromptBuild,
    UnknownStage,
    DuplicateOutput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::MalformedOutput => "malformed_output",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::DependencyMissing => "dependency_missing",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::PromptBuild => "prompt_build",
            ErrorKind::UnknownStage => "unknown_stage",
            ErrorKind::DuplicateOutput => "duplicate_output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InferenceFailure { .. } => ErrorKind::TransportFailure,
            PipelineError::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            PipelineError::ValidationFailure { .. } => ErrorKind::ValidationFailure,
            PipelineError::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            PipelineError::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Cancelled { .. } => ErrorKind::Cancelled,
            PipelineError::PromptBuild { .. } => ErrorKind::PromptBuild,
            PipelineError::UnknownStage(_) => ErrorKind::UnknownStage,
            PipelineError::DuplicateOutput(_) => ErrorKind::DuplicateOutput,
        }
    }

    /// Stage the error is attributed to
    pub fn stage(&self) -> StageId {
        match self {
            PipelineError::InferenceFailure { stage, .. }
            | PipelineError::MalformedOutput { stage, .. }
            | PipelineError::ValidationFailure { stage, .. }
            | PipelineError::DependencyMissing { stage, .. }
            | PipelineError::BudgetExceeded { stage, .. }
            | PipelineError::Timeout { stage, .. }
            | PipelineError::Cancelled { stage }
            | PipelineError::PromptBuild { stage, .. } => *stage,
            PipelineError::UnknownStage(stage) | PipelineError::DuplicateOutput(stage) => *stage,
        }
    }
}
