//! API errors and their HTTP mapping
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use offerlab_core::{ErrorKind, PipelineError, StageId};
use offerlab_stages::StageFailure;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("stage {0} is not registered")]
    UnknownStage(StageId),

    #[error("unknown pipeline '{0}'")]
    UnknownPipeline(String),

    #[error("pipeline '{pipeline}' needs upstream output for stages {}", format_ids(.missing))]
    MissingUpstream { pipeline: String, missing: Vec<StageId> },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{}", .0.message)]
    Stage(Box<StageFailure>),

    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

fn format_ids(ids: &[StageId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// HTTP status for a stage failure kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedOutput | ErrorKind::ValidationFailure => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransportFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::DependencyMissing | ErrorKind::DuplicateOutput => StatusCode::CONFLICT,
        ErrorKind::BudgetExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::UnknownStage => StatusCode::NOT_FOUND,
        ErrorKind::Cancelled | ErrorKind::PromptBuild => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownStage(_) | ApiError::UnknownPipeline(_) => StatusCode::NOT_FOUND,
            ApiError::MissingUpstream { .. } => StatusCode::CONFLICT,
            ApiError::Pipeline(err) => status_for(err.kind()),
            ApiError::Stage(failure) => status_for(failure.kind),
            ApiError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::UnknownStage(_) => ErrorKind::UnknownStage.as_str(),
            ApiError::UnknownPipeline(_) => "unknown_pipeline",
            ApiError::MissingUpstream { .. } => ErrorKind::DependencyMissing.as_str(),
            ApiError::Pipeline(err) => err.kind().as_str(),
            ApiError::Stage(failure) => failure.kind.as_str(),
            ApiError::Metrics(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Stage(failure) => json!({ "error": failure }),
            _ => json!({
                "error": {
                    "kind": self.kind(),
                    "message": self.to_string(),
                }
            }),
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), kind = self.kind(), "{}", self);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds_map_to_status() {
        assert_eq!(status_for(ErrorKind::ValidationFailure), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::TransportFailure), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::DependencyMissing), StatusCode::CONFLICT);
    }

    #[test]
    fn test_missing_upstream_message() {
        let err = ApiError::MissingUpstream {
            pipeline: "content".into(),
            missing: vec![StageId(2), StageId(4)],
        };
        assert_eq!(err.to_string(), "pipeline 'content' needs upstream output for stages 2, 4");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
