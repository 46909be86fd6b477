//! OfferLab Core: stage model, pipeline context and error taxonomy
//!
//! Shared vocabulary for the generation pipeline. Every other crate in the
//! workspace speaks in these types: a [`StageDefinition`] describes one
//! LLM-backed step, a [`PipelineContext`] accumulates validated outputs in
//! dependency order, and [`PipelineError`] is the single error model the
//! orchestrator reports.

pub mod stage;
pub mod context;
pub mod data_model;
pub mod error;
pub mod prompt;
pub mod retry;

pub use stage::{OutputFormat, StageCategory, StageDefinition, StageId};
pub use context::{BusinessContext, PipelineContext, StageOutputs};
pub use data_model::{hash_output, ProgressEvent, StageRecord, StageStatus};
pub use error::{ErrorKind, InferenceError, PipelineError};
pub use prompt::{PromptBuilder, PromptError};
pub use retry::{with_retries, with_retries_if, Exhausted, RetryPolicy};

/// Engine version reported by the API and stamped into run reports
pub const OFFERLAB_VERSION: &str = "1.0.0";
