//! OfferLab Stages: execution and orchestration
//!
//! # Pipeline Flow
//!
//! ```text
//! PipelineContext → PromptBuilder → Inference (retried) → Parse → Validate → record
//!                        ↑                                                  │
//!                        └──────────────── next stage ──────────────────────┘
//! ```
//!
//! The [`StageExecutor`] turns one stage into raw and parsed output. The
//! [`PipelineOrchestrator`] sequences a plan of stages, validates each
//! output, and stops at the first failure.

pub mod config;
pub mod executor;
pub mod inference;
pub mod orchestrator;
pub mod progress;

pub use config::{ConfigError, PipelineConfig};
pub use executor::{parse_output, StageExecutor, StageResponse};
pub use inference::{
    collect_stream, ChannelSink, ChunkSink, ChunkStream, InferenceCapability, InferenceRequest, NoopSink,
};
pub use orchestrator::{PipelineOrchestrator, RunReport, RunState, StageFailure};
pub use progress::{FanOut, NoopProgress, ProgressSink, RecordingProgress, TracingProgress};
pub use tokio_util::sync::CancellationToken;
