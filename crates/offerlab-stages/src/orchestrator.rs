//! Pipeline orchestrator
//!
//! Runs a plan of stages strictly in order against one [`PipelineContext`].
//! A stage output enters the context only after it validates; the first
//! failing stage ends the run and everything recorded before it is kept.
//!
//! ```text
//! Idle → Running(1) → Running(2) → … → Completed
//!                          ↘ Failed(stage) | Cancelled(stage)
//! ```

use crate::config::PipelineConfig;
use crate::executor::StageExecutor;
use crate::inference::{ChunkSink, InferenceCapability, NoopSink};
use crate::progress::{NoopProgress, ProgressSink};
use offerlab_core::{
    hash_output, ErrorKind, PipelineContext, PipelineError, ProgressEvent, PromptBuilder, StageDefinition, StageId,
    StageOutputs, StageRecord, StageStatus, OFFERLAB_VERSION,
};
use offerlab_quality::{ResponseValidator, ValidationMetrics, ValidationResult};
use offerlab_registry::{PipelineKind, StageRegistry};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running { stage: StageId },
    Completed,
    Failed { stage: StageId, kind: ErrorKind },
    Cancelled { stage: StageId },
}

/// Why a run stopped
#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub stage: StageId,
    pub stage_name: String,
    pub kind: ErrorKind,
    pub message: String,
    /// Validation errors, when the output was rejected
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ValidationMetrics>,
}

impl StageFailure {
    fn new(stage_name: &str, err: &PipelineError, validation: Option<&ValidationResult>) -> Self {
        Self {
            stage: err.stage(),
            stage_name: stage_name.to_string(),
            kind: err.kind(),
            message: err.to_string(),
            errors: validation.map(|v| v.errors().to_vec()).unwrap_or_default(),
            warnings: validation.map(|v| v.warnings().to_vec()).unwrap_or_default(),
            quality_score: validation.map(|v| v.quality_score()),
            metrics: validation.map(|v| v.metrics().clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub pipeline: String,
    pub engine_version: &'static str,
    pub state: RunState,
    /// One record per completed stage, in run order
    pub records: Vec<StageRecord>,
    /// Validation verdicts for the completed stages, parallel to `records`
    pub validations: Vec<ValidationResult>,
    pub failure: Option<StageFailure>,
    pub context: PipelineContext,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn outputs(&self) -> &StageOutputs {
        self.context.outputs()
    }
}

struct Accepted {
    output: Value,
    record: StageRecord,
    validation: ValidationResult,
}

pub struct PipelineOrchestrator {
    registry: Arc<StageRegistry>,
    validator: Arc<ResponseValidator>,
    executor: StageExecutor,
    progress: Arc<dyn ProgressSink>,
    chunks: Arc<dyn ChunkSink>,
}

impl PipelineOrchestrator {
    pub fn new(
        registry: Arc<StageRegistry>,
        inference: Arc<dyn InferenceCapability>,
        prompts: Arc<dyn PromptBuilder>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            validator: Arc::new(ResponseValidator::standard()),
            executor: StageExecutor::new(inference, prompts, config),
            progress: Arc::new(NoopProgress),
            chunks: Arc::new(NoopSink),
        }
    }

    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_chunk_sink(mut self, chunks: Arc<dyn ChunkSink>) -> Self {
        self.chunks = chunks;
        self
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    pub fn config(&self) -> &PipelineConfig {
        self.executor.config()
    }

    /// Seed a context with outputs validated by an earlier run. Entries are
    /// recorded in ascending stage order through the same dependency check
    /// as live outputs.
    pub fn import_upstream(&self, ctx: &mut PipelineContext, upstream: &StageOutputs) -> Result<(), PipelineError> {
        let mut entries: Vec<(StageId, &Value)> = upstream.iter().collect();
        entries.sort_by_key(|(id, _)| *id);
        for (id, output) in entries {
            let def = self
                .registry
                .get_stage_config(id)
                .map_err(|_| PipelineError::UnknownStage(id))?;
            ctx.record(def, output.clone())?;
        }
        Ok(())
    }

    pub async fn run_pipeline(&self, kind: PipelineKind, ctx: PipelineContext, cancel: Option<CancellationToken>) -> RunReport {
        self.run(kind.name(), kind.stages(), ctx, cancel).await
    }

    /// Run `plan` in order. Never panics on stage failure; the outcome is
    /// in the report.
    pub async fn run(
        &self,
        pipeline: &str,
        plan: &[StageId],
        mut ctx: PipelineContext,
        cancel: Option<CancellationToken>,
    ) -> RunReport {
        let run_id = ctx.run_id.to_string();
        let cancel = cancel.unwrap_or_default();
        let mut records = Vec::new();
        let mut validations = Vec::new();

        let mut defs = Vec::with_capacity(plan.len());
        for id in plan {
            match self.registry.get_stage_config(*id) {
                Ok(def) => defs.push(def),
                Err(_) => {
                    let err = PipelineError::UnknownStage(*id);
                    tracing::error!(run_id = %run_id, pipeline, stage = %id, "unknown stage in plan");
                    return self.report(
                        &run_id,
                        pipeline,
                        RunState::Failed { stage: *id, kind: err.kind() },
                        records,
                        validations,
                        Some(StageFailure::new("", &err, None)),
                        ctx,
                    );
                }
            }
        }

        for def in &defs {
            self.emit(&run_id, pipeline, def, StageStatus::Pending, None);
        }
        tracing::info!(run_id = %run_id, pipeline, stages = defs.len(), "pipeline started");

        for def in defs {
            if cancel.is_cancelled() {
                return self.cancelled(&run_id, pipeline, def, records, validations, ctx);
            }

            tracing::info!(run_id = %run_id, stage = %def.id, name = %def.name, model = %def.model_id, "stage started");
            self.emit(&run_id, pipeline, def, StageStatus::InProgress, None);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.run_stage(def, &ctx) => Some(result),
            };

            let accepted = match outcome {
                None => return self.cancelled(&run_id, pipeline, def, records, validations, ctx),
                Some(Ok(accepted)) => accepted,
                Some(Err(failure)) => {
                    return self.failed(&run_id, pipeline, def, failure, records, validations, ctx);
                }
            };

            if let Err(err) = ctx.record(def, accepted.output) {
                let failure = StageFailure::new(&def.name, &err, None);
                return self.failed(&run_id, pipeline, def, failure, records, validations, ctx);
            }

            tracing::info!(
                run_id = %run_id,
                stage = %def.id,
                score = accepted.record.quality_score,
                attempts = accepted.record.attempts,
                latency_ms = accepted.record.latency_ms,
                "stage completed"
            );
            self.emit(&run_id, pipeline, def, StageStatus::Completed, None);
            records.push(accepted.record);
            validations.push(accepted.validation);
        }

        tracing::info!(run_id = %run_id, pipeline, "pipeline completed");
        self.report(&run_id, pipeline, RunState::Completed, records, validations, None, ctx)
    }

    /// Invoke a stage until its output validates or the validation attempt
    /// budget is spent.
    async fn run_stage(&self, def: &StageDefinition, ctx: &PipelineContext) -> Result<Accepted, StageFailure> {
        if ctx.output(def.id).is_some() {
            return Err(StageFailure::new(&def.name, &PipelineError::DuplicateOutput(def.id), None));
        }
        if let Some(missing) = ctx.missing_dependencies(def).first() {
            let err = PipelineError::DependencyMissing {
                stage: def.id,
                missing: *missing,
            };
            return Err(StageFailure::new(&def.name, &err, None));
        }

        let max_invocations = self.config().max_validation_attempts.max(1);
        let started = Instant::now();
        let mut invocation = 0;

        loop {
            invocation += 1;
            let response = self
                .executor
                .execute(def, ctx, self.chunks.as_ref())
                .await
                .map_err(|err| StageFailure::new(&def.name, &err, None))?;
            let response_bytes = response.raw.len();

            let (validation, err) = match response.parsed {
                Ok(output) => {
                    let validation = self.validator.validate(def.id, &output, response_bytes);
                    if validation.is_valid() {
                        let record = StageRecord {
                            stage: def.id,
                            name: def.name.clone(),
                            model_id: def.model_id.clone(),
                            attempts: response.attempts,
                            invocations: invocation,
                            latency_ms: started.elapsed().as_millis() as u64,
                            output_hash: hash_output(&output),
                            quality_score: validation.quality_score(),
                            warnings: validation.warnings().to_vec(),
                            response_bytes,
                        };
                        return Ok(Accepted {
                            output,
                            record,
                            validation,
                        });
                    }
                    let err = PipelineError::ValidationFailure {
                        stage: def.id,
                        errors: validation.errors().to_vec(),
                        quality_score: validation.quality_score(),
                    };
                    (validation, err)
                }
                Err(parse_error) => {
                    let validation = self.validator.validate_malformed(def.id, &parse_error, response_bytes);
                    let err = PipelineError::MalformedOutput {
                        stage: def.id,
                        message: parse_error,
                    };
                    (validation, err)
                }
            };

            if invocation >= max_invocations {
                return Err(StageFailure::new(&def.name, &err, Some(&validation)));
            }
            tracing::warn!(
                stage = %def.id,
                invocation,
                max_invocations,
                score = validation.quality_score(),
                errors = ?validation.errors(),
                "stage output rejected, invoking again"
            );
        }
    }

    fn emit(&self, run_id: &str, pipeline: &str, def: &StageDefinition, status: StageStatus, message: Option<&str>) {
        let mut event = ProgressEvent::new(run_id, pipeline, def.id, def.name.as_str(), status);
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.progress.emit(&event);
    }

    #[allow(clippy::too_many_arguments)]
    fn failed(
        &self,
        run_id: &str,
        pipeline: &str,
        def: &StageDefinition,
        failure: StageFailure,
        records: Vec<StageRecord>,
        validations: Vec<ValidationResult>,
        ctx: PipelineContext,
    ) -> RunReport {
        tracing::error!(
            run_id = %run_id,
            stage = %def.id,
            kind = failure.kind.as_str(),
            score = ?failure.quality_score,
            "{}",
            failure.message
        );
        self.emit(run_id, pipeline, def, StageStatus::Error, Some(&failure.message));
        let state = RunState::Failed {
            stage: failure.stage,
            kind: failure.kind,
        };
        self.report(run_id, pipeline, state, records, validations, Some(failure), ctx)
    }

    fn cancelled(
        &self,
        run_id: &str,
        pipeline: &str,
        def: &StageDefinition,
        records: Vec<StageRecord>,
        validations: Vec<ValidationResult>,
        ctx: PipelineContext,
    ) -> RunReport {
        tracing::warn!(run_id = %run_id, stage = %def.id, "pipeline cancelled");
        let err = PipelineError::Cancelled { stage: def.id };
        self.emit(run_id, pipeline, def, StageStatus::Error, Some("cancelled"));
        let failure = StageFailure::new(&def.name, &err, None);
        self.report(
            run_id,
            pipeline,
            RunState::Cancelled { stage: def.id },
            records,
            validations,
            Some(failure),
            ctx,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        run_id: &str,
        pipeline: &str,
        state: RunState,
        records: Vec<StageRecord>,
        validations: Vec<ValidationResult>,
        failure: Option<StageFailure>,
        context: PipelineContext,
    ) -> RunReport {
        RunReport {
            run_id: run_id.to_string(),
            pipeline: pipeline.to_string(),
            engine_version: OFFERLAB_VERSION,
            state,
            records,
            validations,
            failure,
            context,
        }
    }
}
