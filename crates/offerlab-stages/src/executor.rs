//! Stage executor: prompt, budget check, inference with retries, parse
use crate::config::PipelineConfig;
use crate::inference::{collect_stream, ChunkSink, InferenceCapability, InferenceRequest};
use offerlab_core::{
    with_retries_if, Exhausted, InferenceError, OutputFormat, PipelineContext, PipelineError, PromptBuilder,
    StageDefinition, StageId,
};
use offerlab_digest::ContextBudget;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Raw and parsed output of one stage invocation
#[derive(Debug, Clone)]
pub struct StageResponse {
    pub stage: StageId,
    pub raw: String,
    /// Parse error text when the output is not valid for its format
    pub parsed: Result<Value, String>,
    /// Inference attempts spent, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct StageExecutor {
    inference: Arc<dyn InferenceCapability>,
    prompts: Arc<dyn PromptBuilder>,
    config: PipelineConfig,
}

impl StageExecutor {
    pub fn new(inference: Arc<dyn InferenceCapability>, prompts: Arc<dyn PromptBuilder>, config: PipelineConfig) -> Self {
        Self {
            inference,
            prompts,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Invoke one stage. Transport errors are retried up to the policy
    /// ceiling; a timeout ends the invocation immediately.
    pub async fn execute(
        &self,
        stage: &StageDefinition,
        ctx: &PipelineContext,
        sink: &dyn ChunkSink,
    ) -> Result<StageResponse, PipelineError> {
        let prompt = self
            .prompts
            .build_prompt(stage, ctx)
            .map_err(|e| PipelineError::PromptBuild {
                stage: stage.id,
                message: e.0,
            })?;

        ContextBudget::new(self.config.context_window_tokens)
            .check_prompt(&prompt, stage.max_output_tokens)
            .map_err(|overflow| PipelineError::BudgetExceeded {
                stage: stage.id,
                estimated_tokens: overflow.estimated_tokens,
                limit: overflow.limit,
            })?;

        let request = InferenceRequest {
            prompt,
            model: stage.model_id.clone(),
            max_tokens: stage.max_output_tokens,
            stream: true,
        };
        let timeout = self.config.timeout_for(stage);
        let started = Instant::now();

        let outcome = with_retries_if(
            &self.config.retry,
            |attempt| {
                let request = request.clone();
                async move {
                    let result = match tokio::time::timeout(timeout, self.attempt(stage.id, request, sink)).await {
                        Ok(result) => result,
                        Err(_) => Err(InferenceError::TimedOut(timeout)),
                    };
                    if let Err(err) = &result {
                        tracing::warn!(stage = %stage.id, attempt, error = %err, "inference attempt failed");
                    }
                    result
                }
            },
            InferenceError::is_retryable,
        )
        .await;

        let (raw, attempts) = outcome.map_err(|Exhausted { attempts, last_error }| match last_error {
            InferenceError::TimedOut(after) => PipelineError::Timeout { stage: stage.id, after },
            source => PipelineError::InferenceFailure {
                stage: stage.id,
                attempts,
                source,
            },
        })?;

        Ok(StageResponse {
            stage: stage.id,
            parsed: parse_output(stage.output, &raw),
            raw,
            attempts,
            elapsed: started.elapsed(),
        })
    }

    async fn attempt(&self, stage: StageId, request: InferenceRequest, sink: &dyn ChunkSink) -> Result<String, InferenceError> {
        let stream = self.inference.infer(request).await?;
        collect_stream(stream, stage, sink).await
    }
}

/// Parse raw model output for its declared format.
///
/// Surrounding whitespace and a single enclosing markdown code fence are
/// removed; nothing else is repaired.
pub fn parse_output(format: OutputFormat, raw: &str) -> Result<Value, String> {
    let body = strip_code_fence(raw.trim());
    match format {
        OutputFormat::Json => serde_json::from_str(body).map_err(|e| e.to_string()),
        OutputFormat::Markdown => Ok(Value::String(body.to_string())),
    }
}

fn strip_code_fence(text: &str) -> &str {
    const FENCE: &str = "```";
    if !(text.starts_with(FENCE) && text.ends_with(FENCE)) || text.len() < 2 * FENCE.len() {
        return text;
    }
    let Some(first_newline) = text.find('\n') else {
        return text;
    };
    let inner = &text[first_newline + 1..text.len() - FENCE.len()];
    if inner.contains(FENCE) {
        return text;
    }
    inner.trim()
}
