//! Prompt builder seam
//!
//! Prompt wording lives outside the core. A builder receives the stage being
//! run and a read-only view of the context and returns the prompt string.
use crate::context::PipelineContext;
use crate::stage::StageDefinition;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct PromptError(pub String);

impl PromptError {
    pub fn new(message: impl Into<String>) -> Self {
        PromptError(message.into())
    }
}

/// Turns accumulated context into the prompt for one stage
pub trait PromptBuilder: Send + Sync {
    fn build_prompt(
        &self,
        stage: &StageDefinition,
        ctx: &PipelineContext,
    ) -> Result<String, PromptError>;
}

impl<F> PromptBuilder for F
where
    F: Fn(&StageDefinition, &PipelineContext) -> Result<String, PromptError> + Send + Sync,
{
    fn build_prompt(
        &self,
        stage: &StageDefinition,
        ctx: &PipelineContext,
    ) -> Result<String, PromptError> {
        self(stage, ctx)
    }
}
