//! OfferLab Prompts: template-driven prompt builder
//!
//! Renders one Handlebars template per stage against the pipeline context.
//! The research digest is computed on every build, so offer and content
//! stages never see raw research JSON unless their template asks for it.

pub mod renderer;
pub mod templates;

pub use renderer::TemplatePromptBuilder;
pub use templates::{PromptTemplates, StagePrompt};

use offerlab_core::StageId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptTemplateError {
    #[error("template file: {0}")]
    Io(String),
    #[error("template parse failed: {0}")]
    Parse(String),
    #[error("template for stage {stage} does not compile: {message}")]
    Template { stage: StageId, message: String },
}
