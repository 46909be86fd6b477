//! Shared handler state
use crate::config::{ApiConfig, StartupError};
use crate::metrics::ApiMetrics;
use crate::provider::AnthropicInference;
use offerlab_core::PromptBuilder;
use offerlab_digest::ContextExtractor;
use offerlab_prompts::{PromptTemplates, TemplatePromptBuilder};
use offerlab_registry::StageRegistry;
use offerlab_stages::{
    ChunkSink, FanOut, InferenceCapability, PipelineConfig, PipelineOrchestrator, TracingProgress,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StageRegistry>,
    pub inference: Arc<dyn InferenceCapability>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub pipeline: PipelineConfig,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(
        registry: Arc<StageRegistry>,
        inference: Arc<dyn InferenceCapability>,
        prompts: Arc<dyn PromptBuilder>,
        pipeline: PipelineConfig,
    ) -> Result<Self, StartupError> {
        Ok(Self {
            registry,
            inference,
            prompts,
            pipeline,
            metrics: Arc::new(ApiMetrics::new()?),
        })
    }

    /// Load registry, templates and pipeline settings, and connect the provider
    pub fn from_config(config: &ApiConfig) -> Result<Self, StartupError> {
        let pipeline = match &config.pipeline_config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        let registry = match &config.registry {
            Some(path) => StageRegistry::load(path)?,
            None => offerlab_registry::builtin().clone(),
        };

        let extractor = ContextExtractor::new(pipeline.digest.clone());
        let prompts = match &config.prompts {
            Some(path) => TemplatePromptBuilder::load(path, extractor)?,
            None => TemplatePromptBuilder::new(PromptTemplates::builtin()?, extractor)?,
        };

        let api_key = config.api_key.clone().ok_or(StartupError::MissingApiKey)?;
        let inference = AnthropicInference::new(api_key, config.provider_url.clone(), config.provider_connect_timeout)?;

        tracing::info!(
            stages = registry.len(),
            plan = %registry.model_plan().version,
            provider = %config.provider_url,
            "state loaded"
        );

        Self::new(Arc::new(registry), Arc::new(inference), Arc::new(prompts), pipeline)
    }

    /// A fresh orchestrator reporting to the log and the metrics registry
    pub fn orchestrator(&self, chunks: Option<Arc<dyn ChunkSink>>) -> PipelineOrchestrator {
        let progress = FanOut::new()
            .with(Arc::new(TracingProgress))
            .with(self.metrics.clone());
        let orchestrator = PipelineOrchestrator::new(
            self.registry.clone(),
            self.inference.clone(),
            self.prompts.clone(),
            self.pipeline.clone(),
        )
        .with_progress(Arc::new(progress));
        match chunks {
            Some(chunks) => orchestrator.with_chunk_sink(chunks),
            None => orchestrator,
        }
    }
}
