//! Server configuration from the environment
use crate::provider::DEFAULT_BASE_URL;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("{var}: {message}")]
    InvalidVar { var: &'static str, message: String },

    #[error("stage registry: {0}")]
    Registry(#[from] offerlab_registry::RegistryError),

    #[error("prompt templates: {0}")]
    Prompts(#[from] offerlab_prompts::PromptTemplateError),

    #[error("pipeline config: {0}")]
    Pipeline(#[from] offerlab_stages::ConfigError),

    #[error("inference provider: {0}")]
    Provider(#[from] offerlab_core::InferenceError),

    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub addr: String,
    pub api_key: Option<String>,
    pub provider_url: String,
    pub provider_connect_timeout: Duration,
    /// YAML `PipelineConfig`; defaults apply when unset
    pub pipeline_config: Option<String>,
    /// YAML stage table replacing the built-in registry
    pub registry: Option<String>,
    /// YAML prompt templates replacing the built-in set
    pub prompts: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8787".to_string(),
            api_key: None,
            provider_url: DEFAULT_BASE_URL.to_string(),
            provider_connect_timeout: Duration::from_secs(10),
            pipeline_config: None,
            registry: None,
            prompts: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let provider_connect_timeout = match get("OFFERLAB_PROVIDER_TIMEOUT_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| StartupError::InvalidVar {
                    var: "OFFERLAB_PROVIDER_TIMEOUT_SECONDS",
                    message: e.to_string(),
                })?,
            None => defaults.provider_connect_timeout,
        };

        Ok(Self {
            addr: get("OFFERLAB_ADDR").unwrap_or(defaults.addr),
            api_key: get("ANTHROPIC_API_KEY"),
            provider_url: get("OFFERLAB_PROVIDER_URL").unwrap_or(defaults.provider_url),
            provider_connect_timeout,
            pipeline_config: get("OFFERLAB_PIPELINE_CONFIG"),
            registry: get("OFFERLAB_REGISTRY"),
            prompts: get("OFFERLAB_PROMPTS"),
        })
    }
}
