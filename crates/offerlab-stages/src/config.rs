//! Pipeline configuration
use offerlab_core::{RetryPolicy, StageCategory, StageDefinition};
use offerlab_digest::DigestConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("config parse failed: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transport retries per invocation
    pub retry: RetryPolicy,
    /// Invocations allowed per stage when the output fails validation.
    /// 1 means a rejected output ends the run.
    pub max_validation_attempts: u32,
    pub stage_timeout_secs: u64,
    /// Ceiling for synthesis-category stages
    pub synthesis_timeout_secs: u64,
    /// Provider context window, prompt plus reserved output
    pub context_window_tokens: u32,
    pub digest: DigestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_validation_attempts: 1,
            stage_timeout_secs: 180,
            synthesis_timeout_secs: 600,
            context_window_tokens: 200_000,
            digest: DigestConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&yaml)
    }

    /// Per-attempt timeout for a stage
    pub fn timeout_for(&self, stage: &StageDefinition) -> Duration {
        match stage.category {
            StageCategory::Synthesis => Duration::from_secs(self.synthesis_timeout_secs),
            _ => Duration::from_secs(self.stage_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.max_validation_attempts, 1);
        assert_eq!(config.digest.max_chars, 3000);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PipelineConfig::from_yaml("max_validation_attempts: 2\nretry:\n  max_attempts: 5\n  delay: 250\n").unwrap();
        assert_eq!(config.max_validation_attempts, 2);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert_eq!(config.stage_timeout_secs, 180);
    }

    #[test]
    fn test_synthesis_gets_longer_timeout() {
        let config = PipelineConfig::default();
        let synthesis = StageDefinition::new(6, "Synthesis", StageCategory::Synthesis, "m", 8192);
        let analytical = StageDefinition::new(1, "Market", StageCategory::Analytical, "m", 4096);
        assert_eq!(config.timeout_for(&synthesis), Duration::from_secs(600));
        assert_eq!(config.timeout_for(&analytical), Duration::from_secs(180));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(PipelineConfig::from_yaml("retry: [1"), Err(ConfigError::Parse(_))));
        assert!(matches!(PipelineConfig::load("/nonexistent.yaml"), Err(ConfigError::Io { .. })));
    }
}
