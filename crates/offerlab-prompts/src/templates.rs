//! Prompt template files
//!
//! Templates live in a YAML file keyed by stage id:
//!
//! ```yaml
//! version: "1.0"
//! preamble: "You are ..."
//! stages:
//!   1:
//!     description: Market analysis
//!     template: "Analyse the market for {{business.niche}} ..."
//! ```

use crate::PromptTemplateError;
use offerlab_core::StageId;
use serde::Deserialize;
use std::collections::BTreeMap;

const BUILTIN_TEMPLATES: &str = include_str!("../prompts/stage-prompts.yaml");

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplates {
    pub version: String,
    /// Rendered ahead of every stage template
    #[serde(default)]
    pub preamble: Option<String>,
    pub stages: BTreeMap<StageId, StagePrompt>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagePrompt {
    #[serde(default)]
    pub description: String,
    pub template: String,
}

impl PromptTemplates {
    pub fn load(path: &str) -> Result<Self, PromptTemplateError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PromptTemplateError::Io(format!("{}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PromptTemplateError> {
        serde_yaml::from_str(yaml).map_err(|e| PromptTemplateError::Parse(e.to_string()))
    }

    /// Templates compiled into the binary
    pub fn builtin() -> Result<Self, PromptTemplateError> {
        Self::from_yaml(BUILTIN_TEMPLATES)
    }

    pub fn get(&self, stage: StageId) -> Option<&StagePrompt> {
        self.stages.get(&stage)
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keyed_by_stage() {
        let templates = PromptTemplates::from_yaml(
            r#"
version: "2.1"
stages:
  3:
    description: Competitors
    template: "List competitors for {{business.niche}}"
  1:
    template: "Market for {{business.niche}}"
"#,
        )
        .unwrap();
        assert_eq!(templates.stage_ids(), vec![StageId(1), StageId(3)]);
        assert!(templates.preamble.is_none());
        assert_eq!(templates.get(StageId(1)).unwrap().description, "");
    }

    #[test]
    fn test_builtin_covers_every_stage() {
        let templates = PromptTemplates::builtin().unwrap();
        let ids: Vec<u32> = templates.stage_ids().iter().map(|id| id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 17]);
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            PromptTemplates::from_yaml("stages: [1, 2"),
            Err(PromptTemplateError::Parse(_))
        ));
        assert!(matches!(
            PromptTemplates::load("/nonexistent/prompts.yaml"),
            Err(PromptTemplateError::Io(_))
        ));
    }
}
