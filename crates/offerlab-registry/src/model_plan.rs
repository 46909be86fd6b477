//! Model plan: which model each stage runs on
//!
//! Model upgrades are rolled out per phase. A plan names the baseline model
//! and the stages that have been moved off it; it is configuration, not
//! runtime logic.
use offerlab_core::StageId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BASELINE_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const UPGRADE_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPlan {
    /// Plan version (ex: "2025.06-phase1")
    pub version: String,
    /// Operator-facing label of the rollout phase
    pub phase_label: String,
    pub baseline_model: String,
    /// Stage → model for stages moved off the baseline
    #[serde(default)]
    pub overrides: BTreeMap<StageId, String>,
}

impl ModelPlan {
    /// Every stage on the baseline model
    pub fn baseline() -> Self {
        Self {
            version: "2024.10-baseline".to_string(),
            phase_label: "Baseline".to_string(),
            baseline_model: BASELINE_MODEL.to_string(),
            overrides: BTreeMap::new(),
        }
    }

    /// The plan currently deployed: analytical research stages upgraded
    pub fn current() -> Self {
        let overrides = [1, 2, 3]
            .into_iter()
            .map(|id| (StageId(id), UPGRADE_MODEL.to_string()))
            .collect();
        Self {
            version: "2025.06-phase1".to_string(),
            phase_label: "Phase 1: analytical research stages".to_string(),
            baseline_model: BASELINE_MODEL.to_string(),
            overrides,
        }
    }

    pub fn with_override(mut self, stage: StageId, model: impl Into<String>) -> Self {
        self.overrides.insert(stage, model.into());
        self
    }
}

impl Default for ModelPlan {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Reporting view over the registry: which stages run on the baseline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeStatus {
    pub baseline_stage_ids: Vec<StageId>,
    pub non_baseline_stage_ids: Vec<StageId>,
    pub current_phase_label: String,
    pub plan_version: String,
    pub baseline_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_plan_upgrades_analytical_stages() {
        let plan = ModelPlan::current();
        assert_eq!(plan.overrides.len(), 3);
        assert!(!plan.overrides.contains_key(&StageId(4)));
        assert_eq!(plan.overrides[&StageId(1)], UPGRADE_MODEL);
    }

    #[test]
    fn test_plan_from_yaml_with_numeric_keys() {
        let plan: ModelPlan = serde_yaml::from_str(
            r#"
version: "test"
phase_label: "Trial"
baseline_model: "base"
overrides:
  7: "fast"
"#,
        )
        .unwrap();
        assert_eq!(plan.overrides[&StageId(7)], "fast");
    }
}
