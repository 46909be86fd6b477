//! Stage Registry
use crate::model_plan::{ModelPlan, UpgradeStatus};
use offerlab_core::{StageCategory, StageDefinition, StageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("stage {0} is not registered")]
    NotFound(StageId),

    #[error("stage {0} is registered twice")]
    DuplicateStage(StageId),

    #[error("stage {stage} depends on unregistered stage {dependency}")]
    UnknownDependency { stage: StageId, dependency: StageId },

    #[error("dependency cycle: {}", format_cycle(.0))]
    CyclicDependency(Vec<StageId>),

    #[error("stage {stage} has a pinned model ({pinned}); override to '{requested}' rejected")]
    PinnedModelOverride {
        stage: StageId,
        pinned: String,
        requested: String,
    },

    #[error("model plan overrides unregistered stage {0}")]
    OverrideForUnknownStage(StageId),

    #[error("registry file: {0}")]
    Parse(String),
}

fn format_cycle(ids: &[StageId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" → ")
}

/// On-disk registry layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub model_plan: ModelPlan,
}

/// Immutable stage lookup table
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: BTreeMap<StageId, StageDefinition>,
    plan: ModelPlan,
}

impl StageRegistry {
    /// Validate the table and apply the model plan
    pub fn new(definitions: Vec<StageDefinition>, plan: ModelPlan) -> Result<Self, RegistryError> {
        let mut stages = BTreeMap::new();
        for def in definitions {
            if stages.contains_key(&def.id) {
                return Err(RegistryError::DuplicateStage(def.id));
            }
            stages.insert(def.id, def);
        }

        for def in stages.values() {
            for dep in &def.dependencies {
                if !stages.contains_key(dep) {
                    return Err(RegistryError::UnknownDependency {
                        stage: def.id,
                        dependency: *dep,
                    });
                }
            }
        }

        if let Some(cycle) = find_cycle(&stages) {
            return Err(RegistryError::CyclicDependency(cycle));
        }

        for (id, model) in &plan.overrides {
            let def = stages
                .get_mut(id)
                .ok_or(RegistryError::OverrideForUnknownStage(*id))?;
            if def.model_pinned {
                if def.model_id != *model {
                    return Err(RegistryError::PinnedModelOverride {
                        stage: *id,
                        pinned: def.model_id.clone(),
                        requested: model.clone(),
                    });
                }
                continue;
            }
            def.model_id = model.clone();
        }

        Ok(Self { stages, plan })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            serde_yaml::from_str(yaml).map_err(|e| RegistryError::Parse(e.to_string()))?;
        Self::new(file.stages, file.model_plan)
    }

    pub fn load(path: &str) -> Result<Self, RegistryError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Parse(format!("{}: {}", path, e)))?;
        Self::from_yaml(&yaml)
    }

    pub fn get_stage_config(&self, id: StageId) -> Result<&StageDefinition, RegistryError> {
        self.stages.get(&id).ok_or(RegistryError::NotFound(id))
    }

    pub fn stages_by_category(&self, category: StageCategory) -> Vec<&StageDefinition> {
        self.stages
            .values()
            .filter(|def| def.category == category)
            .collect()
    }

    pub fn upgrade_status(&self) -> UpgradeStatus {
        let (baseline, upgraded): (Vec<&StageDefinition>, Vec<&StageDefinition>) = self
            .stages
            .values()
            .partition(|def| def.model_id == self.plan.baseline_model);

        UpgradeStatus {
            baseline_stage_ids: baseline.iter().map(|d| d.id).collect(),
            non_baseline_stage_ids: upgraded.iter().map(|d| d.id).collect(),
            current_phase_label: self.plan.phase_label.clone(),
            plan_version: self.plan.version.clone(),
            baseline_model: self.plan.baseline_model.clone(),
        }
    }

    pub fn model_plan(&self) -> &ModelPlan {
        &self.plan
    }

    /// All stages in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.values()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search; returns the ids along the first cycle found
fn find_cycle(stages: &BTreeMap<StageId, StageDefinition>) -> Option<Vec<StageId>> {
    fn visit(
        id: StageId,
        stages: &BTreeMap<StageId, StageDefinition>,
        marks: &mut BTreeMap<StageId, Mark>,
        path: &mut Vec<StageId>,
    ) -> Option<Vec<StageId>> {
        match marks.get(&id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|p| *p == id).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(id);
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(id, Mark::Visiting);
        path.push(id);
        if let Some(def) = stages.get(&id) {
            for dep in &def.dependencies {
                if let Some(cycle) = visit(*dep, stages, marks, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    for id in stages.keys() {
        let mut path = Vec::new();
        if let Some(cycle) = visit(*id, stages, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_plan::{BASELINE_MODEL, UPGRADE_MODEL};
    use crate::table::builtin_stages;

    fn def(id: u32, deps: &[u32]) -> StageDefinition {
        StageDefinition::new(id, format!("s{}", id), StageCategory::Analytical, "base", 100)
            .depends_on(deps)
    }

    #[test]
    fn test_builtin_table_loads() {
        let registry = StageRegistry::new(builtin_stages(), ModelPlan::current()).unwrap();
        assert_eq!(registry.len(), 14);
        let avatar = registry.get_stage_config(StageId(4)).unwrap();
        assert!(avatar.model_pinned);
        assert_eq!(avatar.model_id, BASELINE_MODEL);
        assert_eq!(registry.get_stage_config(StageId(1)).unwrap().model_id, UPGRADE_MODEL);
    }

    #[test]
    fn test_not_found() {
        let registry = crate::builtin();
        assert_eq!(
            registry.get_stage_config(StageId(14)).unwrap_err(),
            RegistryError::NotFound(StageId(14))
        );
    }

    #[test]
    fn test_rejects_cycle() {
        let err = StageRegistry::new(
            vec![def(1, &[3]), def(2, &[1]), def(3, &[2])],
            ModelPlan::baseline(),
        )
        .unwrap_err();
        match err {
            RegistryError::CyclicDependency(cycle) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_self_dependency() {
        let err = StageRegistry::new(vec![def(1, &[1])], ModelPlan::baseline()).unwrap_err();
        assert_eq!(err, RegistryError::CyclicDependency(vec![StageId(1), StageId(1)]));
    }

    #[test]
    fn test_accepts_non_linear_dag() {
        // Diamond: 4 depends on 2 and 3, both depend on 1
        let registry = StageRegistry::new(
            vec![def(1, &[]), def(2, &[1]), def(3, &[1]), def(4, &[2, 3])],
            ModelPlan::baseline(),
        );
        assert!(registry.is_ok());
    }

    #[test]
    fn test_rejects_unknown_dependency_and_duplicates() {
        assert_eq!(
            StageRegistry::new(vec![def(2, &[9])], ModelPlan::baseline()).unwrap_err(),
            RegistryError::UnknownDependency {
                stage: StageId(2),
                dependency: StageId(9)
            }
        );
        assert_eq!(
            StageRegistry::new(vec![def(1, &[]), def(1, &[])], ModelPlan::baseline()).unwrap_err(),
            RegistryError::DuplicateStage(StageId(1))
        );
    }

    #[test]
    fn test_pinned_model_cannot_be_overridden() {
        let plan = ModelPlan::current().with_override(StageId(4), "experimental-model");
        let err = StageRegistry::new(builtin_stages(), plan).unwrap_err();
        assert!(matches!(err, RegistryError::PinnedModelOverride { stage: StageId(4), .. }));
    }

    #[test]
    fn test_stages_by_category() {
        let registry = crate::builtin();
        let synthesis: Vec<u32> = registry
            .stages_by_category(StageCategory::Synthesis)
            .iter()
            .map(|d| d.id.get())
            .collect();
        assert_eq!(synthesis, vec![6, 13]);
        assert_eq!(registry.stages_by_category(StageCategory::Analytical).len(), 3);
    }

    #[test]
    fn test_upgrade_status() {
        let status = crate::builtin().upgrade_status();
        assert_eq!(status.non_baseline_stage_ids, vec![StageId(1), StageId(2), StageId(3)]);
        assert_eq!(status.baseline_stage_ids.len(), 11);
        assert!(status.baseline_stage_ids.contains(&StageId(4)));
        assert_eq!(status.current_phase_label, ModelPlan::current().phase_label);

        let baseline = StageRegistry::new(builtin_stages(), ModelPlan::baseline()).unwrap();
        assert!(baseline.upgrade_status().non_baseline_stage_ids.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let registry = StageRegistry::from_yaml(
            r#"
stages:
  - id: 1
    name: Alpha
    category: analytical
    model_id: base
    max_output_tokens: 512
  - id: 2
    name: Beta
    category: synthesis
    model_id: base
    max_output_tokens: 2048
    dependencies: [1]
    output: markdown
model_plan:
  version: "v1"
  phase_label: "Trial"
  baseline_model: base
  overrides:
    2: fast
"#,
        )
        .unwrap();
        let beta = registry.get_stage_config(StageId(2)).unwrap();
        assert_eq!(beta.model_id, "fast");
        assert!(!beta.expects_json());
        assert_eq!(registry.upgrade_status().non_baseline_stage_ids, vec![StageId(2)]);

        assert!(matches!(
            StageRegistry::from_yaml("stages: 7"),
            Err(RegistryError::Parse(_))
        ));
    }
}
