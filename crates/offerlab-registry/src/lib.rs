//! OfferLab Registry: stage table, model plan and pipeline plans
//!
//! Pure lookup data. The registry is built once, validated at load time
//! (dependency graph must be acyclic, pinned models must not be overridden)
//! and never changes afterwards.
pub mod model_plan;
pub mod pipelines;
pub mod stage_registry;
pub mod table;

pub use model_plan::{ModelPlan, UpgradeStatus};
pub use pipelines::PipelineKind;
pub use stage_registry::{RegistryError, RegistryFile, StageRegistry};

use once_cell::sync::Lazy;

static BUILTIN: Lazy<StageRegistry> = Lazy::new(|| {
    StageRegistry::new(table::builtin_stages(), ModelPlan::current())
        .unwrap_or_else(|e| panic!("built-in stage table is invalid: {}", e))
});

/// The compiled-in registry shared by the whole process
pub fn builtin() -> &'static StageRegistry {
    &BUILTIN
}
