//! Pipeline Context: state accumulated during one pipeline run
use crate::error::PipelineError;
use crate::stage::{StageDefinition, StageId};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// The user-supplied form data that starts a run. Opaque to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessContext {
    fields: BTreeMap<String, Value>,
}

impl BusinessContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Validated stage outputs in the order they were recorded.
///
/// Serializes as a JSON object keyed by stage id. Deserialized maps are
/// ordered by ascending id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutputs {
    entries: Vec<(StageId, Value)>,
}

impl StageOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: StageId) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.entries.iter().any(|(k, _)| *k == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<StageId> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StageId, &Value)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Most recently recorded output
    pub fn last(&self) -> Option<(StageId, &Value)> {
        self.entries.last().map(|(k, v)| (*k, v))
    }

    /// Build a detached set, e.g. for handing research results to a later
    /// pipeline. Duplicate ids keep the first value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (StageId, Value)>) -> Self {
        let mut out = Self::new();
        for (id, value) in pairs {
            if !out.contains(id) {
                out.entries.push((id, value));
            }
        }
        out
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn push(&mut self, id: StageId, value: Value) {
        self.entries.push((id, value));
    }
}

impl Serialize for StageOutputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

impl<'de> Deserialize<'de> for StageOutputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut by_id = BTreeMap::new();
        for (key, value) in raw {
            let id: StageId = key
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid stage id '{}'", key)))?;
            by_id.insert(id, value);
        }
        Ok(StageOutputs::from_pairs(by_id))
    }
}

/// Mutable accumulator owned by exactly one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    pub run_id: String,
    business: BusinessContext,
    outputs: StageOutputs,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl PipelineContext {
    pub fn new(business: BusinessContext) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            business,
            outputs: StageOutputs::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn business(&self) -> &BusinessContext {
        &self.business
    }

    pub fn outputs(&self) -> &StageOutputs {
        &self.outputs
    }

    pub fn output(&self, id: StageId) -> Option<&Value> {
        self.outputs.get(id)
    }

    /// Declared dependencies of `def` that have no recorded output yet
    pub fn missing_dependencies(&self, def: &StageDefinition) -> Vec<StageId> {
        def.dependencies
            .iter()
            .copied()
            .filter(|dep| !self.outputs.contains(*dep))
            .collect()
    }

    /// Append a validated output. Requires every dependency to be present
    /// and refuses to overwrite an existing entry.
    pub fn record(&mut self, def: &StageDefinition, output: Value) -> Result<(), PipelineError> {
        if self.outputs.contains(def.id) {
            return Err(PipelineError::DuplicateOutput(def.id));
        }
        if let Some(missing) = self.missing_dependencies(def).into_iter().next() {
            return Err(PipelineError::DependencyMissing {
                stage: def.id,
                missing,
            });
        }
        self.outputs.push(def.id, output);
        Ok(())
    }

    /// Hand the accumulated outputs over, consuming the context
    pub fn into_outputs(self) -> StageOutputs {
        self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageCategory;
    use serde_json::json;

    fn def(id: u32, deps: &[u32]) -> StageDefinition {
        StageDefinition::new(id, format!("stage {}", id), StageCategory::Analytical, "m", 1024)
            .depends_on(deps)
    }

    #[test]
    fn test_record_requires_dependencies() {
        let mut ctx = PipelineContext::new(BusinessContext::new());
        let err = ctx.record(&def(2, &[1]), json!({"a": 1})).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DependencyMissing { stage: StageId(2), missing: StageId(1) }
        ));
        assert!(ctx.outputs().is_empty());

        ctx.record(&def(1, &[]), json!({"a": 1})).unwrap();
        ctx.record(&def(2, &[1]), json!({"b": 2})).unwrap();
        assert_eq!(ctx.outputs().ids(), vec![StageId(1), StageId(2)]);
    }

    #[test]
    fn test_record_never_overwrites() {
        let mut ctx = PipelineContext::new(BusinessContext::new());
        ctx.record(&def(1, &[]), json!("first")).unwrap();
        let err = ctx.record(&def(1, &[]), json!("second")).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateOutput(StageId(1))));
        assert_eq!(ctx.output(StageId(1)), Some(&json!("first")));
    }

    #[test]
    fn test_outputs_serialize_in_insertion_order() {
        let mut ctx = PipelineContext::new(BusinessContext::new());
        ctx.record(&def(3, &[]), json!({"x": 1})).unwrap();
        ctx.record(&def(1, &[]), json!({"y": 2})).unwrap();
        let text = serde_json::to_string(ctx.outputs()).unwrap();
        assert_eq!(text, r#"{"3":{"x":1},"1":{"y":2}}"#);
    }

    #[test]
    fn test_outputs_deserialize_ascending() {
        let outputs: StageOutputs =
            serde_json::from_str(r#"{"5": "e", "1": "a", "2": "b"}"#).unwrap();
        assert_eq!(outputs.ids(), vec![StageId(1), StageId(2), StageId(5)]);
        assert!(serde_json::from_str::<StageOutputs>(r#"{"one": 1}"#).is_err());
    }

    #[test]
    fn test_business_context_accessors() {
        let business = BusinessContext::new()
            .with("industry", "fitness coaching")
            .with("years_in_business", 4);
        assert_eq!(business.get_str("industry"), Some("fitness coaching"));
        assert_eq!(business.get_str("years_in_business"), None);
        assert_eq!(business.to_value()["years_in_business"], json!(4));
    }
}
