//! Stage model: the static description of one generation step
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric stage identifier. Ids give a total order within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(pub u32);

impl StageId {
    pub const fn new(id: u32) -> Self {
        StageId(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StageId {
    fn from(id: u32) -> Self {
        StageId(id)
    }
}

impl FromStr for StageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(StageId)
    }
}

/// Broad kind of work a stage performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageCategory {
    Analytical,
    Creative,
    Strategic,
    Synthesis,
}

impl StageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageCategory::Analytical => "analytical",
            StageCategory::Creative => "creative",
            StageCategory::Strategic => "strategic",
            StageCategory::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "analytical" => Ok(StageCategory::Analytical),
            "creative" => Ok(StageCategory::Creative),
            "strategic" => Ok(StageCategory::Strategic),
            "synthesis" => Ok(StageCategory::Synthesis),
            other => Err(format!("unknown stage category '{}'", other)),
        }
    }
}

/// What the stage is expected to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single JSON object
    #[default]
    Json,
    /// Long-form markdown text
    Markdown,
}

/// Immutable metadata for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stage identifier (ex: 4)
    pub id: StageId,
    /// Human label (ex: "Avatar Creation")
    pub name: String,
    pub category: StageCategory,
    /// Model the stage runs on after the model plan has been applied
    pub model_id: String,
    /// Hard ceiling communicated to the provider
    pub max_output_tokens: u32,
    /// Stages whose validated output must exist before this one runs
    #[serde(default)]
    pub dependencies: Vec<StageId>,
    #[serde(default)]
    pub output: OutputFormat,
    /// Pinned stages never take a model override
    #[serde(default)]
    pub model_pinned: bool,
}

impl StageDefinition {
    pub fn new(
        id: impl Into<StageId>,
        name: impl Into<String>,
        category: StageCategory,
        model_id: impl Into<String>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            model_id: model_id.into(),
            max_output_tokens,
            dependencies: Vec::new(),
            output: OutputFormat::Json,
            model_pinned: false,
        }
    }

    pub fn depends_on(mut self, deps: &[u32]) -> Self {
        self.dependencies = deps.iter().copied().map(StageId).collect();
        self
    }

    pub fn markdown(mut self) -> Self {
        self.output = OutputFormat::Markdown;
        self
    }

    pub fn pinned(mut self) -> Self {
        self.model_pinned = true;
        self
    }

    pub fn expects_json(&self) -> bool {
        self.output == OutputFormat::Json
    }
}
