//! Pipeline plans: ordered stage lists
use offerlab_core::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    /// Stages 1–6, ending in the long-form synthesis
    Research,
    /// Stages 1–5, without the synthesis pass
    ResearchCore,
    /// Stages 7–13, seeded with research outputs
    OfferDesign,
    /// Stage 17, seeded with research and optional offer outputs
    Content,
}

const RESEARCH: &[StageId] = &[StageId(1), StageId(2), StageId(3), StageId(4), StageId(5), StageId(6)];
const OFFER_DESIGN: &[StageId] = &[
    StageId(7),
    StageId(8),
    StageId(9),
    StageId(10),
    StageId(11),
    StageId(12),
    StageId(13),
];
const CONTENT: &[StageId] = &[StageId(17)];

impl PipelineKind {
    pub fn stages(&self) -> &'static [StageId] {
        match self {
            PipelineKind::Research => RESEARCH,
            PipelineKind::ResearchCore => &RESEARCH[..5],
            PipelineKind::OfferDesign => OFFER_DESIGN,
            PipelineKind::Content => CONTENT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Research => "research",
            PipelineKind::ResearchCore => "research-core",
            PipelineKind::OfferDesign => "offer-design",
            PipelineKind::Content => "content",
        }
    }

    /// Upstream stages the plan reads, either as direct dependencies or
    /// through the research digest (market gaps come from stage 3).
    pub fn required_upstream(&self) -> &'static [StageId] {
        match self {
            PipelineKind::Research | PipelineKind::ResearchCore => &[],
            PipelineKind::OfferDesign => &RESEARCH[..5],
            PipelineKind::Content => &[StageId(1), StageId(2), StageId(3), StageId(4)],
        }
    }

    pub fn all() -> [PipelineKind; 4] {
        [
            PipelineKind::Research,
            PipelineKind::ResearchCore,
            PipelineKind::OfferDesign,
            PipelineKind::Content,
        ]
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineKind::all()
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown pipeline '{}'", s))
    }
}
