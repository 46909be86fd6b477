//! Scoring profiles
//!
//! A profile turns error and warning counts into a 0-100 quality score.
//! Strict stages (avatar, order bumps, upsells) lose more per finding; the
//! long-form synthesis is scored leniently.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyProfile {
    /// Profile name (e.g., "standard", "strict")
    pub name: String,

    /// Points lost per error
    pub error_penalty: u32,

    /// Points lost per warning
    pub warning_penalty: u32,
}

impl PenaltyProfile {
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            error_penalty: 8,
            warning_penalty: 3,
        }
    }

    pub fn strict() -> Self {
        Self {
            name: "strict".to_string(),
            error_penalty: 10,
            warning_penalty: 5,
        }
    }

    pub fn lenient() -> Self {
        Self {
            name: "lenient".to_string(),
            error_penalty: 5,
            warning_penalty: 2,
        }
    }

    /// Get profile by name, falling back to standard
    pub fn for_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "strict" => Self::strict(),
            "lenient" => Self::lenient(),
            _ => Self::standard(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// 100 minus penalties, floored at 0
    pub fn score(&self, errors: usize, warnings: usize) -> u32 {
        let penalty = (errors as u64) * self.error_penalty as u64
            + (warnings as u64) * self.warning_penalty as u64;
        100u64.saturating_sub(penalty) as u32
    }
}

impl Default for PenaltyProfile {
    fn default() -> Self {
        Self::standard()
    }
}
