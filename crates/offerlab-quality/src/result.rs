//! Validation verdicts
use crate::checks::Findings;
use crate::profile::PenaltyProfile;
use offerlab_core::StageId;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationMetrics {
    pub field_count: usize,
    pub placeholder_count: usize,
    pub empty_field_count: usize,
    pub response_bytes: usize,
}

/// Outcome of validating one stage output.
///
/// Only constructed from collected findings; `is_valid` always equals
/// "no errors" and cannot be changed afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    stage: StageId,
    is_valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
    quality_score: u32,
    metrics: ValidationMetrics,
    profile: String,
}

impl ValidationResult {
    pub(crate) fn from_findings(
        stage: StageId,
        findings: Findings,
        profile: &PenaltyProfile,
        field_count: usize,
        response_bytes: usize,
    ) -> Self {
        let (errors, warnings, placeholder_count, empty_field_count) = findings.into_parts();
        let quality_score = profile.score(errors.len(), warnings.len());
        Self {
            stage,
            is_valid: errors.is_empty(),
            errors,
            warnings,
            quality_score,
            metrics: ValidationMetrics {
                field_count,
                placeholder_count,
                empty_field_count,
                response_bytes,
            },
            profile: profile.name.clone(),
        }
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn quality_score(&self) -> u32 {
        self.quality_score
    }

    pub fn metrics(&self) -> &ValidationMetrics {
        &self.metrics
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        format!(
            "stage {}: {} (score {}, {} error(s), {} warning(s))",
            self.stage,
            if self.is_valid { "valid" } else { "invalid" },
            self.quality_score,
            self.errors.len(),
            self.warnings.len()
        )
    }
}
