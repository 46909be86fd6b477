//! Response validator: contract dispatch table
use crate::checks::{count_fields, Findings};
use crate::contracts::{builtin_contracts, StageContract};
use crate::profile::PenaltyProfile;
use crate::result::ValidationResult;
use offerlab_core::StageId;
use serde_json::Value;
use std::collections::HashMap;

/// Validates stage outputs against their registered contracts.
///
/// Stages without a contract get a structural check: the output must be a
/// non-empty object (or text), empty leaves are warnings and placeholder
/// text anywhere is an error.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    contracts: HashMap<StageId, StageContract>,
    fallback_profile: PenaltyProfile,
}

impl ResponseValidator {
    /// Validator with no stage contracts
    pub fn new() -> Self {
        Self {
            contracts: HashMap::new(),
            fallback_profile: PenaltyProfile::standard(),
        }
    }

    /// Validator with the built-in contracts for every stage
    pub fn standard() -> Self {
        builtin_contracts()
            .into_iter()
            .fold(Self::new(), |validator, contract| validator.with_contract(contract))
    }

    pub fn with_contract(mut self, contract: StageContract) -> Self {
        self.register(contract);
        self
    }

    /// Register a contract, replacing any existing one for the same stage
    pub fn register(&mut self, contract: StageContract) {
        self.contracts.insert(contract.stage, contract);
    }

    pub fn has_contract(&self, stage: StageId) -> bool {
        self.contracts.contains_key(&stage)
    }

    pub fn validate(&self, stage: StageId, output: &Value, response_bytes: usize) -> ValidationResult {
        let mut findings = Findings::new();
        let profile = match self.contracts.get(&stage) {
            Some(contract) => {
                (contract.check)(output, &mut findings);
                if contract.sweep {
                    findings.sweep_placeholders(output);
                }
                &contract.profile
            }
            None => {
                structural_check(output, &mut findings);
                &self.fallback_profile
            }
        };
        ValidationResult::from_findings(stage, findings, profile, count_fields(output), response_bytes)
    }

    /// Result for an output that could not be parsed at all
    pub fn validate_malformed(&self, stage: StageId, parse_error: &str, response_bytes: usize) -> ValidationResult {
        let mut findings = Findings::new();
        findings.error(format!("malformed JSON output: {}", parse_error));
        let profile = self
            .contracts
            .get(&stage)
            .map(|c| &c.profile)
            .unwrap_or(&self.fallback_profile);
        ValidationResult::from_findings(stage, findings, profile, 0, response_bytes)
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::standard()
    }
}

fn structural_check(output: &Value, findings: &mut Findings) {
    match output {
        Value::Object(map) if map.is_empty() => findings.error("output: empty object"),
        Value::Object(map) => {
            for (key, value) in map {
                findings.scan_leaves(value, key);
            }
        }
        Value::String(text) => {
            findings.check_text(text, "output");
        }
        Value::Array(_) => findings.error("output: expected an object, found array"),
        _ => findings.error("output: expected an object"),
    }
}
