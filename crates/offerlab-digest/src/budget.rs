//! Token estimation and budget checks
use crate::truncate::char_len;
use serde::Serialize;
use thiserror::Error;

/// `ceil(chars / 3.5)`
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = char_len(text) as u64;
    ((chars * 2 + 6) / 7) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeReport {
    pub char_count: usize,
    pub estimated_tokens: u32,
    pub target_chars: usize,
    pub within_budget: bool,
}

/// Size check for a condensed digest. Pure: the same input always yields
/// the same report.
pub fn check_digest_size(text: &str, target_chars: usize) -> SizeReport {
    let char_count = char_len(text);
    SizeReport {
        char_count,
        estimated_tokens: estimate_tokens(text),
        target_chars,
        within_budget: char_count <= target_chars,
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("prompt needs ~{estimated_tokens} tokens, window is {limit}")]
pub struct BudgetOverflow {
    pub estimated_tokens: u32,
    pub limit: u32,
}

/// Provider context window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub context_window_tokens: u32,
}

impl ContextBudget {
    pub fn new(context_window_tokens: u32) -> Self {
        Self { context_window_tokens }
    }

    /// Prompt plus reserved output must fit the window. Returns the total
    /// estimate on success.
    pub fn check_prompt(&self, prompt: &str, max_output_tokens: u32) -> Result<u32, BudgetOverflow> {
        let total = estimate_tokens(prompt).saturating_add(max_output_tokens);
        if total > self.context_window_tokens {
            Err(BudgetOverflow {
                estimated_tokens: total,
                limit: self.context_window_tokens,
            })
        } else {
            Ok(total)
        }
    }
}
