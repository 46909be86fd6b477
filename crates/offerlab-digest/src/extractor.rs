//! Research digest extraction
//!
//! Selects a fixed, prioritized subset of fields from the research stage
//! outputs and renders them as a flat text block. Nothing is summarized:
//! fields are copied and, when too long, cut with a visible marker.

use crate::budget::{check_digest_size, SizeReport};
use crate::truncate::{char_len, truncate_chars};
use offerlab_core::{StageId, StageOutputs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MARKET_ANALYSIS: StageId = StageId(1);
const BUYER_PSYCHOLOGY: StageId = StageId(2);
const COMPETITIVE_LANDSCAPE: StageId = StageId(3);
const AVATAR: StageId = StageId(4);
const PRICING: StageId = StageId(5);

/// Smallest remainder worth filling with a cut-down section
const MIN_PARTIAL_SECTION: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Hard ceiling for the whole digest, in characters
    pub max_chars: usize,
    /// Per-field cap for free text
    pub field_chars: usize,
    pub fears: usize,
    pub desires: usize,
    pub buyer_phrases: usize,
    pub market_gaps: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            max_chars: 3000,
            field_chars: 280,
            fears: 2,
            desires: 2,
            buyer_phrases: 5,
            market_gaps: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CondensedContext {
    pub text: String,
    /// Section labels that made it into the text, in order
    pub sections: Vec<String>,
    /// Whether any section was cut or dropped for lack of room
    pub truncated: bool,
}

impl CondensedContext {
    pub fn char_count(&self) -> usize {
        char_len(&self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn size_report(&self, target_chars: usize) -> SizeReport {
        check_digest_size(&self.text, target_chars)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextExtractor {
    config: DigestConfig,
}

impl ContextExtractor {
    pub fn new(config: DigestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Build the digest from whatever research outputs are present
    pub fn condense(&self, outputs: &StageOutputs) -> CondensedContext {
        let max = self.config.max_chars;
        let mut text = String::new();
        let mut used = 0;
        let mut sections = Vec::new();
        let mut truncated = false;

        for (label, body) in self.sections(outputs) {
            let line = format!("{}: {}", label, body);
            let separator = usize::from(!text.is_empty());
            let room = max.saturating_sub(used + separator);
            let line_chars = char_len(&line);

            let line = if line_chars <= room {
                line
            } else if room >= MIN_PARTIAL_SECTION {
                truncated = true;
                truncate_chars(&line, room).into_owned()
            } else {
                truncated = true;
                tracing::debug!(section = label, room, "digest section dropped");
                continue;
            };

            if separator == 1 {
                text.push('\n');
            }
            used += separator + char_len(&line);
            text.push_str(&line);
            sections.push(label.to_string());
        }

        if char_len(&text) > max {
            truncated = true;
            text = truncate_chars(&text, max).into_owned();
        }

        CondensedContext {
            text,
            sections,
            truncated,
        }
    }

    fn sections(&self, outputs: &StageOutputs) -> Vec<(&'static str, String)> {
        let cfg = &self.config;
        let market = outputs.get(MARKET_ANALYSIS);
        let buyer = outputs.get(BUYER_PSYCHOLOGY);

        let candidates = [
            ("Highest-value segment", market.and_then(|m| self.segment(m))),
            ("Top fears", buyer.and_then(|b| self.list(b.get("top_fears"), cfg.fears, "; "))),
            ("Top desires", buyer.and_then(|b| self.list(b.get("top_desires"), cfg.desires, "; "))),
            ("Buyer language", buyer.and_then(|b| self.phrases(b.get("buyer_language")))),
            ("Avatar", outputs.get(AVATAR).and_then(|a| self.avatar(a))),
            ("Recommended tier", outputs.get(PRICING).and_then(|p| self.pricing(p))),
            (
                "Market gaps",
                outputs
                    .get(COMPETITIVE_LANDSCAPE)
                    .and_then(|c| self.list(c.get("market_gaps"), cfg.market_gaps, "; ")),
            ),
            ("Market overview", market.and_then(|m| self.field(m.get("market_overview")))),
        ];

        candidates
            .into_iter()
            .filter_map(|(label, body)| body.map(|b| (label, b)))
            .collect()
    }

    fn field(&self, value: Option<&Value>) -> Option<String> {
        let text = value?.as_str()?.trim();
        if text.is_empty() {
            return None;
        }
        Some(truncate_chars(text, self.config.field_chars).into_owned())
    }

    fn list(&self, value: Option<&Value>, take: usize, separator: &str) -> Option<String> {
        let items: Vec<String> = value?
            .as_array()?
            .iter()
            .filter_map(|item| self.field(Some(item)))
            .take(take)
            .collect();
        (!items.is_empty()).then(|| items.join(separator))
    }

    fn phrases(&self, value: Option<&Value>) -> Option<String> {
        let items: Vec<String> = value?
            .as_array()?
            .iter()
            .filter_map(|item| self.field(Some(item)))
            .take(self.config.buyer_phrases)
            .map(|phrase| format!("\"{}\"", phrase))
            .collect();
        (!items.is_empty()).then(|| items.join(" / "))
    }

    fn segment(&self, market: &Value) -> Option<String> {
        let segment = market.get("power_four_percent")?;
        let name = self.field(segment.get("segment_name"))?;
        Some(match self.field(segment.get("description")) {
            Some(description) => format!("{} ({})", name, description),
            None => name,
        })
    }

    fn avatar(&self, output: &Value) -> Option<String> {
        let avatar = output.get("avatar")?;
        let name = self.field(avatar.get("name"))?;
        let mut out = name;
        if let Some(occupation) = self.field(avatar.get("occupation")) {
            out.push_str(", ");
            out.push_str(&occupation);
        }
        if let Some(quote) = self.field(avatar.get("quote")) {
            out.push_str(&format!(". Says: \"{}\"", quote));
        }
        Some(out)
    }

    fn pricing(&self, output: &Value) -> Option<String> {
        let tiers = output.get("pricing_tiers")?.as_array()?;
        if tiers.is_empty() {
            return None;
        }
        let tier = tiers
            .iter()
            .find(|t| t.get("recommended").and_then(Value::as_bool) == Some(true))
            .unwrap_or(&tiers[tiers.len() / 2]);
        let name = self.field(tier.get("name"))?;
        let mut out = name;
        match tier.get("price") {
            Some(Value::Number(n)) => out.push_str(&format!(" at ${}", n)),
            Some(Value::String(s)) if !s.trim().is_empty() => out.push_str(&format!(" at {}", s.trim())),
            _ => {}
        }
        if let Some(description) = self.field(tier.get("description")) {
            out.push_str(": ");
            out.push_str(&description);
        }
        Some(out)
    }
}
