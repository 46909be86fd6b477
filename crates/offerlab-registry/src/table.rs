//! Built-in stage table
use crate::model_plan::BASELINE_MODEL;
use offerlab_core::{StageCategory, StageDefinition};

use StageCategory::{Analytical, Creative, Strategic, Synthesis};

pub const MARKET_ANALYSIS: u32 = 1;
pub const BUYER_PSYCHOLOGY: u32 = 2;
pub const COMPETITIVE_LANDSCAPE: u32 = 3;
pub const AVATAR_CREATION: u32 = 4;
pub const PRICING_STRATEGY: u32 = 5;
pub const RESEARCH_SYNTHESIS: u32 = 6;
pub const OFFER_POSITIONING: u32 = 7;
pub const CORE_OFFER: u32 = 8;
pub const VALUE_STACK: u32 = 9;
pub const ORDER_BUMPS: u32 = 10;
pub const UPSELLS: u32 = 11;
pub const GUARANTEE: u32 = 12;
pub const OFFER_SUMMARY: u32 = 13;
pub const CONTENT_PILLARS: u32 = 17;

fn stage(id: u32, name: &str, category: StageCategory, max_tokens: u32) -> StageDefinition {
    StageDefinition::new(id, name, category, BASELINE_MODEL, max_tokens)
}

/// Stage definitions before any model plan is applied
pub fn builtin_stages() -> Vec<StageDefinition> {
    vec![
        // Research
        stage(MARKET_ANALYSIS, "Market Analysis", Analytical, 4096),
        stage(BUYER_PSYCHOLOGY, "Buyer Psychology", Analytical, 4096).depends_on(&[1]),
        stage(COMPETITIVE_LANDSCAPE, "Competitive Landscape", Analytical, 4096).depends_on(&[1, 2]),
        // Most JSON-heavy stage; its model is never swapped experimentally.
        stage(AVATAR_CREATION, "Avatar Creation", Creative, 6144)
            .depends_on(&[1, 2, 3])
            .pinned(),
        stage(PRICING_STRATEGY, "Pricing Strategy", Strategic, 4096).depends_on(&[1, 2, 3, 4]),
        stage(RESEARCH_SYNTHESIS, "Research Synthesis", Synthesis, 8192)
            .depends_on(&[1, 2, 3, 4, 5])
            .markdown(),
        // Offer design
        stage(OFFER_POSITIONING, "Offer Positioning", Strategic, 4096).depends_on(&[1, 2, 4, 5]),
        stage(CORE_OFFER, "Core Offer", Creative, 4096).depends_on(&[7]),
        stage(VALUE_STACK, "Value Stack", Strategic, 4096).depends_on(&[7, 8]),
        stage(ORDER_BUMPS, "Order Bumps", Strategic, 4096).depends_on(&[8, 9]),
        stage(UPSELLS, "Upsells", Strategic, 4096).depends_on(&[8, 9, 10]),
        stage(GUARANTEE, "Guarantee & Risk Reversal", Strategic, 4096).depends_on(&[8, 11]),
        stage(OFFER_SUMMARY, "Offer Summary", Synthesis, 6144).depends_on(&[7, 8, 9, 10, 11, 12]),
        // Content
        stage(CONTENT_PILLARS, "Content Pillars", Creative, 4096).depends_on(&[1, 2, 4]),
    ]
}
