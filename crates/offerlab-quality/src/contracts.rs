//! Per-stage output contracts
//!
//! Each contract is a plain function over the parsed output that records
//! findings. Paths in messages are JSON paths (`order_bumps[1].price`).

use crate::checks::{Cardinality, Findings};
use crate::profile::PenaltyProfile;
use offerlab_core::StageId;
use serde_json::Value;

pub type CheckFn = fn(&Value, &mut Findings);

#[derive(Debug, Clone)]
pub struct StageContract {
    pub stage: StageId,
    pub name: &'static str,
    pub profile: PenaltyProfile,
    pub check: CheckFn,
    /// Run the placeholder sweep over every string leaf afterwards
    pub sweep: bool,
}

impl StageContract {
    pub fn new(stage: u32, name: &'static str, check: CheckFn) -> Self {
        Self {
            stage: StageId(stage),
            name,
            profile: PenaltyProfile::standard(),
            check,
            sweep: true,
        }
    }

    pub fn with_profile(mut self, profile: PenaltyProfile) -> Self {
        self.profile = profile;
        self
    }

    fn without_sweep(mut self) -> Self {
        self.sweep = false;
        self
    }
}

/// Contracts for every built-in stage
pub fn builtin_contracts() -> Vec<StageContract> {
    vec![
        StageContract::new(1, "market analysis", market_analysis),
        StageContract::new(2, "buyer psychology", buyer_psychology),
        StageContract::new(3, "competitive landscape", competitive_landscape),
        StageContract::new(4, "avatar", avatar).with_profile(PenaltyProfile::strict()),
        StageContract::new(5, "pricing strategy", pricing_strategy),
        StageContract::new(6, "research synthesis", research_synthesis)
            .with_profile(PenaltyProfile::lenient())
            .without_sweep(),
        StageContract::new(7, "offer positioning", offer_positioning),
        StageContract::new(8, "core offer", core_offer),
        StageContract::new(9, "value stack", value_stack),
        StageContract::new(10, "order bumps", order_bumps).with_profile(PenaltyProfile::strict()),
        StageContract::new(11, "upsells", upsells).with_profile(PenaltyProfile::strict()),
        StageContract::new(12, "guarantee", guarantee),
        StageContract::new(13, "offer summary", offer_summary),
        StageContract::new(17, "content pillars", content_pillars),
    ]
}

const ROOT: &str = "";

/// Visit each object entry of an array field, reporting non-object entries
fn each_object(f: &mut Findings, items: Option<&[Value]>, path: &str, mut visit: impl FnMut(&mut Findings, &Value, &str)) {
    for (i, item) in items.unwrap_or_default().iter().enumerate() {
        let p = format!("{}[{}]", path, i);
        if item.is_object() {
            visit(f, item, &p);
        } else {
            f.error(format!("{}: expected an object", p));
        }
    }
}

fn require_strs(f: &mut Findings, obj: &Value, path: &str, fields: &[&str]) {
    for field in fields {
        f.require_str(obj, path, field);
    }
}

fn market_analysis(v: &Value, f: &mut Findings) {
    require_strs(f, v, ROOT, &["market_overview", "market_size"]);
    f.require_string_array(v, ROOT, "growth_trends", Cardinality::between(3, 7));
    if let Some(segment) = f.require_object(v, ROOT, "power_four_percent") {
        require_strs(f, segment, "power_four_percent", &["segment_name", "description", "why_highest_value"]);
        f.require_string_array(segment, "power_four_percent", "characteristics", Cardinality::at_least(3));
    }
    f.require_string_array(v, ROOT, "opportunities", Cardinality::at_least(2));
}

fn buyer_psychology(v: &Value, f: &mut Findings) {
    f.require_string_array(v, ROOT, "top_fears", Cardinality::between(3, 7));
    f.require_string_array(v, ROOT, "top_desires", Cardinality::between(3, 7));
    f.require_string_array(v, ROOT, "pain_points", Cardinality::at_least(3));
    f.require_string_array(v, ROOT, "buyer_language", Cardinality::between(10, 15));
    f.require_string_array(v, ROOT, "objections", Cardinality::at_least(3));
    f.optional_string_array(v, ROOT, "emotional_triggers");
}

fn competitive_landscape(v: &Value, f: &mut Findings) {
    let competitors = f.require_array(v, ROOT, "competitors", Cardinality::between(3, 5));
    each_object(f, competitors, "competitors", |f, c, p| {
        require_strs(f, c, p, &["name", "positioning"]);
        f.require_string_array(c, p, "weaknesses", Cardinality::at_least(1));
        f.optional_str(c, p, "price_point");
    });
    f.require_string_array(v, ROOT, "market_gaps", Cardinality::at_least(2));
    f.require_string_array(v, ROOT, "differentiation_opportunities", Cardinality::at_least(2));
}

fn avatar(v: &Value, f: &mut Findings) {
    if let Some(a) = f.require_object(v, ROOT, "avatar") {
        require_strs(
            f,
            a,
            "avatar",
            &["name", "age_range", "occupation", "income_level", "backstory", "day_in_the_life", "quote"],
        );
        for list in ["goals", "frustrations", "objections"] {
            f.require_string_array(a, "avatar", list, Cardinality::at_least(3));
        }
    }
    f.require_string_array(v, ROOT, "buying_triggers", Cardinality::at_least(3));
}

fn pricing_strategy(v: &Value, f: &mut Findings) {
    let tiers = f.require_array(v, ROOT, "pricing_tiers", Cardinality::exact(3));
    let mut recommended = 0;
    each_object(f, tiers, "pricing_tiers", |f, tier, p| {
        require_strs(f, tier, p, &["name", "description"]);
        f.require_positive(tier, p, "price");
        f.require_string_array(tier, p, "features", Cardinality::at_least(3));
        if f.optional_bool(tier, p, "recommended") {
            recommended += 1;
        }
    });
    if tiers.is_some() {
        match recommended {
            0 => f.warn("pricing_tiers: no tier is marked as recommended"),
            1 => {}
            n => f.error(format!("pricing_tiers: {} tiers are marked as recommended, expected one", n)),
        }
    }
    f.require_str(v, ROOT, "pricing_rationale");
}

const MIN_SYNTHESIS_CHARS: usize = 1200;
const MIN_SYNTHESIS_HEADINGS: usize = 3;

fn research_synthesis(v: &Value, f: &mut Findings) {
    let Some(text) = v.as_str() else {
        f.error("document: expected markdown text");
        return;
    };
    let chars = text.trim().chars().count();
    if chars < MIN_SYNTHESIS_CHARS {
        f.error(format!(
            "document: {} characters, expected at least {}",
            chars, MIN_SYNTHESIS_CHARS
        ));
    }
    let headings = text
        .lines()
        .filter(|line| line.trim_start().starts_with('#'))
        .count();
    if headings < MIN_SYNTHESIS_HEADINGS {
        f.warn(format!(
            "document: {} heading(s), expected at least {}",
            headings, MIN_SYNTHESIS_HEADINGS
        ));
    }
    if chars > 0 {
        f.check_text(text, "document");
    }
}

fn offer_positioning(v: &Value, f: &mut Findings) {
    require_strs(f, v, ROOT, &["big_idea", "positioning_statement", "core_promise"]);
    if let Some(mechanism) = f.require_object(v, ROOT, "unique_mechanism") {
        require_strs(f, mechanism, "unique_mechanism", &["name", "explanation"]);
    }
    f.require_string_array(v, ROOT, "angles", Cardinality::at_least(3));
}

fn core_offer(v: &Value, f: &mut Findings) {
    require_strs(f, v, ROOT, &["offer_name", "tagline"]);
    if let Some(t) = f.require_object(v, ROOT, "transformation") {
        require_strs(f, t, "transformation", &["before", "after"]);
    }
    let deliverables = f.require_array(v, ROOT, "deliverables", Cardinality::between(3, 7));
    each_object(f, deliverables, "deliverables", |f, d, p| {
        require_strs(f, d, p, &["name", "description", "format"]);
    });
}

fn value_stack(v: &Value, f: &mut Findings) {
    let bonuses = f.require_array(v, ROOT, "bonuses", Cardinality::between(3, 5));
    each_object(f, bonuses, "bonuses", |f, b, p| {
        require_strs(f, b, p, &["name", "description"]);
        f.require_positive(b, p, "perceived_value");
    });
    f.require_positive(v, ROOT, "total_perceived_value");
    f.require_str(v, ROOT, "stack_summary");
}

fn order_bumps(v: &Value, f: &mut Findings) {
    let bumps = f.require_array(v, ROOT, "order_bumps", Cardinality::exact(3));
    each_object(f, bumps, "order_bumps", |f, b, p| {
        require_strs(f, b, p, &["name", "description"]);
        f.require_number_in(b, p, "price", 27.0, 47.0);
    });
}

fn upsells(v: &Value, f: &mut Findings) {
    let upsells = f.require_array(v, ROOT, "upsells", Cardinality::exact(2));
    each_object(f, upsells, "upsells", |f, u, p| {
        require_strs(f, u, p, &["name", "description"]);
        f.require_number_in(u, p, "price", 97.0, 997.0);
    });
    match v.get("downsell") {
        None | Some(Value::Null) => {}
        Some(d @ Value::Object(_)) => {
            f.require_str(d, "downsell", "name");
            f.require_positive(d, "downsell", "price");
        }
        Some(_) => f.error("downsell: expected an object"),
    }
}

fn guarantee(v: &Value, f: &mut Findings) {
    if let Some(g) = f.require_object(v, ROOT, "guarantee") {
        require_strs(f, g, "guarantee", &["name", "terms"]);
        f.require_integer_in(g, "guarantee", "duration_days", 1, 365);
    }
    f.require_string_array(v, ROOT, "risk_reversals", Cardinality::at_least(2));
    let handlers = f.require_array(v, ROOT, "objection_handlers", Cardinality::at_least(3));
    each_object(f, handlers, "objection_handlers", |f, h, p| {
        require_strs(f, h, p, &["objection", "response"]);
    });
}

fn offer_summary(v: &Value, f: &mut Findings) {
    require_strs(
        f,
        v,
        ROOT,
        &["headline", "subheadline", "offer_summary", "price_presentation", "call_to_action"],
    );
    f.require_string_array(v, ROOT, "offer_stack", Cardinality::at_least(3));
}

fn content_pillars(v: &Value, f: &mut Findings) {
    let pillars = f.require_array(v, ROOT, "content_pillars", Cardinality::between(3, 5));
    each_object(f, pillars, "content_pillars", |f, pillar, p| {
        require_strs(f, pillar, p, &["name", "description"]);
        f.require_string_array(pillar, p, "topics", Cardinality::at_least(3));
        f.require_string_array(pillar, p, "formats", Cardinality::at_least(1));
    });
    f.require_str(v, ROOT, "posting_cadence");
}
