//! Handlebars prompt builder
//!
//! Template data:
//! - `stage`: id, name, category, output format of the stage being built
//! - `business`: the user's form data
//! - `outputs.stage_N`: validated output of stage N, when present
//! - `previous`: the most recently recorded output
//! - `research_digest`: condensed research context (stages 1-5)
//!
//! Helpers:
//! - truncate: cut a string to N characters on a char boundary
//! - join: join an array with a separator
//! - json: pretty-print any value

use crate::templates::PromptTemplates;
use crate::PromptTemplateError;
use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use offerlab_core::{PipelineContext, PromptBuilder, PromptError, StageDefinition, StageId};
use offerlab_digest::{truncate_chars, ContextExtractor};
use serde_json::{json, Map, Value};

fn template_name(stage: StageId) -> String {
    format!("stage-{}", stage)
}

pub struct TemplatePromptBuilder {
    handlebars: Handlebars<'static>,
    templates: PromptTemplates,
    extractor: ContextExtractor,
}

impl TemplatePromptBuilder {
    /// Compile every template; the first syntax error aborts
    pub fn new(templates: PromptTemplates, extractor: ContextExtractor) -> Result<Self, PromptTemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("truncate", Box::new(TruncateHelper));
        handlebars.register_helper("join", Box::new(JoinHelper));
        handlebars.register_helper("json", Box::new(JsonHelper));

        for (stage, prompt) in &templates.stages {
            let template = match &templates.preamble {
                Some(preamble) => format!("{}\n\n{}", preamble.trim_end(), prompt.template),
                None => prompt.template.clone(),
            };
            handlebars
                .register_template_string(&template_name(*stage), template)
                .map_err(|e| PromptTemplateError::Template {
                    stage: *stage,
                    message: e.to_string(),
                })?;
        }

        Ok(Self {
            handlebars,
            templates,
            extractor,
        })
    }

    /// Built-in templates with the default digest settings
    pub fn builtin() -> Result<Self, PromptTemplateError> {
        Self::new(PromptTemplates::builtin()?, ContextExtractor::default())
    }

    pub fn load(path: &str, extractor: ContextExtractor) -> Result<Self, PromptTemplateError> {
        Self::new(PromptTemplates::load(path)?, extractor)
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    fn template_data(&self, stage: &StageDefinition, ctx: &PipelineContext) -> Value {
        let mut outputs = Map::new();
        for (id, output) in ctx.outputs().iter() {
            outputs.insert(format!("stage_{}", id), output.clone());
        }
        let previous = ctx
            .outputs()
            .last()
            .map(|(_, output)| output.clone())
            .unwrap_or(Value::Null);
        let digest = self.extractor.condense(ctx.outputs());

        json!({
            "stage": {
                "id": stage.id,
                "name": stage.name,
                "category": stage.category,
                "output": stage.output,
            },
            "business": ctx.business().to_value(),
            "outputs": outputs,
            "previous": previous,
            "research_digest": digest.text,
        })
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build_prompt(&self, stage: &StageDefinition, ctx: &PipelineContext) -> Result<String, PromptError> {
        let name = template_name(stage.id);
        if !self.handlebars.has_template(&name) {
            return Err(PromptError::new(format!("no prompt template for stage {}", stage.id)));
        }
        self.handlebars
            .render(&name, &self.template_data(stage, ctx))
            .map_err(|e| PromptError::new(format!("render failed: {}", e)))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `{{truncate text 120}}`
struct TruncateHelper;

impl HelperDef for TruncateHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
        let max_chars = h.param(1).and_then(|v| v.value().as_u64()).unwrap_or(280) as usize;
        out.write(&truncate_chars(text, max_chars))?;
        Ok(())
    }
}

/// `{{join items ", "}}`
struct JoinHelper;

impl HelperDef for JoinHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let separator = h.param(1).and_then(|v| v.value().as_str()).unwrap_or(", ");
        if let Some(items) = h.param(0).and_then(|v| v.value().as_array()) {
            let strings: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                .collect();
            out.write(&strings.join(separator))?;
        }
        Ok(())
    }
}

/// `{{json outputs.stage_1}}`
struct JsonHelper;

impl HelperDef for JsonHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        if let Some(param) = h.param(0) {
            let value = param.value();
            if !value.is_null() {
                let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                out.write(&text)?;
            }
        }
        Ok(())
    }
}
