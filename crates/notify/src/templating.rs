//! Minijinja rendering for user-supplied webhook body templates.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call. Undefined
//! variables are errors, which is how a malformed template surfaces
//! as a [`RenderError`] at dispatch time.

use std::collections::BTreeMap;

use herald_core::EvaluationContext;

use crate::error::RenderError;

/// Data available to body templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext<'a> {
    pub title: String,
    pub rule: RuleContext<'a>,
    pub state: &'static str,
    pub previous_state: &'static str,
    pub message: &'a str,
    /// First value per tag key.
    pub tags: BTreeMap<&'a str, &'a str>,
    pub matches: Vec<MatchContext<'a>>,
    pub image_url: Option<&'a str>,
    pub fired_at: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RuleContext<'a> {
    pub id: i64,
    pub name: &'a str,
    pub url: Option<&'a str>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MatchContext<'a> {
    pub metric: &'a str,
    pub value: Option<f64>,
}

impl<'a> TemplateContext<'a> {
    pub fn from_eval(ctx: &'a EvaluationContext) -> Self {
        let mut tags = BTreeMap::new();
        for tag in &ctx.tags {
            tags.entry(tag.key.as_str()).or_insert(tag.value.as_str());
        }

        Self {
            title: ctx.notification_title(),
            rule: RuleContext {
                id: ctx.rule_id,
                name: &ctx.rule_name,
                url: ctx.rule_url.as_deref(),
            },
            state: ctx.state.as_str(),
            previous_state: ctx.previous_state.as_str(),
            message: &ctx.message,
            tags,
            matches: ctx
                .eval_matches
                .iter()
                .map(|m| MatchContext {
                    metric: &m.metric,
                    value: m.value,
                })
                .collect(),
            image_url: ctx.image_public_url.as_deref(),
            fired_at: ctx.fired_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Renders body templates using minijinja.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);

        env.add_filter("round", round_filter);
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env.add_filter("json", json_filter);

        env
    }

    /// Render a template string with the given context.
    pub fn render(
        &self,
        template_str: &str,
        ctx: &TemplateContext<'_>,
    ) -> Result<String, RenderError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| RenderError(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    ///
    /// This does not evaluate the template, it only checks syntax.
    pub fn validate(&self, template_str: &str) -> Result<(), RenderError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| RenderError(e.to_string()))?;
        Ok(())
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Custom filter: JSON-encode a string so templates can emit valid JSON
/// from free-form messages.
fn json_filter(value: String) -> String {
    serde_json::Value::String(value).to_string()
}
