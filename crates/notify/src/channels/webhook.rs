//! Generic HTTP webhook notifier.
//!
//! Posts a JSON document describing the evaluation, or the output of a
//! user-supplied minijinja body template, to the configured URL with
//! optional basic auth.

use std::sync::Arc;

use herald_core::EvaluationContext;
use serde_json::{json, Map, Value};

use super::{ChannelRenderer, Payload, JSON_CONTENT_TYPE};
use crate::error::{ConfigError, RenderError};
use crate::settings::ResolvedSettings;
use crate::templating::{TemplateContext, TemplateRenderer};
use crate::transport::HttpMethod;

pub const SECURE_FIELDS: &[&str] = &["url", "password"];

#[derive(Clone)]
pub struct WebhookChannel {
    url: String,
    method: HttpMethod,
    username: Option<String>,
    password: String,
    /// When set, rendered and sent verbatim instead of the default document.
    body_template: Option<String>,
    content_type: String,
    renderer: Arc<TemplateRenderer>,
}

impl WebhookChannel {
    /// Body template syntax is checked here so that a broken template
    /// rejects the notifier instead of failing every dispatch.
    pub fn from_settings(settings: &ResolvedSettings<'_>) -> Result<Self, ConfigError> {
        let url = settings.url("url")?;

        let method = match settings.string_or("httpMethod", "POST").to_uppercase().as_str() {
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            other => {
                return Err(ConfigError::invalid(
                    "httpMethod",
                    format!("expected POST or PUT, got '{other}'"),
                ))
            }
        };

        let renderer = Arc::new(TemplateRenderer::new());
        let body_template = settings.optional("bodyTemplate");
        if let Some(tmpl) = &body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| ConfigError::invalid("bodyTemplate", e.0))?;
        }

        Ok(Self {
            url,
            method,
            username: settings.optional("username"),
            password: settings.string("password"),
            body_template,
            content_type: settings.string_or("contentType", JSON_CONTENT_TYPE),
            renderer,
        })
    }

    fn default_document(ctx: &EvaluationContext) -> Value {
        let mut tags = Map::new();
        for tag in &ctx.tags {
            if !tags.contains_key(&tag.key) {
                tags.insert(tag.key.clone(), Value::String(tag.value.clone()));
            }
        }

        let matches: Vec<Value> = ctx
            .eval_matches
            .iter()
            .map(|m| json!({ "metric": m.metric, "value": m.value }))
            .collect();

        let mut doc = json!({
            "title": ctx.notification_title(),
            "ruleId": ctx.rule_id,
            "ruleName": ctx.rule_name,
            "state": ctx.state.as_str(),
            "message": ctx.message,
            "evalMatches": matches,
            "tags": tags,
        });
        if let Some(url) = &ctx.rule_url {
            doc["ruleUrl"] = json!(url);
        }
        if let Some(url) = &ctx.image_public_url {
            doc["imageUrl"] = json!(url);
        }
        doc
    }
}

impl std::fmt::Debug for WebhookChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookChannel")
            .field("method", &self.method)
            .field("username", &self.username)
            .field("body_template", &self.body_template.is_some())
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl ChannelRenderer for WebhookChannel {
    fn channel_name(&self) -> &'static str {
        "webhook"
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn render(&self, ctx: &EvaluationContext) -> Result<Payload, RenderError> {
        match &self.body_template {
            Some(tmpl) => {
                let body = self.renderer.render(tmpl, &TemplateContext::from_eval(ctx))?;
                Ok(Payload {
                    content_type: self.content_type.clone(),
                    body: body.into_bytes(),
                })
            }
            None => {
                let mut payload = Payload::json(&Self::default_document(ctx))?;
                payload.content_type = self.content_type.clone();
                Ok(payload)
            }
        }
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        self.username
            .as_ref()
            .map(|user| (user.clone(), self.password.clone()))
    }
}
