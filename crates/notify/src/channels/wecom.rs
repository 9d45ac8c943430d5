//! WeCom (WeChat Work) group-robot notifier, text messages only.

use herald_core::EvaluationContext;
use serde_json::json;

use super::{message_body, require_zero_errcode, with_heading, ChannelRenderer, Payload};
use crate::error::{ConfigError, RenderError};
use crate::mentions::Mentions;
use crate::settings::ResolvedSettings;
use crate::transport::TransportResponse;

pub const SECURE_FIELDS: &[&str] = &["url"];

#[derive(Clone)]
pub struct WeComChannel {
    url: String,
}

impl WeComChannel {
    pub fn from_settings(settings: &ResolvedSettings<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: settings.url("url")?,
        })
    }
}

impl std::fmt::Debug for WeComChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeComChannel").finish_non_exhaustive()
    }
}

impl ChannelRenderer for WeComChannel {
    fn channel_name(&self) -> &'static str {
        "wecom"
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn render(&self, ctx: &EvaluationContext) -> Result<Payload, RenderError> {
        let mut content = with_heading(ctx.notification_title(), &message_body(ctx));
        if let Some(rule_url) = ctx.rule_url.as_deref().filter(|u| !u.is_empty()) {
            content.push_str("\n\n");
            content.push_str(rule_url);
        }

        let mut text = json!({ "content": content });
        match Mentions::scan(&ctx.tags) {
            Some(Mentions::Everyone) => text["mentioned_list"] = json!(["@all"]),
            Some(Mentions::Recipients(mobiles)) => text["mentioned_mobile_list"] = json!(mobiles),
            None => {}
        }

        Payload::json(&json!({ "msgtype": "text", "text": text }))
    }

    fn acknowledge(&self, response: &TransportResponse) -> Result<(), String> {
        require_zero_errcode(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretResolver;
    use crate::settings::NotifierSettings;
    use herald_core::AlertState;
    use serde_json::Value;

    fn channel() -> WeComChannel {
        let raw = NotifierSettings::new(
            "wecom",
            "wecom",
            json!({ "url": "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=k" }),
        );
        let view = ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), SECURE_FIELDS)
            .unwrap();
        WeComChannel::from_settings(&view).unwrap()
    }

    fn render(ctx: &EvaluationContext) -> Value {
        serde_json::from_slice(&channel().render(ctx).unwrap().body).unwrap()
    }

    #[test]
    fn plain_text_has_no_mention_lists() {
        let ctx = EvaluationContext::new(AlertState::Ok, "recovered").with_rule(3, "Queue depth");
        let body = render(&ctx);
        assert_eq!(body["text"]["content"], "[OK] Queue depth\n\nrecovered");
        let raw = channel().render(&ctx).unwrap();
        assert!(!raw.as_str().contains("mentioned"));
    }

    #[test]
    fn empty_message_shows_title_once() {
        let ctx = EvaluationContext::new(AlertState::Alerting, "").with_rule(3, "Queue depth");
        assert_eq!(render(&ctx)["text"]["content"], "[Alerting] Queue depth");
    }

    #[test]
    fn broadcast_mentions_all() {
        let ctx = EvaluationContext::new(AlertState::Alerting, "x").with_tag("isAtAll", "true");
        let body = render(&ctx);
        assert_eq!(body["text"]["mentioned_list"], json!(["@all"]));
        assert!(body["text"].get("mentioned_mobile_list").is_none());
    }

    #[test]
    fn targeted_mentions_mobiles() {
        let ctx = EvaluationContext::new(AlertState::Alerting, "x")
            .with_tag("atMobiles", "13800000000,13900000000");
        let body = render(&ctx);
        assert_eq!(
            body["text"]["mentioned_mobile_list"],
            json!(["13800000000", "13900000000"])
        );
        assert!(body["text"].get("mentioned_list").is_none());
    }
}
