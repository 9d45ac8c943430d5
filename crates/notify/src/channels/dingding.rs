//! DingTalk custom-robot notifier.
//!
//! Supports the robot's `text`, `markdown`, `link` and `actionCard`
//! message types. Mention tags map to the top-level `at` object, which
//! DingTalk honours for `text` and `markdown` only.

use herald_core::EvaluationContext;
use serde_json::{json, Value};

use super::{
    message_body, message_with_matches, require_zero_errcode, with_heading, ChannelRenderer,
    Payload,
};
use crate::error::{ConfigError, RenderError};
use crate::mentions::Mentions;
use crate::settings::ResolvedSettings;
use crate::transport::TransportResponse;

/// Robot URLs embed the access token, so `url` may be stored encrypted.
pub const SECURE_FIELDS: &[&str] = &["url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsgType {
    #[default]
    Text,
    Markdown,
    Link,
    ActionCard,
}

impl MsgType {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "" | "text" => Ok(MsgType::Text),
            "markdown" => Ok(MsgType::Markdown),
            "link" => Ok(MsgType::Link),
            "actionCard" => Ok(MsgType::ActionCard),
            other => Err(ConfigError::invalid(
                "msgType",
                format!("expected text, markdown, link or actionCard, got '{other}'"),
            )),
        }
    }
}

#[derive(Clone)]
pub struct DingDingChannel {
    url: String,
    msg_type: MsgType,
}

impl DingDingChannel {
    pub fn from_settings(settings: &ResolvedSettings<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: settings.url("url")?,
            msg_type: MsgType::parse(&settings.string("msgType"))?,
        })
    }

    pub fn msg_type(&self) -> MsgType {
        self.msg_type
    }
}

impl std::fmt::Debug for DingDingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingDingChannel")
            .field("msg_type", &self.msg_type)
            .finish_non_exhaustive()
    }
}

impl ChannelRenderer for DingDingChannel {
    fn channel_name(&self) -> &'static str {
        "dingding"
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn render(&self, ctx: &EvaluationContext) -> Result<Payload, RenderError> {
        let title = ctx.notification_title();
        let message = message_with_matches(ctx);
        let mentions = Mentions::scan(&ctx.tags);
        let pic_url = ctx.image_public_url.as_deref().unwrap_or_default();
        let rule_url = ctx.rule_url.as_deref().filter(|u| !u.is_empty());

        let mut body = match self.msg_type {
            MsgType::Text => {
                let mut content = with_heading(title, &message_body(ctx));
                if let Some(rule_url) = rule_url {
                    content.push_str("\n\n");
                    content.push_str(rule_url);
                }
                json!({ "msgtype": "text", "text": { "content": content } })
            }
            MsgType::Markdown => {
                let mut text = with_heading(format!("#### {title}"), &message_body(ctx));
                if !pic_url.is_empty() {
                    text.push_str(&format!("\n\n![]({pic_url})"));
                }
                if rule_url.is_some() {
                    text.push_str(&format!("\n\n[View rule]({})", client_link(ctx)));
                }
                // DingTalk only highlights mobiles that also appear in the text.
                if let Some(Mentions::Recipients(mobiles)) = &mentions {
                    let ats: Vec<String> = mobiles.iter().map(|m| format!("@{m}")).collect();
                    text.push_str("\n\n");
                    text.push_str(&ats.join(" "));
                }
                json!({ "msgtype": "markdown", "markdown": { "title": title, "text": text } })
            }
            MsgType::Link => json!({
                "msgtype": "link",
                "link": {
                    "text": message,
                    "title": title,
                    "picUrl": pic_url,
                    "messageUrl": client_link(ctx),
                }
            }),
            MsgType::ActionCard => {
                // actionCard has no picture field; embed the image in the markdown.
                let text = if pic_url.is_empty() {
                    message
                } else {
                    format!("![]({pic_url})\n\n{message}")
                };
                json!({
                    "msgtype": "actionCard",
                    "actionCard": {
                        "text": text,
                        "title": title,
                        "singleTitle": "More",
                        "singleURL": client_link(ctx),
                    }
                })
            }
        };

        if matches!(self.msg_type, MsgType::Text | MsgType::Markdown) {
            if let Some(at) = at_object(mentions.as_ref()) {
                body["at"] = at;
            }
        }

        Payload::json(&body)
    }

    fn acknowledge(&self, response: &TransportResponse) -> Result<(), String> {
        require_zero_errcode(response)
    }
}

fn at_object(mentions: Option<&Mentions>) -> Option<Value> {
    match mentions? {
        Mentions::Everyone => Some(json!({ "isAtAll": true })),
        Mentions::Recipients(mobiles) => Some(json!({ "atMobiles": mobiles })),
    }
}

/// Deep link that makes the DingTalk client open the rule URL in the
/// system browser instead of its side panel.
fn client_link(ctx: &EvaluationContext) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("pc_slide", "false")
        .append_pair("url", ctx.rule_url.as_deref().unwrap_or_default())
        .finish();
    format!("dingtalk://dingtalkclient/page/link?{query}")
}
