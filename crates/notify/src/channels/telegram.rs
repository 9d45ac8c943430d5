//! Telegram Bot API notifier.
//!
//! Delivers through the `sendMessage` endpoint. Supports plain text,
//! MarkdownV2 and HTML parse modes, and reports rate limiting.

use herald_core::EvaluationContext;
use serde_json::json;

use super::{message_body, with_heading, ChannelRenderer, Payload};
use crate::error::{ConfigError, RenderError};
use crate::settings::{validate_url, ResolvedSettings};
use crate::transport::TransportResponse;

pub const SECURE_FIELDS: &[&str] = &["bottoken"];

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Escapes special characters for Telegram MarkdownV2 parse mode.
///
/// Telegram requires these characters to be escaped with a preceding backslash
/// when using MarkdownV2: `_`, `*`, `[`, `]`, `(`, `)`, `~`, `` ` ``, `>`,
/// `#`, `+`, `-`, `=`, `|`, `{`, `}`, `.`, `!`, `\`
pub fn escape_markdown_v2(text: &str) -> String {
    let special = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
        '\\',
    ];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if special.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

/// Inside `(...)` of a MarkdownV2 link only `)` and `\` need escaping.
fn escape_link_url(url: &str) -> String {
    let mut result = String::with_capacity(url.len());
    for ch in url.chars() {
        if ch == ')' || ch == '\\' {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    MarkdownV2,
    Html,
}

impl ParseMode {
    fn parse(value: &str) -> Result<Option<Self>, ConfigError> {
        match value {
            "" => Ok(None),
            "MarkdownV2" => Ok(Some(ParseMode::MarkdownV2)),
            "HTML" => Ok(Some(ParseMode::Html)),
            other => Err(ConfigError::invalid(
                "parseMode",
                format!("expected MarkdownV2 or HTML, got '{other}'"),
            )),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ParseMode::MarkdownV2 => "MarkdownV2",
            ParseMode::Html => "HTML",
        }
    }
}

/// Sends notifications via the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramChannel {
    /// `<api>/bot<token>/sendMessage`; embeds the bot token.
    endpoint: String,
    chat_id: String,
    parse_mode: Option<ParseMode>,
}

impl TelegramChannel {
    pub fn from_settings(settings: &ResolvedSettings<'_>) -> Result<Self, ConfigError> {
        let bot_token = settings.required("bottoken")?;
        let chat_id = settings.required("chatid")?;
        let parse_mode = ParseMode::parse(&settings.string("parseMode"))?;

        let api_url = settings.string_or("apiUrl", DEFAULT_API_URL);
        validate_url("apiUrl", &api_url)?;
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            api_url.trim_end_matches('/'),
            bot_token
        );

        Ok(Self {
            endpoint,
            chat_id,
            parse_mode,
        })
    }

    fn text(&self, ctx: &EvaluationContext) -> String {
        let title = ctx.notification_title();
        let message = message_body(ctx);
        let rule_url = ctx.rule_url.as_deref().filter(|u| !u.is_empty());

        match self.parse_mode {
            None => {
                let mut text = with_heading(title, &message);
                if let Some(url) = rule_url {
                    text.push_str(&format!("\n\n{url}"));
                }
                text
            }
            Some(ParseMode::MarkdownV2) => {
                let mut text = with_heading(
                    format!("*{}*", escape_markdown_v2(&title)),
                    &escape_markdown_v2(&message),
                );
                if let Some(url) = rule_url {
                    text.push_str(&format!("\n\n[View rule]({})", escape_link_url(url)));
                }
                text
            }
            Some(ParseMode::Html) => {
                let mut text = with_heading(
                    format!("<b>{}</b>", escape_html(&title)),
                    &escape_html(&message),
                );
                if let Some(url) = rule_url {
                    text.push_str(&format!(
                        "\n\n<a href=\"{}\">View rule</a>",
                        escape_html(url).replace('"', "&quot;")
                    ));
                }
                text
            }
        }
    }
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("chat_id", &self.chat_id)
            .field("parse_mode", &self.parse_mode)
            .finish_non_exhaustive()
    }
}

impl ChannelRenderer for TelegramChannel {
    fn channel_name(&self) -> &'static str {
        "telegram"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn render(&self, ctx: &EvaluationContext) -> Result<Payload, RenderError> {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": self.text(ctx),
        });
        if let Some(mode) = self.parse_mode {
            body["parse_mode"] = json!(mode.as_str());
        }
        Payload::json(&body)
    }

    fn acknowledge(&self, response: &TransportResponse) -> Result<(), String> {
        let body: serde_json::Value =
            serde_json::from_str(&response.body).unwrap_or(serde_json::Value::Null);

        if response.is_success() && body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            return Ok(());
        }

        if response.status == 429 {
            let retry_after = body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(format!("rate limited: retry after {retry_after}s"));
        }

        let description = body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");
        Err(format!("Telegram API error ({}): {description}", response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretResolver;
    use crate::settings::NotifierSettings;
    use herald_core::AlertState;
    use serde_json::Value;

    fn build(settings: Value) -> Result<TelegramChannel, ConfigError> {
        let raw = NotifierSettings::new("tg", "telegram", settings);
        let view = ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), SECURE_FIELDS)
            .unwrap();
        TelegramChannel::from_settings(&view)
    }

    #[test]
    fn test_escape_markdown_v2_special_chars() {
        let input = concat!(
            "Hello_World *bold* [link](url) ~strike~ `code` >quote ",
            "#tag +plus -minus =eq |pipe {brace} .dot !bang",
        );
        let expected = concat!(
            r"Hello\_World \*bold\* \[link\]\(url\) \~strike\~ \`code\` \>quote ",
            r"\#tag \+plus \-minus \=eq \|pipe \{brace\} \.dot \!bang",
        );
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn test_escape_markdown_v2_no_special_chars() {
        assert_eq!(escape_markdown_v2("Hello World 123"), "Hello World 123");
        assert_eq!(escape_markdown_v2(""), "");
    }

    #[test]
    fn requires_token_and_chat() {
        assert_eq!(
            build(json!({ "chatid": "1" })).unwrap_err(),
            ConfigError::missing("bottoken")
        );
        assert_eq!(
            build(json!({ "bottoken": "123:ABC" })).unwrap_err(),
            ConfigError::missing("chatid")
        );
    }

    #[test]
    fn endpoint_embeds_token() {
        let ch = build(json!({ "bottoken": "123:ABC", "chatid": "-100123" })).unwrap();
        assert_eq!(ch.endpoint(), "https://api.telegram.org/bot123:ABC/sendMessage");
        assert!(!format!("{ch:?}").contains("123:ABC"));

        let ch = build(json!({
            "bottoken": "t", "chatid": "1", "apiUrl": "http://localhost:8081/"
        }))
        .unwrap();
        assert_eq!(ch.endpoint(), "http://localhost:8081/bott/sendMessage");
    }

    #[test]
    fn markdown_v2_render() {
        let ch = build(json!({ "bottoken": "t", "chatid": "42", "parseMode": "MarkdownV2" }))
            .unwrap();
        let ctx =
            EvaluationContext::new(AlertState::Alerting, "cpu > 90.5%").with_rule(1, "CPU-high");
        let body: Value = serde_json::from_slice(&ch.render(&ctx).unwrap().body).unwrap();
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["parse_mode"], "MarkdownV2");
        let expected = format!("{}\n\n{}", r"*\[Alerting\] CPU\-high*", r"cpu \> 90\.5%");
        assert_eq!(body["text"], expected);
    }

    #[test]
    fn html_render_escapes() {
        let ch = build(json!({ "bottoken": "t", "chatid": "42", "parseMode": "HTML" })).unwrap();
        let ctx = EvaluationContext::new(AlertState::Ok, "a < b").with_rule(1, "R&D");
        let body: Value = serde_json::from_slice(&ch.render(&ctx).unwrap().body).unwrap();
        assert_eq!(body["text"], "<b>[OK] R&amp;D</b>\n\na &lt; b");
    }

    #[test]
    fn empty_message_shows_title_once() {
        let ch = build(json!({ "bottoken": "t", "chatid": "42" })).unwrap();
        let ctx = EvaluationContext::new(AlertState::Alerting, "").with_rule(1, "Disk");
        let body: Value = serde_json::from_slice(&ch.render(&ctx).unwrap().body).unwrap();
        assert_eq!(body["text"], "[Alerting] Disk");
    }

    #[test]
    fn invalid_parse_mode() {
        let err = build(json!({ "bottoken": "t", "chatid": "1", "parseMode": "bbcode" }))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn acknowledge_rate_limit_and_errors() {
        let ch = build(json!({ "bottoken": "t", "chatid": "1" })).unwrap();
        let ok = TransportResponse { status: 200, body: r#"{"ok":true,"result":{}}"#.into() };
        assert!(ch.acknowledge(&ok).is_ok());

        let limited = TransportResponse {
            status: 429,
            body: r#"{"ok":false,"parameters":{"retry_after":12}}"#.into(),
        };
        assert_eq!(ch.acknowledge(&limited).unwrap_err(), "rate limited: retry after 12s");

        let bad = TransportResponse {
            status: 400,
            body: r#"{"ok":false,"description":"Bad Request: chat not found"}"#.into(),
        };
        assert_eq!(
            ch.acknowledge(&bad).unwrap_err(),
            "Telegram API error (400): Bad Request: chat not found"
        );
    }
}
