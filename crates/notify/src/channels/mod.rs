//! Channel-specific payload renderers.
//!
//! Each supported channel is one variant of [`Channel`] backed by one
//! module implementing [`ChannelRenderer`]. Rendering is pure: it reads
//! the evaluation context and the channel's immutable settings, and never
//! performs I/O.

pub mod dingding;
pub mod telegram;
pub mod webhook;
pub mod wecom;

use herald_core::EvaluationContext;

use crate::error::RenderError;
use crate::transport::{HttpMethod, TransportResponse};

pub use dingding::DingDingChannel;
pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;
pub use wecom::WeComChannel;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A rendered payload, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Payload {
    pub fn json(value: &serde_json::Value) -> Result<Self, RenderError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| RenderError(format!("failed to serialize payload: {e}")))?;
        Ok(Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            body,
        })
    }

    /// Body as text, for assertions and logging of non-secret payloads.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("<binary payload>")
    }
}

/// Shared contract every channel implements.
pub trait ChannelRenderer: Send + Sync {
    /// Channel type name (e.g. `"dingding"`).
    fn channel_name(&self) -> &'static str;

    /// URL the payload is delivered to.
    fn endpoint(&self) -> &str;

    fn render(&self, ctx: &EvaluationContext) -> Result<Payload, RenderError>;

    fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        None
    }

    /// Decide whether the endpoint accepted the message. `Err` carries a
    /// human-readable failure detail.
    fn acknowledge(&self, response: &TransportResponse) -> Result<(), String> {
        require_success_status(response)
    }
}

/// The closed set of supported channels.
#[derive(Debug, Clone)]
pub enum Channel {
    DingDing(DingDingChannel),
    WeCom(WeComChannel),
    Telegram(TelegramChannel),
    Webhook(WebhookChannel),
}

impl Channel {
    fn inner(&self) -> &dyn ChannelRenderer {
        match self {
            Channel::DingDing(c) => c,
            Channel::WeCom(c) => c,
            Channel::Telegram(c) => c,
            Channel::Webhook(c) => c,
        }
    }
}

impl ChannelRenderer for Channel {
    fn channel_name(&self) -> &'static str {
        self.inner().channel_name()
    }

    fn endpoint(&self) -> &str {
        self.inner().endpoint()
    }

    fn render(&self, ctx: &EvaluationContext) -> Result<Payload, RenderError> {
        self.inner().render(ctx)
    }

    fn method(&self) -> HttpMethod {
        self.inner().method()
    }

    fn basic_auth(&self) -> Option<(String, String)> {
        self.inner().basic_auth()
    }

    fn acknowledge(&self, response: &TransportResponse) -> Result<(), String> {
        self.inner().acknowledge(response)
    }
}

pub(crate) fn require_success_status(response: &TransportResponse) -> Result<(), String> {
    if response.is_success() {
        Ok(())
    } else {
        Err(format!(
            "endpoint returned status {}: {}",
            response.status,
            truncate(&response.body, 256)
        ))
    }
}

/// Chat robots (DingTalk, WeCom) answer 200 with `{"errcode": n, "errmsg": ...}`.
pub(crate) fn require_zero_errcode(response: &TransportResponse) -> Result<(), String> {
    require_success_status(response)?;
    let Ok(body) = serde_json::from_str::<serde_json::Value>(&response.body) else {
        return Ok(());
    };
    match body.get("errcode").and_then(|v| v.as_i64()) {
        None | Some(0) => Ok(()),
        Some(code) => {
            let msg = body
                .get("errmsg")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            Err(format!("errcode {code}: {msg}"))
        }
    }
}

/// Rule message followed by one line per eval match. Empty when there is
/// neither.
pub(crate) fn message_body(ctx: &EvaluationContext) -> String {
    let mut body = if ctx.message.trim().is_empty() {
        String::new()
    } else {
        ctx.message.clone()
    };
    for (i, m) in ctx.eval_matches.iter().enumerate() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&format!("{:2}. {}: {}", i + 1, m.metric, m.value_text()));
    }
    body
}

/// [`message_body`], led by the title when the rule message is empty. For
/// payloads with no separate title field.
pub(crate) fn message_with_matches(ctx: &EvaluationContext) -> String {
    let body = message_body(ctx);
    if !ctx.message.trim().is_empty() {
        return body;
    }
    let title = ctx.notification_title();
    if body.is_empty() {
        title
    } else {
        format!("{title}\n{body}")
    }
}

/// `heading`, then a blank line and `body` when there is one.
pub(crate) fn with_heading(heading: String, body: &str) -> String {
    if body.is_empty() {
        heading
    } else {
        format!("{heading}\n\n{body}")
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
