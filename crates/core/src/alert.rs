use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State an alert rule is in after an evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Alerting,
    Ok,
    NoData,
    Paused,
    Pending,
    #[default]
    Unknown,
}

impl AlertState {
    /// Wire name, as used in JSON payloads (`"alerting"`, `"no_data"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Alerting => "alerting",
            AlertState::Ok => "ok",
            AlertState::NoData => "no_data",
            AlertState::Paused => "paused",
            AlertState::Pending => "pending",
            AlertState::Unknown => "unknown",
        }
    }

    /// Human-readable label used in notification titles.
    pub fn text(&self) -> &'static str {
        match self {
            AlertState::Alerting => "Alerting",
            AlertState::Ok => "OK",
            AlertState::NoData => "No Data",
            AlertState::Paused => "Paused",
            AlertState::Pending => "Pending",
            AlertState::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value label attached to an alert rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A single series that matched the rule condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalMatch {
    pub metric: String,
    /// `None` when the series had no value (null datapoint).
    #[serde(default)]
    pub value: Option<f64>,
}

impl EvalMatch {
    /// Value formatted for message bodies; missing values render as `null`.
    pub fn value_text(&self) -> String {
        match self.value {
            Some(v) => v.to_string(),
            None => "null".to_string(),
        }
    }
}

/// Snapshot of one alert-rule evaluation, produced by the scheduler and
/// handed read-only to every notifier configured for the rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationContext {
    #[serde(default)]
    pub rule_id: i64,
    #[serde(default)]
    pub rule_name: String,
    #[serde(default)]
    pub rule_url: Option<String>,
    pub state: AlertState,
    #[serde(default)]
    pub previous_state: AlertState,
    #[serde(default)]
    pub message: String,
    /// Rule tags in declaration order.
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub eval_matches: Vec<EvalMatch>,
    #[serde(default)]
    pub image_public_url: Option<String>,
    #[serde(default)]
    pub fired_at: Option<DateTime<Utc>>,
}

impl EvaluationContext {
    pub fn new(state: AlertState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, id: i64, name: impl Into<String>) -> Self {
        self.rule_id = id;
        self.rule_name = name.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// `[<State>] <rule name>`, e.g. `[Alerting] CPU usage`.
    pub fn notification_title(&self) -> String {
        format!("[{}] {}", self.state.text(), self.rule_name)
    }

    /// First tag with the given key, scanning in declaration order.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_state_text() {
        let ctx = EvaluationContext::new(AlertState::NoData, "").with_rule(1, "Disk full");
        assert_eq!(ctx.notification_title(), "[No Data] Disk full");
    }

    #[test]
    fn tag_lookup_is_first_match() {
        let ctx = EvaluationContext::new(AlertState::Alerting, "x")
            .with_tag("team", "infra")
            .with_tag("team", "db");
        assert_eq!(ctx.tag("team"), Some("infra"));
        assert_eq!(ctx.tag("missing"), None);
    }

    #[test]
    fn deserializes_minimal_json() {
        let ctx: EvaluationContext =
            serde_json::from_str(r#"{"state":"alerting","message":"high load"}"#).unwrap();
        assert_eq!(ctx.state, AlertState::Alerting);
        assert_eq!(ctx.previous_state, AlertState::Unknown);
        assert!(ctx.tags.is_empty());
        assert!(ctx.rule_url.is_none());
    }

    #[test]
    fn state_wire_names() {
        assert_eq!(serde_json::to_string(&AlertState::NoData).unwrap(), "\"no_data\"");
        assert_eq!(AlertState::Ok.to_string(), "ok");
        assert_eq!(AlertState::Ok.text(), "OK");
    }

    #[test]
    fn eval_match_null_value() {
        let m = EvalMatch { metric: "cpu".into(), value: None };
        assert_eq!(m.value_text(), "null");
        let m = EvalMatch { metric: "cpu".into(), value: Some(92.5) };
        assert_eq!(m.value_text(), "92.5");
    }
}
