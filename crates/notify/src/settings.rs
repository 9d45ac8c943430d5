//! Raw notifier settings and a resolved, typed view over them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DecryptionError};
use crate::secrets::SecretResolver;

/// The settings blob a notifier is built from, as stored by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotifierSettings {
    #[serde(default)]
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub disable_resolve_message: bool,
    /// Plain (non-secret) channel settings.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    /// Field name → stored ciphertext.
    #[serde(default)]
    pub secure_settings: HashMap<String, String>,
}

impl NotifierSettings {
    /// Settings without secure fields. Non-object `settings` are treated as empty.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        settings: serde_json::Value,
    ) -> Self {
        let settings = match settings {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            name: name.into(),
            kind: kind.into(),
            settings,
            ..Self::default()
        }
    }

    pub fn with_secure(mut self, field: impl Into<String>, ciphertext: impl Into<String>) -> Self {
        self.secure_settings.insert(field.into(), ciphertext.into());
        self
    }

    /// Plain string value of `field`, if present and a string.
    pub fn plain_str(&self, field: &str) -> Option<&str> {
        self.settings.get(field).and_then(|v| v.as_str())
    }
}

/// Settings with every secure field of the channel already decrypted.
///
/// Lookups consult decrypted secrets first, then plain settings.
pub struct ResolvedSettings<'a> {
    raw: &'a NotifierSettings,
    secrets: HashMap<String, String>,
}

impl<'a> ResolvedSettings<'a> {
    /// Decrypt `secure_fields` up front. The first failure aborts.
    pub fn resolve(
        raw: &'a NotifierSettings,
        resolver: &SecretResolver,
        secure_fields: &[&str],
    ) -> Result<Self, DecryptionError> {
        let mut secrets = HashMap::new();
        for field in secure_fields {
            if raw.secure_settings.contains_key(*field) {
                secrets.insert(field.to_string(), resolver.resolve(raw, field)?);
            }
        }
        Ok(Self { raw, secrets })
    }

    pub fn raw(&self) -> &NotifierSettings {
        self.raw
    }

    /// Decrypted secrets, consumed into the notifier config.
    pub fn into_secrets(self) -> HashMap<String, String> {
        self.secrets
    }

    /// Untrimmed value, secrets first, or `""` when absent.
    fn lookup(&self, field: &str) -> &str {
        self.secrets
            .get(field)
            .map(String::as_str)
            .or_else(|| self.raw.plain_str(field))
            .unwrap_or_default()
    }

    /// Trimmed string value, or `""` when absent.
    pub fn string(&self, field: &str) -> String {
        self.lookup(field).trim().to_string()
    }

    pub fn string_or(&self, field: &str, default: &str) -> String {
        match self.string(field) {
            s if s.is_empty() => default.to_string(),
            s => s,
        }
    }

    /// Non-empty string value, or `MissingField`.
    pub fn required(&self, field: &str) -> Result<String, ConfigError> {
        match self.string(field) {
            s if s.is_empty() => Err(ConfigError::missing(field)),
            s => Ok(s),
        }
    }

    pub fn optional(&self, field: &str) -> Option<String> {
        Some(self.string(field)).filter(|s| !s.is_empty())
    }

    /// Required http(s) URL, returned exactly as configured.
    ///
    /// # Errors
    ///
    /// `MissingField` when blank; `InvalidUrl` when unparseable, not http(s),
    /// or padded with whitespace.
    pub fn url(&self, field: &str) -> Result<String, ConfigError> {
        let value = self.lookup(field);
        if value.trim().is_empty() {
            return Err(ConfigError::missing(field));
        }
        if value.trim() != value {
            return Err(ConfigError::InvalidUrl {
                field: field.to_string(),
                reason: "leading or trailing whitespace".to_string(),
            });
        }
        validate_url(field, value)?;
        Ok(value.to_string())
    }

    /// Boolean setting; accepts JSON booleans and `"true"`/`"false"` strings.
    pub fn bool_or(&self, field: &str, default: bool) -> bool {
        match self.raw.settings.get(field) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => default,
        }
    }
}

/// Check that `value` parses as an absolute http(s) URL.
pub fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_settings_blob() {
        let raw: NotifierSettings = serde_json::from_value(json!({
            "uid": "ops-ding",
            "name": "ops",
            "type": "dingding",
            "disableResolveMessage": true,
            "settings": { "url": "https://oapi.dingtalk.com/robot/send" },
            "secureSettings": { "password": "aa:bb:cc" }
        }))
        .unwrap();
        assert_eq!(raw.kind, "dingding");
        assert!(raw.disable_resolve_message);
        assert_eq!(raw.plain_str("url"), Some("https://oapi.dingtalk.com/robot/send"));
        assert_eq!(raw.secure_settings["password"], "aa:bb:cc");
    }

    #[test]
    fn required_rejects_blank() {
        let raw = NotifierSettings::new("n", "webhook", json!({ "url": "   " }));
        let view = ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), &[]).unwrap();
        assert_eq!(view.required("url"), Err(ConfigError::missing("url")));
        assert_eq!(view.url("url"), Err(ConfigError::missing("url")));
    }

    #[test]
    fn url_is_kept_verbatim() {
        let raw = NotifierSettings::new("n", "webhook", json!({ "url": "https://www.google.com" }));
        let view = ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), &[]).unwrap();
        assert_eq!(view.url("url").unwrap(), "https://www.google.com");
    }

    #[test]
    fn url_with_surrounding_whitespace_rejected() {
        let raw =
            NotifierSettings::new("n", "webhook", json!({ "url": " https://www.google.com " }));
        let view = ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), &[]).unwrap();
        assert!(matches!(
            view.url("url"),
            Err(ConfigError::InvalidUrl { ref field, .. }) if field == "url"
        ));
    }

    #[test]
    fn url_rejects_garbage_and_other_schemes() {
        assert!(matches!(
            validate_url("url", "not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("url", "ftp://example.com"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn secure_value_shadows_plain_value() {
        let raw = NotifierSettings::new("n", "webhook", json!({ "password": "plain" }))
            .with_secure("password", "secure");
        let view =
            ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), &["password"]).unwrap();
        assert_eq!(view.string("password"), "secure");
        assert_eq!(view.into_secrets()["password"], "secure");
    }

    #[test]
    fn bool_accepts_strings() {
        let raw = NotifierSettings::new("n", "webhook", json!({ "a": "true", "b": false }));
        let view = ResolvedSettings::resolve(&raw, &SecretResolver::plaintext(), &[]).unwrap();
        assert!(view.bool_or("a", false));
        assert!(!view.bool_or("b", true));
        assert!(view.bool_or("c", true));
    }

    #[test]
    fn non_object_settings_are_empty() {
        let raw = NotifierSettings::new("n", "webhook", json!("oops"));
        assert!(raw.settings.is_empty());
    }
}
