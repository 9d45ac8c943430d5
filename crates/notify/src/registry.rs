//! Maps notifier type strings to validated constructors.
//!
//! Building is pure validation plus decryption: no network calls.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::channels::{
    dingding, telegram, webhook, wecom, Channel, ChannelRenderer, DingDingChannel,
    TelegramChannel, WeComChannel, WebhookChannel,
};
use crate::error::{BuildError, ConfigError};
use crate::notifier::{ChannelNotifier, NotifierConfig};
use crate::secrets::SecretResolver;
use crate::settings::{NotifierSettings, ResolvedSettings};
use crate::transport::Transport;

type ChannelFactory = fn(&ResolvedSettings<'_>) -> Result<Channel, ConfigError>;

/// Describes a registered notifier type, for configuration UIs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NotifierDescriptor {
    /// Type string used in settings blobs (e.g. `"dingding"`).
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Display name.
    pub name: &'static str,
    pub description: &'static str,
    /// Settings fields that may be stored encrypted.
    pub secure_fields: &'static [&'static str],
}

struct Entry {
    descriptor: NotifierDescriptor,
    factory: ChannelFactory,
}

/// Notifier factory keyed by type string.
pub struct Registry {
    entries: BTreeMap<&'static str, Entry>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Registry {
    /// Empty registry; notifiers it builds use `transport` and give up on
    /// a delivery after `timeout`.
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            transport,
            timeout,
        }
    }

    /// Registry with every built-in channel.
    pub fn with_defaults(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        let mut registry = Self::new(transport, timeout);
        registry.register(
            NotifierDescriptor {
                kind: "dingding",
                name: "DingDing",
                description: "Sends HTTP POST request to DingDing",
                secure_fields: dingding::SECURE_FIELDS,
            },
            |s| DingDingChannel::from_settings(s).map(Channel::DingDing),
        );
        registry.register(
            NotifierDescriptor {
                kind: "wecom",
                name: "WeCom",
                description: "Sends text messages to a WeCom group robot",
                secure_fields: wecom::SECURE_FIELDS,
            },
            |s| WeComChannel::from_settings(s).map(Channel::WeCom),
        );
        registry.register(
            NotifierDescriptor {
                kind: "telegram",
                name: "Telegram",
                description: "Sends notifications to Telegram",
                secure_fields: telegram::SECURE_FIELDS,
            },
            |s| TelegramChannel::from_settings(s).map(Channel::Telegram),
        );
        registry.register(
            NotifierDescriptor {
                kind: "webhook",
                name: "webhook",
                description: "Sends HTTP POST request to a URL",
                secure_fields: webhook::SECURE_FIELDS,
            },
            |s| WebhookChannel::from_settings(s).map(Channel::Webhook),
        );
        registry
    }

    /// Add or replace a notifier type.
    pub fn register(&mut self, descriptor: NotifierDescriptor, factory: ChannelFactory) {
        self.entries.insert(descriptor.kind, Entry { descriptor, factory });
    }

    /// Registered types, sorted by type string.
    pub fn descriptors(&self) -> Vec<&NotifierDescriptor> {
        self.entries.values().map(|e| &e.descriptor).collect()
    }

    /// Whether `kind` is a registered type.
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// Validate `raw` as a notifier of type `kind` and construct it.
    ///
    /// Secure fields are decrypted first, then the channel factory validates
    /// the resolved settings. No I/O happens here.
    ///
    /// # Errors
    ///
    /// `UnknownType` for an unregistered `kind`, `DecryptionError` when a
    /// secure field cannot be decrypted, and the channel's `ConfigError`
    /// (`MissingField`, `InvalidUrl`, `InvalidSetting`) otherwise.
    pub fn build(
        &self,
        kind: &str,
        raw: &NotifierSettings,
        resolver: &SecretResolver,
    ) -> Result<ChannelNotifier, BuildError> {
        let entry = self
            .entries
            .get(kind)
            .ok_or_else(|| ConfigError::UnknownType(kind.to_string()))?;

        let settings = ResolvedSettings::resolve(raw, resolver, entry.descriptor.secure_fields)?;
        let channel = (entry.factory)(&settings)?;

        let config = NotifierConfig {
            uid: raw.uid.clone(),
            name: raw.name.clone(),
            kind: entry.descriptor.kind.to_string(),
            endpoint: channel.endpoint().to_string(),
            disable_resolve_message: raw.disable_resolve_message,
            decrypted_secrets: settings.into_secrets(),
        };

        tracing::debug!(notifier = %config.name, kind, "notifier built");

        Ok(ChannelNotifier::new(
            config,
            channel,
            self.transport.clone(),
            self.timeout,
        ))
    }

    /// [`Registry::build`] using the type recorded in the settings blob.
    pub fn build_from(
        &self,
        raw: &NotifierSettings,
        resolver: &SecretResolver,
    ) -> Result<ChannelNotifier, BuildError> {
        self.build(&raw.kind, raw, resolver)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.entries.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
