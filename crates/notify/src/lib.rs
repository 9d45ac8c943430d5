//! Alert notification dispatch.
//!
//! This crate provides:
//! - `Notifier` trait and the channel-backed `ChannelNotifier`
//! - DingDing, WeCom, Telegram and webhook payload renderers
//! - `Registry` that validates settings and builds notifiers by type
//! - `SecretResolver` for encrypted settings fields
//! - `Dispatcher` that routes an evaluation to configured notifiers

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod loader;
pub mod mentions;
pub mod notifier;
pub mod registry;
pub mod secrets;
pub mod settings;
pub mod store;
pub mod templating;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use error::{
    BuildError, ConfigError, DecryptionError, LoadError, RenderError, StoreError, TransportError,
};
pub use loader::NotifierLoader;
pub use mentions::Mentions;
pub use notifier::{ChannelNotifier, DeliveryResult, FailureKind, Notifier, NotifierConfig};
pub use registry::{NotifierDescriptor, Registry};
pub use secrets::{AesGcmDecryptor, Decryptor, PlaintextDecryptor, SecretResolver};
pub use settings::NotifierSettings;
pub use store::{InMemorySettingsStore, SettingsStore};
pub use transport::{HttpTransport, Transport, TransportResponse, WebhookRequest};
