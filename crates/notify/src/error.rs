//! Error taxonomy for notifier construction, rendering and delivery.
//!
//! Construction errors ([`ConfigError`], [`DecryptionError`]) are fatal:
//! no notifier is created. Render and transport failures surface as a
//! [`crate::DeliveryResult`] value from dispatch instead of an `Err`.

/// Invalid or incomplete notifier settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not find {field} property in settings")]
    MissingField { field: String },

    #[error("Invalid URL in {field}: {reason}")]
    InvalidUrl { field: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidSetting { field: String, reason: String },

    #[error("Unsupported notifier type: {0}")]
    UnknownType(String),
}

impl ConfigError {
    pub fn missing(field: &str) -> Self {
        ConfigError::MissingField {
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSetting {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A secure setting could not be decrypted. Never carries the ciphertext
/// or any partial plaintext.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to decrypt secure setting '{field}': {reason}")]
pub struct DecryptionError {
    pub field: String,
    pub reason: String,
}

impl DecryptionError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Why building a notifier failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),
}

/// Payload rendering failed. Only reachable through malformed template
/// state; missing or empty input always renders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Render failed: {0}")]
pub struct RenderError(pub String);

/// Failure at the transport layer, before a response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        // Strip the URL: channel endpoints may embed credentials.
        let e = e.without_url();
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Settings store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Setting not found: {0}")]
    NotFound(i64),

    #[error("Version conflict for setting {id}: expected {expected}, found {found}")]
    VersionConflict { id: i64, expected: i64, found: i64 },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors from loading a notifier out of the settings store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Organization not found: {0}")]
    OrgNotFound(String),

    #[error("Notifier {0} not found")]
    NotFound(i64),

    #[error("Notifier {0} is disabled")]
    Disabled(i64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Build(#[from] BuildError),
}
