use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub dispatch: DispatchConfig,
    pub secrets: SecretsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `HERALD_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("HERALD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            dispatch: DispatchConfig::from_env_profiled(p),
            secrets: SecretsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  dispatch:    timeout={}s, user_agent={}",
            self.dispatch.timeout_secs,
            self.dispatch.user_agent
        );
        tracing::info!("  secrets:     key_configured={}", self.secrets.is_configured());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "dispatch": {
                "timeout_secs": self.dispatch.timeout_secs,
                "user_agent": self.dispatch.user_agent,
            },
            "secrets": { "secret_key_configured": self.secrets.is_configured() },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            dispatch: DispatchConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

// ── Dispatch ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound for a single delivery attempt.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl DispatchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            timeout_secs: profiled_env_u64(p, "DISPATCH_TIMEOUT_SECS", 30),
            user_agent: profiled_env_or(p, "HTTP_USER_AGENT", &default_user_agent()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("herald-notify/{}", env!("CARGO_PKG_VERSION"))
}

// ── Secrets ───────────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Hex-encoded AES-256 key used to decrypt secure notifier settings.
    pub secret_key: Option<String>,
}

impl SecretsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            secret_key: profiled_env_opt(p, "SECRET_KEY"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
