//! notify-send — build a notifier from a settings file and deliver one alert.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use herald_core::config::load_dotenv;
use herald_core::{Config, EvaluationContext};
use herald_notify::{
    AesGcmDecryptor, Decryptor, HttpTransport, Notifier, NotifierSettings, PlaintextDecryptor,
    Registry, SecretResolver,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Deliver alert notifications from the command line.
#[derive(Parser, Debug)]
#[command(name = "notify-send", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a notifier and dispatch an evaluation through it.
    Send {
        /// Notifier settings JSON (name, type, settings, secureSettings).
        #[arg(long)]
        settings: PathBuf,

        /// Evaluation context JSON. Omit to send a test notification.
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Encrypt a value for use in `secureSettings` (requires SECRET_KEY).
    Encrypt {
        #[arg(long)]
        value: String,
    },

    /// List the registered notifier types.
    Types,
}

// ── helpers ─────────────────────────────────────────────────────────

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn decryptor(config: &Config) -> anyhow::Result<Arc<dyn Decryptor>> {
    match &config.secrets.secret_key {
        Some(key) => Ok(Arc::new(
            AesGcmDecryptor::from_hex(key).context("SECRET_KEY is not a valid AES-256 key")?,
        )),
        None => {
            tracing::warn!("SECRET_KEY not set, secure settings are read as plaintext");
            Ok(Arc::new(PlaintextDecryptor))
        }
    }
}

fn registry(config: &Config) -> anyhow::Result<Registry> {
    let transport = HttpTransport::new(&config.dispatch)?;
    Ok(Registry::with_defaults(
        Arc::new(transport),
        config.dispatch.timeout(),
    ))
}

async fn send(config: &Config, settings: &Path, context: Option<&Path>) -> anyhow::Result<bool> {
    let raw: NotifierSettings = read_json(settings)?;
    let resolver = SecretResolver::new(decryptor(config)?);
    let notifier = registry(config)?
        .build_from(&raw, &resolver)
        .with_context(|| format!("failed to build notifier '{}'", raw.name))?;

    let result = match context {
        Some(path) => {
            let ctx: EvaluationContext = read_json(path)?;
            if !notifier.should_notify(&ctx) {
                info!(
                    state = %ctx.state,
                    previous_state = %ctx.previous_state,
                    "transition does not notify, skipping"
                );
                return Ok(true);
            }

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });
            notifier.dispatch(&ctx, &cancel).await
        }
        None => notifier.test().await,
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.success)
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let cli = Cli::parse();

    match cli.command {
        Command::Send { settings, context } => {
            if !send(&config, &settings, context.as_deref()).await? {
                std::process::exit(1);
            }
        }
        Command::Encrypt { value } => {
            let key = config
                .secrets
                .secret_key
                .as_deref()
                .context("SECRET_KEY must be set to encrypt values")?;
            let cipher = AesGcmDecryptor::from_hex(key)?;
            println!("{}", cipher.encrypt(&value)?);
        }
        Command::Types => {
            let registry = registry(&config)?;
            println!("{}", serde_json::to_string_pretty(&registry.descriptors())?);
        }
    }

    Ok(())
}
