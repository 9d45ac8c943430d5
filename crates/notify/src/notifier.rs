//! Notifier contract and the channel-backed implementation.
//!
//! A dispatch renders the payload, hands it to the transport and classifies
//! the outcome. Failures come back as a [`DeliveryResult`] value; nothing is
//! retried here, retry policy belongs to whoever schedules dispatches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use herald_core::{AlertState, EvaluationContext};
use tokio_util::sync::CancellationToken;

use crate::channels::{Channel, ChannelRenderer};
use crate::error::TransportError;
use crate::transport::{Transport, TransportResponse, WebhookRequest};

/// Immutable per-instance configuration, built once by the registry.
#[derive(Clone)]
pub struct NotifierConfig {
    pub uid: String,
    pub name: String,
    pub kind: String,
    /// Delivery URL exactly as configured.
    pub endpoint: String,
    pub disable_resolve_message: bool,
    pub decrypted_secrets: HashMap<String, String>,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret_fields: Vec<&String> = self.decrypted_secrets.keys().collect();
        f.debug_struct("NotifierConfig")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("disable_resolve_message", &self.disable_resolve_message)
            .field("secret_fields", &secret_fields)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Payload could not be rendered; nothing was sent.
    Render,
    /// Timeout, cancellation, connection failure or rejected delivery.
    Transport,
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeliveryResult {
    pub notifier: String,
    pub channel: String,
    pub success: bool,
    pub error_kind: Option<FailureKind>,
    pub detail: String,
    pub duration_ms: u64,
}

impl DeliveryResult {
    fn delivered(notifier: &str, channel: &str, started: Instant) -> Self {
        Self {
            notifier: notifier.to_string(),
            channel: channel.to_string(),
            success: true,
            error_kind: None,
            detail: String::new(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn failed(
        notifier: &str,
        channel: &str,
        kind: FailureKind,
        detail: impl Into<String>,
        started: Instant,
    ) -> Self {
        Self {
            notifier: notifier.to_string(),
            channel: channel.to_string(),
            success: false,
            error_kind: Some(kind),
            detail: detail.into(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Render and deliver one evaluation. Aborts promptly when `cancel`
    /// fires, reporting a transport failure.
    async fn dispatch(
        &self,
        ctx: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> DeliveryResult;

    /// Whether this state transition warrants a message at all.
    fn should_notify(&self, ctx: &EvaluationContext) -> bool;

    /// Configured instance name.
    fn name(&self) -> &str;

    /// Human-readable name for this channel (e.g., "webhook", "dingding").
    fn channel_name(&self) -> &str;

    /// Test connectivity with a sample alerting evaluation.
    async fn test(&self) -> DeliveryResult {
        let ctx = EvaluationContext::new(
            AlertState::Alerting,
            "Someone is testing the alert notification within herald.",
        )
        .with_rule(0, "Test notification");
        self.dispatch(&ctx, &CancellationToken::new()).await
    }
}

/// A configured channel plus the transport used to reach it.
pub struct ChannelNotifier {
    config: Arc<NotifierConfig>,
    channel: Channel,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ChannelNotifier {
    pub fn new(
        config: NotifierConfig,
        channel: Channel,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Self {
        Self {
            config: Arc::new(config),
            channel,
            transport,
            timeout,
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    async fn send(
        &self,
        request: WebhookRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            sent = tokio::time::timeout(self.timeout, self.transport.send(request)) => {
                sent.unwrap_or(Err(TransportError::Timeout))
            }
        }
    }
}

impl std::fmt::Debug for ChannelNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelNotifier")
            .field("config", &self.config)
            .field("channel", &self.channel)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Notifier for ChannelNotifier {
    async fn dispatch(
        &self,
        ctx: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> DeliveryResult {
        let started = Instant::now();
        let name = self.config.name.as_str();
        let channel = self.channel.channel_name();

        let payload = match self.channel.render(ctx) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(notifier = name, channel, error = %e, "payload rendering failed");
                return DeliveryResult::failed(
                    name,
                    channel,
                    FailureKind::Render,
                    e.to_string(),
                    started,
                );
            }
        };

        let request = WebhookRequest {
            url: self.channel.endpoint().to_string(),
            method: self.channel.method(),
            content_type: payload.content_type,
            body: payload.body,
            headers: Default::default(),
            basic_auth: self.channel.basic_auth(),
        };

        let outcome = match self.send(request, cancel).await {
            Ok(response) => self.channel.acknowledge(&response).map(|()| response.status),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(status) => {
                let result = DeliveryResult::delivered(name, channel, started);
                tracing::info!(
                    notifier = name,
                    channel,
                    status,
                    duration_ms = result.duration_ms,
                    "Notification delivered"
                );
                result
            }
            Err(detail) => {
                let result =
                    DeliveryResult::failed(name, channel, FailureKind::Transport, detail, started);
                tracing::warn!(
                    notifier = name,
                    channel,
                    error = %result.detail,
                    duration_ms = result.duration_ms,
                    "Notification delivery failed"
                );
                result
            }
        }
    }

    fn should_notify(&self, ctx: &EvaluationContext) -> bool {
        should_notify(ctx, self.config.disable_resolve_message)
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn channel_name(&self) -> &str {
        self.channel.channel_name()
    }
}

/// Notification policy shared by all channels.
pub fn should_notify(ctx: &EvaluationContext, disable_resolve_message: bool) -> bool {
    use AlertState::*;

    if ctx.state == ctx.previous_state {
        return false;
    }
    match (ctx.previous_state, ctx.state) {
        (_, Pending) => false,
        (Pending | Unknown, Ok) => false,
        (_, Ok) if disable_resolve_message => false,
        _ => true,
    }
}
