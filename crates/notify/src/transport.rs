//! Outbound delivery capability.
//!
//! Notifiers depend only on the [`Transport`] trait. [`HttpTransport`] is the
//! reqwest-backed implementation used in production.

use std::collections::BTreeMap;

use herald_core::config::DispatchConfig;

use crate::error::TransportError;

/// HTTP method used for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

/// One HTTP request to deliver a rendered payload.
#[derive(Clone, PartialEq)]
pub struct WebhookRequest {
    /// Endpoint URL; may embed credentials, so it is never logged.
    pub url: String,
    pub method: HttpMethod,
    /// Value of the `Content-Type` header.
    pub content_type: String,
    pub body: Vec<u8>,
    /// Extra headers sent verbatim.
    pub headers: BTreeMap<String, String>,
    /// `(user, password)` for HTTP basic auth.
    pub basic_auth: Option<(String, String)>,
}

impl std::fmt::Debug for WebhookRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookRequest")
            .field("method", &self.method)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// What the remote endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and returns the raw response. Non-2xx statuses are
/// returned as `Ok`; classifying them is the notifier's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WebhookRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with a shared connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Client with the configured user agent and request timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Request` if the TLS backend fails to
    /// initialize.
    pub fn new(config: &DispatchConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client, e.g. one shared with other components.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WebhookRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .header(reqwest::header::CONTENT_TYPE, request.content_type.as_str())
            .body(request.body);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if let Some((user, password)) = &request.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        Ok(TransportResponse { status, body })
    }
}
