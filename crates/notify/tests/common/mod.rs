//! Shared transports for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use herald_notify::error::TransportError;
use herald_notify::{Registry, Transport, TransportResponse, WebhookRequest};

/// Records every request and answers with a fixed response.
pub struct RecordingTransport {
    requests: Mutex<Vec<WebhookRequest>>,
    response: TransportResponse,
}

impl RecordingTransport {
    pub fn ok() -> Arc<Self> {
        Self::responding(200, r#"{"errcode":0,"errmsg":"ok"}"#)
    }

    pub fn responding(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            response: TransportResponse {
                status,
                body: body.to_string(),
            },
        })
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Body of the only recorded request, parsed as JSON.
    pub fn single_body(&self) -> serde_json::Value {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        serde_json::from_slice(&requests[0].body).unwrap()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: WebhookRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.response.clone())
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowTransport;

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, _request: WebhookRequest) -> Result<TransportResponse, TransportError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(TransportResponse {
            status: 200,
            body: String::new(),
        })
    }
}

pub fn registry(transport: Arc<dyn Transport>, timeout: Duration) -> Registry {
    Registry::with_defaults(transport, timeout)
}
