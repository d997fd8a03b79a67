use crate::{
    config::{ExpoSettings, DEFAULT_EXPO_CHUNK_SIZE},
    fcm_sender::token_prefix,
    models::ExpoMessage,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone)]
pub enum ExpoError {
    #[error("Initialization error: {0}")]
    Initialization(String),
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("Expo returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed Expo response: {0}")]
    Response(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Push ticket returned per message. `status` is `ok` or `error`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ExpoTicket {
    pub status: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl ExpoTicket {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            id: None,
            message: None,
            details: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

#[derive(Debug, Deserialize)]
struct ExpoPushResponse {
    #[serde(default)]
    data: Vec<ExpoTicket>,
}

/// Sends one chunk (at most the provider's batch limit) of messages.
#[async_trait]
pub trait ExpoSend: Send + Sync {
    async fn send_chunk(&self, messages: &[ExpoMessage]) -> Result<Vec<ExpoTicket>, ExpoError>;
}

struct HttpExpoSender {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpExpoSender {
    fn new(settings: &ExpoSettings) -> Result<Self, ExpoError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| ExpoError::Initialization(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            access_token: settings.access_token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl ExpoSend for HttpExpoSender {
    async fn send_chunk(&self, messages: &[ExpoMessage]) -> Result<Vec<ExpoTicket>, ExpoError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(messages);
        if let Some(token) = &self.access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExpoError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExpoError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ExpoPushResponse = response
            .json()
            .await
            .map_err(|e| ExpoError::Response(e.to_string()))?;
        Ok(parsed.data)
    }
}

/// Outcome of one `send_all` run, for logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpoSendSummary {
    pub attempted: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    /// Tickets returned across all successful chunks.
    pub sent: usize,
    pub ticket_errors: usize,
}

/// Provider B client. Built once at startup and shared through `AppState`.
pub struct ExpoClient {
    sender: Box<dyn ExpoSend>,
    chunk_size: usize,
    chunk_timeout: Duration,
}

impl ExpoClient {
    pub fn new(settings: &ExpoSettings) -> Result<Self, ExpoError> {
        let sender = HttpExpoSender::new(settings)?;
        Ok(Self::new_with_impl(
            Box::new(sender),
            settings.chunk_size,
            Duration::from_secs(settings.request_timeout_secs),
        ))
    }

    /// `chunk_size` is capped at Expo's per-request limit.
    pub fn new_with_impl(
        sender: Box<dyn ExpoSend>,
        chunk_size: usize,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            sender,
            chunk_size: chunk_size.clamp(1, DEFAULT_EXPO_CHUNK_SIZE),
            chunk_timeout,
        }
    }

    /// Posts `messages` in chunks. A failed or timed out chunk is logged and
    /// the remaining chunks are still sent.
    pub async fn send_all(&self, messages: &[ExpoMessage]) -> ExpoSendSummary {
        let mut summary = ExpoSendSummary {
            attempted: messages.len(),
            ..Default::default()
        };

        for (index, chunk) in messages.chunks(self.chunk_size).enumerate() {
            summary.chunks += 1;
            let result = tokio::time::timeout(self.chunk_timeout, self.sender.send_chunk(chunk))
                .await
                .unwrap_or(Err(ExpoError::Timeout(self.chunk_timeout)));

            match result {
                Ok(tickets) => {
                    let errors: Vec<&ExpoTicket> = tickets.iter().filter(|t| t.is_error()).collect();
                    for ticket in &errors {
                        debug!(
                            chunk = index,
                            message = ?ticket.message,
                            details = ?ticket.details,
                            "Expo rejected a message"
                        );
                    }
                    summary.sent += tickets.len();
                    summary.ticket_errors += errors.len();
                }
                Err(e) => {
                    summary.failed_chunks += 1;
                    error!(
                        chunk = index,
                        size = chunk.len(),
                        first_token = token_prefix(&chunk[0].to),
                        error = %e,
                        "Expo push chunk failed"
                    );
                }
            }
        }

        if summary.ticket_errors > 0 {
            warn!(errors = summary.ticket_errors, "Expo returned error tickets");
        }
        info!(
            sent = summary.sent,
            attempted = summary.attempted,
            chunks = summary.chunks,
            failed_chunks = summary.failed_chunks,
            "Expo push dispatch finished"
        );
        summary
    }
}

#[derive(Default)]
struct MockExpoInner {
    chunks: Vec<Vec<ExpoMessage>>,
    failing_calls: Vec<usize>,
    calls: usize,
}

/// Records every chunk it is asked to send. Clones share state.
#[derive(Clone, Default)]
pub struct MockExpoSender {
    inner: Arc<Mutex<MockExpoInner>>,
    delay: Option<Duration>,
}

impl MockExpoSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// The `call_index`-th call (zero based) fails with a request error.
    pub fn fail_call(&self, call_index: usize) {
        self.inner.lock().unwrap().failing_calls.push(call_index);
    }

    /// Every chunk received, including the ones that were made to fail.
    pub fn get_chunks(&self) -> Vec<Vec<ExpoMessage>> {
        self.inner.lock().unwrap().chunks.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

#[async_trait]
impl ExpoSend for MockExpoSender {
    async fn send_chunk(&self, messages: &[ExpoMessage]) -> Result<Vec<ExpoTicket>, ExpoError> {
        let should_fail = {
            let mut inner = self.inner.lock().unwrap();
            let call = inner.calls;
            inner.calls += 1;
            inner.chunks.push(messages.to_vec());
            inner.failing_calls.contains(&call)
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if should_fail {
            return Err(ExpoError::Request("simulated connection reset".to_string()));
        }
        Ok(messages.iter().map(|_| ExpoTicket::ok()).collect())
    }
}
