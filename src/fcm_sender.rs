use crate::{
    config::{FcmSettings, DEFAULT_FCM_MAX_CONCURRENT_SENDS},
    error::Result,
    models::FcmPayload,
};
use async_trait::async_trait;
use firebase_messaging_rs::{
    fcm::{FCMApi, FCMError as FirebaseFCMError, Message, Notification},
    FCMClient as FirebaseClient,
};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

/// Environment variable holding a base64-encoded service account JSON.
pub const CREDENTIALS_BASE64_ENV: &str = "MESSAGE_PUSH__FCM__CREDENTIALS_BASE64";

#[derive(Error, Debug, Clone)]
pub enum FcmError {
    #[error("Initialization error: {0}")]
    Initialization(String),
    #[error("FCM internal request error: {0}")]
    InternalRequest(String),
    #[error("FCM internal response error: {0}")]
    InternalResponse(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("FCM indicated token is not registered or invalid")]
    TokenNotRegistered,
    #[error("Retryable internal error. Retry after: {0:?}")]
    RetryableInternal(Duration),
    #[error("FCM internal error")]
    InternalError,
    #[error("FCM send timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unknown FCM error: code={code}, hint={hint:?}")]
    Unknown { code: u16, hint: Option<String> },
}

impl From<FirebaseFCMError> for FcmError {
    fn from(err: FirebaseFCMError) -> Self {
        match err {
            FirebaseFCMError::InternalRequestError { reason } => FcmError::InternalRequest(reason),
            FirebaseFCMError::InternalResponseError { reason } => {
                FcmError::InternalResponse(reason)
            }
            FirebaseFCMError::Unauthorized(reason) => FcmError::Unauthorized(reason),
            FirebaseFCMError::InvalidRequestDescriptive { reason } => {
                if reason.contains("invalid registration token")
                    || reason.contains("BadDeviceToken")
                    || reason.to_lowercase().contains("unregistered")
                    || reason.to_lowercase().contains("not registered")
                {
                    FcmError::TokenNotRegistered
                } else {
                    FcmError::InvalidRequest(reason)
                }
            }
            FirebaseFCMError::InvalidRequest => {
                FcmError::InvalidRequest("Unknown invalid request".to_string())
            }
            FirebaseFCMError::RetryableInternal { retry_after } => {
                FcmError::RetryableInternal(retry_after)
            }
            FirebaseFCMError::Internal => FcmError::InternalError,
            FirebaseFCMError::Unknown { code, hint } => FcmError::Unknown { code, hint },
        }
    }
}

pub(crate) fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(8) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}

#[async_trait]
pub trait FcmSend: Send + Sync {
    async fn send_single(
        &self,
        token: &str,
        payload: FcmPayload,
    ) -> std::result::Result<(), FcmError>;
}

struct RealFcmClient {
    client: FirebaseClient,
}

impl RealFcmClient {
    fn new() -> Result<Self, FcmError> {
        // FirebaseClient::new needs its own runtime; the caller may already be
        // inside one.
        let client_result = std::thread::spawn(move || -> Result<FirebaseClient, String> {
            let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
            rt.block_on(async { FirebaseClient::new().await })
                .map_err(|e| e.to_string())
        })
        .join()
        .map_err(|_| FcmError::Initialization("FCM initialization thread panicked".to_string()))?;

        let client = client_result.map_err(|e| {
            FcmError::Initialization(format!("Failed to initialize FirebaseClient: {}", e))
        })?;

        Ok(RealFcmClient { client })
    }
}

/// Reads a platform override into the type `Message::Token` expects for it.
/// A malformed override is logged and left out rather than failing the send.
fn platform_config<T: DeserializeOwned>(
    token: &str,
    platform: &str,
    value: Option<serde_json::Value>,
) -> Option<T> {
    let value = value?;
    match serde_json::from_value(value) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(
                "Dropping malformed {} override for token prefix {}: {}",
                platform,
                token_prefix(token),
                e
            );
            None
        }
    }
}

/// Converts our payload into the message sent to Firebase, including the
/// Android channel and APNs category/sound overrides.
pub(crate) fn to_firebase_message(token: &str, payload: FcmPayload) -> Message {
    let notification = payload.notification.map(|notif| Notification {
        title: notif.title,
        body: notif.body,
        image: None,
    });

    Message::Token {
        token: token.to_string(),
        name: None,
        notification,
        data: payload.data,
        android: platform_config(token, "android", payload.android),
        apns: platform_config(token, "apns", payload.apns),
        webpush: platform_config(token, "webpush", payload.webpush),
        fcm_options: None,
    }
}

#[async_trait]
impl FcmSend for RealFcmClient {
    async fn send_single(
        &self,
        token: &str,
        payload: FcmPayload,
    ) -> std::result::Result<(), FcmError> {
        let message = to_firebase_message(token, payload);

        match self.client.send(&message).await {
            Ok(_response) => {
                tracing::debug!("FCM send successful for token prefix {}", token_prefix(token));
                Ok(())
            }
            Err(firebase_err) => {
                let custom_error = FcmError::from(firebase_err);
                tracing::warn!(
                    "FCM send failed for token prefix {}: {:?}",
                    token_prefix(token),
                    custom_error
                );
                Err(custom_error)
            }
        }
    }
}

/// Provider A client. Built once at startup and shared through `AppState`.
pub struct FcmClient {
    client: Box<dyn FcmSend>,
    max_in_flight: usize,
    send_timeout: Duration,
}

impl FcmClient {
    pub fn new(settings: &FcmSettings) -> Result<Self, FcmError> {
        if let Ok(credentials_base64) = std::env::var(CREDENTIALS_BASE64_ENV) {
            if !credentials_base64.is_empty() {
                write_credentials_file(&credentials_base64)?;
            }
        }

        if std::env::var("GOOGLE_CLOUD_PROJECT").is_err() {
            if !settings.project_id.is_empty() {
                tracing::debug!(
                    "Setting GOOGLE_CLOUD_PROJECT env var to: {}",
                    &settings.project_id
                );
                std::env::set_var("GOOGLE_CLOUD_PROJECT", &settings.project_id);
            } else {
                tracing::warn!(
                    "GOOGLE_CLOUD_PROJECT env var not set and fcm.project_id is empty. FCM initialization might fail."
                );
            }
        } else {
            tracing::debug!("GOOGLE_CLOUD_PROJECT env var already set.");
        }

        let real_client = RealFcmClient::new()?;
        Ok(FcmClient::new_with_impl(Box::new(real_client)).with_limits(
            settings.max_concurrent_sends,
            Duration::from_secs(settings.send_timeout_secs),
        ))
    }

    pub fn new_with_impl(client_impl: Box<dyn FcmSend>) -> Self {
        FcmClient {
            client: client_impl,
            max_in_flight: DEFAULT_FCM_MAX_CONCURRENT_SENDS,
            send_timeout: Duration::from_secs(10),
        }
    }

    /// Caps concurrent sends per batch and the time allowed for each send.
    pub fn with_limits(mut self, max_in_flight: usize, send_timeout: Duration) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self.send_timeout = send_timeout;
        self
    }

    /// Sends every `(token, payload)` pair as one batch, at most
    /// `max_in_flight` at a time. Individual failures and timeouts are
    /// returned per token and never abort the rest of the batch.
    pub async fn send_batch(
        &self,
        messages: &[(String, FcmPayload)],
    ) -> HashMap<String, std::result::Result<(), FcmError>> {
        stream::iter(messages)
            .map(|(token, payload)| async move {
                let result = tokio::time::timeout(
                    self.send_timeout,
                    self.client.send_single(token, payload.clone()),
                )
                .await
                .unwrap_or(Err(FcmError::Timeout(self.send_timeout)));
                (token.clone(), result)
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await
    }

    pub async fn send_single(
        &self,
        token: &str,
        payload: FcmPayload,
    ) -> std::result::Result<(), FcmError> {
        self.client.send_single(token, payload).await
    }
}

fn write_credentials_file(credentials_base64: &str) -> Result<(), FcmError> {
    use base64::Engine;

    let credentials_json = base64::engine::general_purpose::STANDARD
        .decode(credentials_base64)
        .map_err(|e| {
            tracing::error!("Failed to decode base64 Firebase credentials: {}", e);
            FcmError::Initialization(format!("Failed to decode credentials: {}", e))
        })?;

    let creds_path = std::env::temp_dir().join("firebase-service-account.json");
    std::fs::write(&creds_path, credentials_json).map_err(|e| {
        tracing::error!("Failed to write Firebase credentials to temp file: {}", e);
        FcmError::Initialization(format!("Failed to write credentials: {}", e))
    })?;

    tracing::info!("Wrote Firebase credentials to temporary file: {:?}", creds_path);
    std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", &creds_path);
    Ok(())
}

/// Records sends instead of talking to Firebase. Clones share state.
#[derive(Clone, Default)]
pub struct MockFcmSender {
    sent_messages: Arc<Mutex<Vec<(String, FcmPayload)>>>,
    error_tokens: Arc<Mutex<HashMap<String, FcmError>>>,
}

impl MockFcmSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_sent_messages(&self) -> Vec<(String, FcmPayload)> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn set_error_for_token(&self, token: &str, error: FcmError) {
        self.error_tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), error);
    }

    pub fn clear(&self) {
        self.sent_messages.lock().unwrap().clear();
        self.error_tokens.lock().unwrap().clear();
    }
}

#[async_trait]
impl FcmSend for MockFcmSender {
    async fn send_single(
        &self,
        token: &str,
        payload: FcmPayload,
    ) -> std::result::Result<(), FcmError> {
        if let Some(error) = self.error_tokens.lock().unwrap().get(token) {
            tracing::warn!(
                "MockFcmSender: Simulating error {:?} for token prefix {}",
                error,
                token_prefix(token)
            );
            return Err(error.clone());
        }

        tracing::info!(
            "MockFcmSender: Recording send for token prefix {}...",
            token_prefix(token)
        );
        self.sent_messages
            .lock()
            .unwrap()
            .push((token.to_string(), payload));
        Ok(())
    }
}
