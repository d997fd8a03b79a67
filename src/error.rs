use crate::expo_sender::ExpoError;
use crate::fcm_sender::FcmError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use redis::RedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("FCM error: {0}")]
    Fcm(#[from] FcmError),

    #[error("Expo push error: {0}")]
    Expo(#[from] ExpoError),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Event queue is closed")]
    QueueClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::Redis(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Redis error: {}", e),
            ),
            ServiceError::Fcm(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("FCM error: {}", e),
            ),
            ServiceError::Expo(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Expo push error: {}", e),
            ),
            ServiceError::SerdeJson(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
            ServiceError::QueueClosed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Event queue is closed".to_string(),
            ),
            ServiceError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({ "error": error_message }));
        (status, body).into_response()
    }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
