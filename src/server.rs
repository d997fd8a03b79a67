use crate::error::{Result, ServiceError};
use crate::models::MessageCreatedEvent;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Queues a "message created" event for the trigger. The response does not
/// wait for notifications to be sent.
pub async fn enqueue_message_event(
    State(event_tx): State<Sender<MessageCreatedEvent>>,
    Json(event): Json<MessageCreatedEvent>,
) -> Result<(StatusCode, Json<Value>)> {
    let message_id = event.message_id.clone();
    event_tx
        .send(event)
        .await
        .map_err(|_| ServiceError::QueueClosed)?;

    tracing::debug!(message_id = %message_id, "Queued message event");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "queued": true, "messageId": message_id })),
    ))
}

pub fn router(event_tx: Sender<MessageCreatedEvent>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events/message-created", post(enqueue_message_event))
        .with_state(event_tx)
}

pub async fn run_server(
    listen_addr: &str,
    event_tx: Sender<MessageCreatedEvent>,
    token: CancellationToken,
) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(
                "Invalid server.listen_addr '{}': {}. Exiting server task.",
                listen_addr,
                e
            );
            token.cancel();
            return;
        }
    };

    tracing::info!("HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server: {}", e);
            token.cancel();
            return;
        }
    };

    let shutdown_token = token.clone();
    if let Err(e) = axum::serve(listener, router(event_tx))
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
            tracing::info!("HTTP server shutting down.");
        })
        .await
    {
        tracing::error!("HTTP server error: {}", e);
        token.cancel();
    }
}
