use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::EnvFilter;

use message_push_service::config;
use message_push_service::event_handler;
use message_push_service::models::MessageCreatedEvent;
use message_push_service::server;
use message_push_service::state;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting Message Push Service...");

    let settings = config::Settings::new()?;
    tracing::info!("Configuration loaded successfully");

    let app_state = Arc::new(state::AppState::new(settings).await?);
    tracing::info!("Application state initialized (Redis Pool, FCM Client, Expo Client)");

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<MessageCreatedEvent>(
        app_state.settings.service.event_queue_size.max(1),
    );

    let state_event = Arc::clone(&app_state);
    let token_event = token.clone();
    tracker.spawn(async move {
        if let Err(e) = event_handler::run(state_event, event_rx, token_event).await {
            tracing::error!("Event handler failed: {}", e);
        }
        tracing::info!("Event handler task finished.");
    });
    tracing::info!("Event handler started");

    let token_server = token.clone();
    let listen_addr = app_state.settings.server.listen_addr.clone();
    tracker.spawn(async move {
        server::run_server(&listen_addr, event_tx, token_server).await;
        tracing::info!("HTTP server task finished.");
    });
    tracing::info!("HTTP server started");

    let token_cancelled = token.child_token();

    // Wait for either Ctrl+C or cancellation token (from HTTP server failure)
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        _ = token_cancelled.cancelled() => {
            tracing::info!("Shutdown triggered by task failure");
        }
    }

    tracing::info!("Shutting down services...");

    token.cancel();

    tracker.close();
    tracker.wait().await;

    tracing::info!("Message Push Service stopped.");
    Ok(())
}
