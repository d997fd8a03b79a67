//! message_push_service Library Crate

// Declare modules as public to be accessible from the binary crate and integration tests
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event_handler;
pub mod expo_sender;
pub mod fcm_sender;
pub mod models;
pub mod notifications;
pub mod payload;
pub mod preferences;
pub mod redis_store;
pub mod server;
pub mod state;
pub mod store;
pub mod tokens;
