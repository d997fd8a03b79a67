// Common test utilities: an in-memory store and mock providers wired into
// a real `AppState`.
#![allow(dead_code)]

use message_push_service::config::{
    ExpoSettings, FcmSettings, RedisSettings, ServerSettings, ServiceSettings, Settings,
};
use message_push_service::expo_sender::{ExpoClient, MockExpoSender};
use message_push_service::fcm_sender::{FcmClient, MockFcmSender};
use message_push_service::models::{
    Chat, ChatType, Message, MessageCreatedEvent, UserProfile, UserSettings,
};
use message_push_service::state::AppState;
use message_push_service::store::MemoryStore;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Global counter for unique test IDs
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get a unique test ID for data isolation
pub fn get_unique_test_id() -> u64 {
    TEST_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Create a standard Redis URL (no database selection)
pub fn create_test_redis_url() -> String {
    let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
    let redis_port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
    format!("redis://{}:{}", redis_host, redis_port)
}

pub fn test_settings() -> Settings {
    Settings {
        redis: RedisSettings {
            url: create_test_redis_url(),
            connection_pool_size: 2,
        },
        fcm: FcmSettings {
            project_id: "test-project".to_string(),
            max_concurrent_sends: 8,
            send_timeout_secs: 2,
        },
        expo: ExpoSettings::default(),
        service: ServiceSettings::default(),
        server: ServerSettings {
            listen_addr: "127.0.0.1:0".to_string(),
        },
    }
}

pub struct TestHarness {
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub fcm: MockFcmSender,
    pub expo: MockExpoSender,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_expo(MockExpoSender::new(), Duration::from_secs(2))
    }

    pub fn with_expo(expo: MockExpoSender, chunk_timeout: Duration) -> Self {
        let store = MemoryStore::new();
        let fcm = MockFcmSender::new();
        let fcm_client = FcmClient::new_with_impl(Box::new(fcm.clone()));
        let expo_client = ExpoClient::new_with_impl(Box::new(expo.clone()), 100, chunk_timeout);

        let state = AppState::with_components(
            test_settings(),
            Arc::new(store.clone()),
            Arc::new(fcm_client),
            Arc::new(expo_client),
        );

        Self {
            state: Arc::new(state),
            store,
            fcm,
            expo,
        }
    }

    pub fn sent_fcm_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .fcm
            .get_sent_messages()
            .into_iter()
            .map(|(token, _)| token)
            .collect();
        tokens.sort();
        tokens
    }

    pub fn sent_expo_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .expo
            .get_chunks()
            .into_iter()
            .flatten()
            .map(|m| m.to)
            .collect();
        tokens.sort();
        tokens
    }
}

pub fn user(id: &str, name: &str, fcm_tokens: &[&str], expo_tokens: &[&str]) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        display_name: Some(name.to_string()),
        fcm_tokens: fcm_tokens.iter().map(|t| t.to_string()).collect(),
        expo_push_tokens: expo_tokens.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

pub fn with_settings(mut profile: UserProfile, settings: UserSettings) -> UserProfile {
    profile.settings = Some(settings);
    profile
}

pub fn chat(id: &str, chat_type: Option<ChatType>, participants: &[&str]) -> Chat {
    Chat {
        id: id.to_string(),
        chat_type,
        participants: participants.iter().map(|p| p.to_string()).collect(),
        ..Default::default()
    }
}

/// An event with a fresh message id.
pub fn message_event(chat_id: &str, sender_id: &str, text: &str) -> MessageCreatedEvent {
    let message_id = format!("msg-{}", get_unique_test_id());
    MessageCreatedEvent {
        chat_id: chat_id.to_string(),
        message_id: message_id.clone(),
        message: Message {
            id: message_id,
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            media_url: None,
            created_at: chrono::Utc::now(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_test_ids() {
        let id1 = get_unique_test_id();
        let id2 = get_unique_test_id();
        assert_ne!(id1, id2, "Test IDs should be unique");
    }

    #[test]
    fn test_message_events_get_distinct_ids() {
        let a = message_event("c", "u", "hi");
        let b = message_event("c", "u", "hi");
        assert_ne!(a.message_id, b.message_id);
    }
}
