//! Document store seam.
//!
//! The pipeline only needs a handful of keyed reads, one batched insert and a
//! redelivery guard, so the store is expressed as a small trait. The Redis
//! backend lives in [`crate::redis_store`]; [`MemoryStore`] backs tests and
//! local runs.

use crate::error::{Result, ServiceError};
use crate::models::{Chat, Circle, NotificationRecord, UserProfile};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `chats/{chat_id}`. `Ok(None)` when the document does not exist.
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>>;

    /// `users/{user_id}`.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// `circles/{circle_id}`.
    async fn get_circle(&self, circle_id: &str) -> Result<Option<Circle>>;

    /// Inserts every record or none of them.
    async fn write_notifications(&self, records: &[NotificationRecord]) -> Result<()>;

    /// Records that `message_id` is being handled. Returns `false` when an
    /// earlier delivery of the same event already claimed it.
    async fn claim_message(&self, message_id: &str, ttl_secs: u64) -> Result<bool>;
}

#[derive(Default)]
struct MemoryInner {
    chats: HashMap<String, Chat>,
    users: HashMap<String, UserProfile>,
    circles: HashMap<String, Circle>,
    notifications: Vec<NotificationRecord>,
    write_batches: usize,
    claimed: HashSet<String>,
    fail_writes: bool,
    fail_circle_reads: bool,
}

/// In-memory store. Clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chat(&self, chat: Chat) {
        self.inner.lock().unwrap().chats.insert(chat.id.clone(), chat);
    }

    pub fn insert_user(&self, user: UserProfile) {
        self.inner.lock().unwrap().users.insert(user.id.clone(), user);
    }

    pub fn insert_circle(&self, circle: Circle) {
        self.inner
            .lock()
            .unwrap()
            .circles
            .insert(circle.id.clone(), circle);
    }

    /// Makes every subsequent `write_notifications` call fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    /// Makes every subsequent `get_circle` call fail.
    pub fn set_fail_circle_reads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_circle_reads = fail;
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.inner.lock().unwrap().notifications.clone()
    }

    /// Number of successful `write_notifications` calls.
    pub fn write_batches(&self) -> usize {
        self.inner.lock().unwrap().write_batches
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        Ok(self.inner.lock().unwrap().chats.get(chat_id).cloned())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.inner.lock().unwrap().users.get(user_id).cloned())
    }

    async fn get_circle(&self, circle_id: &str) -> Result<Option<Circle>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_circle_reads {
            return Err(ServiceError::Internal("circle read failed".to_string()));
        }
        Ok(inner.circles.get(circle_id).cloned())
    }

    async fn write_notifications(&self, records: &[NotificationRecord]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(ServiceError::Internal(
                "notification batch write failed".to_string(),
            ));
        }
        inner.notifications.extend_from_slice(records);
        inner.write_batches += 1;
        Ok(())
    }

    async fn claim_message(&self, message_id: &str, _ttl_secs: u64) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .claimed
            .insert(message_id.to_string()))
    }
}
