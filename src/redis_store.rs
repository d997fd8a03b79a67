use crate::error::{Result, ServiceError};
use crate::models::{Chat, Circle, NotificationRecord, UserProfile};
use crate::store::DocumentStore;
use async_trait::async_trait;
use bb8_redis::bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::Value;
use serde::de::DeserializeOwned;
use std::time::Duration;

// Type alias for the connection pool
pub type RedisPool = Pool<RedisConnectionManager>;

// Key prefixes; each document is stored as a JSON string.
pub const CHAT_KEY_PREFIX: &str = "chats:";
pub const USER_KEY_PREFIX: &str = "users:";
pub const CIRCLE_KEY_PREFIX: &str = "circles:";
pub const NOTIFICATION_KEY_PREFIX: &str = "notifications:";
pub const USER_NOTIFICATIONS_SET_PREFIX: &str = "user_notifications:";
const PROCESSED_MESSAGE_PREFIX: &str = "processed_messages:";

/// Creates a new Redis connection pool.
pub async fn create_pool(redis_url: &str, pool_size: u32) -> Result<RedisPool> {
    let manager = RedisConnectionManager::new(redis_url).map_err(ServiceError::Redis)?;
    Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(15))
        .build(manager)
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to build Redis pool: {}", e)))
}

async fn get_json<T: DeserializeOwned>(pool: &RedisPool, key: &str) -> Result<Option<T>> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to get Redis connection: {}", e)))?;

    let raw: Option<String> = redis::cmd("GET")
        .arg(key)
        .query_async(&mut *conn)
        .await
        .map_err(ServiceError::Redis)?;

    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(ServiceError::SerdeJson)
}

pub async fn get_chat(pool: &RedisPool, chat_id: &str) -> Result<Option<Chat>> {
    let chat: Option<Chat> = get_json(pool, &format!("{}{}", CHAT_KEY_PREFIX, chat_id)).await?;
    Ok(chat.map(|mut chat| {
        chat.id = chat_id.to_string();
        chat
    }))
}

pub async fn get_user(pool: &RedisPool, user_id: &str) -> Result<Option<UserProfile>> {
    let user: Option<UserProfile> =
        get_json(pool, &format!("{}{}", USER_KEY_PREFIX, user_id)).await?;
    Ok(user.map(|mut user| {
        user.id = user_id.to_string();
        user
    }))
}

pub async fn get_circle(pool: &RedisPool, circle_id: &str) -> Result<Option<Circle>> {
    let circle: Option<Circle> =
        get_json(pool, &format!("{}{}", CIRCLE_KEY_PREFIX, circle_id)).await?;
    Ok(circle.map(|mut circle| {
        circle.id = circle_id.to_string();
        circle
    }))
}

/// Writes every notification document and its per-user index entry in one
/// MULTI/EXEC transaction.
pub async fn write_notifications(pool: &RedisPool, records: &[NotificationRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut pipe = redis::pipe();
    pipe.atomic();
    for record in records {
        let json = serde_json::to_string(record)?;
        pipe.set(format!("{}{}", NOTIFICATION_KEY_PREFIX, record.id), json)
            .ignore()
            .sadd(
                format!("{}{}", USER_NOTIFICATIONS_SET_PREFIX, record.uid),
                &record.id,
            )
            .ignore();
    }

    let mut conn = pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to get Redis connection: {}", e)))?;

    pipe.query_async::<Value>(&mut *conn)
        .await
        .map(|_| ())
        .map_err(ServiceError::Redis)
}

/// `SET NX EX` on a per-message key. Returns true for the first caller only.
pub async fn claim_message(pool: &RedisPool, message_id: &str, ttl_seconds: u64) -> Result<bool> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(format!("Failed to get Redis connection: {}", e)))?;

    let reply: Option<String> = redis::cmd("SET")
        .arg(format!("{}{}", PROCESSED_MESSAGE_PREFIX, message_id))
        .arg(1)
        .arg("NX")
        .arg("EX")
        .arg(ttl_seconds.max(1))
        .query_async(&mut *conn)
        .await
        .map_err(ServiceError::Redis)?;

    Ok(reply.is_some())
}

/// `DocumentStore` backed by the shared Redis pool.
#[derive(Clone)]
pub struct RedisDocumentStore {
    pool: RedisPool,
}

impl RedisDocumentStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        get_chat(&self.pool, chat_id).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        get_user(&self.pool, user_id).await
    }

    async fn get_circle(&self, circle_id: &str) -> Result<Option<Circle>> {
        get_circle(&self.pool, circle_id).await
    }

    async fn write_notifications(&self, records: &[NotificationRecord]) -> Result<()> {
        write_notifications(&self.pool, records).await
    }

    async fn claim_message(&self, message_id: &str, ttl_secs: u64) -> Result<bool> {
        claim_message(&self.pool, message_id, ttl_secs).await
    }
}
