mod common;

use common::{create_test_redis_url, get_unique_test_id};
use message_push_service::models::{NotificationRecord, CHAT_MESSAGE_TYPE};
use message_push_service::redis_store::{self, RedisDocumentStore, USER_NOTIFICATIONS_SET_PREFIX};
use message_push_service::store::DocumentStore;
use std::time::Duration;

/// These tests need a live Redis; they pass vacuously when none is reachable.
async fn connect() -> Option<RedisDocumentStore> {
    let url = create_test_redis_url();
    let client = redis::Client::open(url.as_str()).ok()?;
    match tokio::time::timeout(
        Duration::from_secs(2),
        client.get_multiplexed_async_connection(),
    )
    .await
    {
        Ok(Ok(_)) => {}
        _ => {
            println!("Redis not reachable at {}, skipping", url);
            return None;
        }
    }
    let pool = redis_store::create_pool(&url, 2).await.ok()?;
    Some(RedisDocumentStore::new(pool))
}

async fn set_raw(store: &RedisDocumentStore, key: &str, value: &str) -> anyhow::Result<()> {
    let mut conn = store.pool().get().await?;
    redis::cmd("SET")
        .arg(key)
        .arg(value)
        .query_async::<()>(&mut *conn)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_reads_camel_case_documents() {
    let Some(store) = connect().await else { return };
    let id = get_unique_test_id();
    let chat_id = format!("redis-test-chat-{}", id);
    let user_id = format!("redis-test-user-{}", id);

    set_raw(
        &store,
        &format!("chats:{}", chat_id),
        r#"{"type":"group","participants":["a","b"],"circleId":"c1"}"#,
    )
    .await
    .unwrap();
    set_raw(
        &store,
        &format!("users:{}", user_id),
        r#"{"displayName":"Ada","fcmTokens":["t1"],"settings":{"msgSound":false}}"#,
    )
    .await
    .unwrap();

    let chat = store.get_chat(&chat_id).await.unwrap().unwrap();
    assert_eq!(chat.id, chat_id);
    assert_eq!(chat.circle_id.as_deref(), Some("c1"));

    let user = store.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.fcm_tokens, vec!["t1".to_string()]);
    assert_eq!(user.settings.unwrap().msg_sound, Some(false));

    assert!(store
        .get_circle(&format!("redis-test-missing-{}", id))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_batch_write_indexes_by_user() {
    let Some(store) = connect().await else { return };
    let id = get_unique_test_id();
    let uid = format!("redis-test-uid-{}-{}", id, uuid::Uuid::new_v4());

    let records: Vec<NotificationRecord> = (0..2)
        .map(|i| NotificationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            uid: uid.clone(),
            title: "Alice".to_string(),
            subtitle: format!("message {}", i),
            notification_type: CHAT_MESSAGE_TYPE.to_string(),
            chat_id: "dm-1".to_string(),
            sender_id: "alice".to_string(),
            sender_name: "Alice".to_string(),
            message_id: format!("m{}", i),
            avatar: String::new(),
            read: false,
            created_at: chrono::Utc::now(),
        })
        .collect();

    store.write_notifications(&records).await.unwrap();

    let mut conn = store.pool().get().await.unwrap();
    let members: Vec<String> = redis::cmd("SMEMBERS")
        .arg(format!("{}{}", USER_NOTIFICATIONS_SET_PREFIX, uid))
        .query_async(&mut *conn)
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&records[0].id));
}

#[tokio::test]
async fn test_claim_message_is_exclusive() {
    let Some(store) = connect().await else { return };
    let message_id = format!("redis-test-msg-{}", uuid::Uuid::new_v4());

    assert!(store.claim_message(&message_id, 60).await.unwrap());
    assert!(!store.claim_message(&message_id, 60).await.unwrap());
}
