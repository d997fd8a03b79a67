//! In-app notification records.

use crate::models::{NotificationRecord, CHAT_MESSAGE_TYPE};
use crate::payload::{build_body, MessageContext};
use crate::preferences::Recipient;
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

pub fn build_record(
    recipient: &Recipient,
    ctx: &MessageContext,
    created_at: DateTime<Utc>,
) -> NotificationRecord {
    NotificationRecord {
        id: Uuid::new_v4().to_string(),
        uid: recipient.uid.clone(),
        title: ctx.title(),
        subtitle: build_body(&recipient.preferences, ctx.is_group, &ctx.sender.name, &ctx.text),
        notification_type: CHAT_MESSAGE_TYPE.to_string(),
        chat_id: ctx.chat_id.clone(),
        sender_id: ctx.sender.id.clone(),
        sender_name: ctx.sender.name.clone(),
        message_id: ctx.message_id.clone(),
        avatar: ctx.avatar(),
        read: false,
        created_at,
    }
}

/// Persists all records as one batch. A failure is logged and reported
/// through the return value only; push dispatch does not depend on it.
pub async fn write_notifications(
    store: &dyn DocumentStore,
    chat_id: &str,
    records: &[NotificationRecord],
) -> bool {
    if records.is_empty() {
        return true;
    }

    match store.write_notifications(records).await {
        Ok(()) => {
            info!(chat_id = %chat_id, count = records.len(), "Wrote in-app notifications");
            true
        }
        Err(e) => {
            error!(chat_id = %chat_id, count = records.len(), error = %e, "Failed to write in-app notifications");
            false
        }
    }
}
