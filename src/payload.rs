//! Push payload construction for both providers.
//!
//! Channel and sound identifiers are a contract with the mobile client: the
//! app registers an Android channel named `default` (with sound) and one
//! named `silent`, and an iOS category `chat-message-actions`.

use crate::models::{
    Chat, ExpoMessage, FcmNotification, FcmPayload, UserProfile, CHAT_MESSAGE_CATEGORY,
    CHAT_MESSAGE_TYPE,
};
use crate::preferences::NotificationPreferences;
use crate::store::DocumentStore;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

pub const NEW_MESSAGE_TEXT: &str = "New message";
pub const DEFAULT_CHANNEL_ID: &str = "default";
pub const SILENT_CHANNEL_ID: &str = "silent";
pub const DEFAULT_SOUND: &str = "default";

const UNKNOWN_SENDER_NAME: &str = "Someone";
const UNNAMED_GROUP: &str = "Group chat";

#[derive(Debug, Clone, PartialEq)]
pub struct SenderDisplay {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

impl SenderDisplay {
    pub fn from_profile(sender_id: &str, profile: Option<&UserProfile>) -> Self {
        Self {
            id: sender_id.to_string(),
            name: profile
                .and_then(|p| non_blank(p.display_name.as_deref()))
                .unwrap_or(UNKNOWN_SENDER_NAME)
                .to_string(),
            avatar: profile
                .and_then(|p| p.avatar.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatDisplay {
    pub name: String,
    pub avatar: String,
}

/// Everything about one message that does not vary per recipient.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub chat_id: String,
    pub message_id: String,
    pub text: String,
    pub is_group: bool,
    pub sender: SenderDisplay,
    pub chat: ChatDisplay,
}

impl MessageContext {
    pub fn title(&self) -> String {
        if self.is_group {
            self.chat.name.clone()
        } else {
            self.sender.name.clone()
        }
    }

    /// Avatar shown next to the in-app notification.
    pub fn avatar(&self) -> String {
        if self.is_group {
            self.chat.avatar.clone()
        } else {
            self.sender.avatar.clone()
        }
    }

    /// Routing data read by the client when the notification is tapped.
    pub fn data(&self) -> HashMap<String, String> {
        let mut data = HashMap::new();
        data.insert("chatId".to_string(), self.chat_id.clone());
        // Older app builds route on conversationId.
        data.insert("conversationId".to_string(), self.chat_id.clone());
        data.insert("messageId".to_string(), self.message_id.clone());
        data.insert("senderId".to_string(), self.sender.id.clone());
        data.insert("senderName".to_string(), self.sender.name.clone());
        data.insert("chatName".to_string(), self.chat.name.clone());
        data.insert("isGroup".to_string(), self.is_group.to_string());
        data.insert("senderAvatar".to_string(), self.sender.avatar.clone());
        data.insert("chatAvatar".to_string(), self.chat.avatar.clone());
        data.insert("type".to_string(), CHAT_MESSAGE_TYPE.to_string());
        data.insert("categoryId".to_string(), CHAT_MESSAGE_CATEGORY.to_string());
        data
    }
}

/// Notification body with preview masking applied.
pub fn build_body(
    preferences: &NotificationPreferences,
    is_group: bool,
    sender_name: &str,
    text: &str,
) -> String {
    let shown = if preferences.show_preview {
        non_blank(Some(text)).unwrap_or(NEW_MESSAGE_TEXT)
    } else {
        NEW_MESSAGE_TEXT
    };

    if is_group {
        format!("{}: {}", sender_name, shown)
    } else {
        shown.to_string()
    }
}

pub fn channel_id(preferences: &NotificationPreferences) -> &'static str {
    if preferences.play_sound {
        DEFAULT_CHANNEL_ID
    } else {
        SILENT_CHANNEL_ID
    }
}

pub fn build_fcm_payload(ctx: &MessageContext, preferences: &NotificationPreferences) -> FcmPayload {
    let body = build_body(preferences, ctx.is_group, &ctx.sender.name, &ctx.text);

    let mut android_notification = json!({ "channel_id": channel_id(preferences) });
    let mut aps = json!({ "category": CHAT_MESSAGE_CATEGORY });
    if preferences.play_sound {
        android_notification["sound"] = json!(DEFAULT_SOUND);
        aps["sound"] = json!(DEFAULT_SOUND);
    }

    FcmPayload {
        notification: Some(FcmNotification {
            title: Some(ctx.title()),
            body: Some(body),
        }),
        data: Some(ctx.data()),
        android: Some(json!({
            "priority": "HIGH",
            "notification": android_notification,
        })),
        webpush: None,
        apns: Some(json!({ "payload": { "aps": aps } })),
    }
}

pub fn build_expo_message(
    token: &str,
    ctx: &MessageContext,
    preferences: &NotificationPreferences,
) -> ExpoMessage {
    ExpoMessage {
        to: token.to_string(),
        title: ctx.title(),
        body: build_body(preferences, ctx.is_group, &ctx.sender.name, &ctx.text),
        data: ctx.data(),
        category_id: CHAT_MESSAGE_CATEGORY.to_string(),
        channel_id: channel_id(preferences).to_string(),
        sound: preferences
            .play_sound
            .then(|| DEFAULT_SOUND.to_string()),
    }
}

/// Display name and avatar for the chat.
///
/// Group chats bound to a circle show the circle's name and avatar, falling
/// back to the chat's own fields when the circle read fails or the circle
/// has none. Direct chats show the sender.
pub async fn resolve_chat_display(
    store: &dyn DocumentStore,
    chat: &Chat,
    is_group: bool,
    sender: &SenderDisplay,
) -> ChatDisplay {
    if !is_group {
        return ChatDisplay {
            name: non_blank(chat.name.as_deref())
                .unwrap_or(sender.name.as_str())
                .to_string(),
            avatar: chat.avatar.clone().unwrap_or_else(|| sender.avatar.clone()),
        };
    }

    let circle = match chat.circle_id.as_deref() {
        Some(circle_id) => match store.get_circle(circle_id).await {
            Ok(circle) => circle,
            Err(e) => {
                warn!(chat_id = %chat.id, circle_id = %circle_id, error = %e, "Failed to load circle, using chat name");
                None
            }
        },
        None => None,
    };

    let name = circle
        .as_ref()
        .and_then(|c| non_blank(c.name.as_deref()))
        .or_else(|| non_blank(chat.name.as_deref()))
        .unwrap_or(UNNAMED_GROUP)
        .to_string();
    let avatar = circle
        .and_then(|c| c.avatar)
        .or_else(|| chat.avatar.clone())
        .unwrap_or_default();

    ChatDisplay { name, avatar }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
