use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification `type` shared by in-app records and push data blocks.
pub const CHAT_MESSAGE_TYPE: &str = "CHAT_MESSAGE";
/// Action category the mobile client registers for chat notifications.
pub const CHAT_MESSAGE_CATEGORY: &str = "chat-message-actions";

// Documents below mirror the camelCase JSON the mobile client writes.

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Group,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(default)]
    pub id: String,
    /// Older chats were written without a type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<ChatType>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Per-user notification switches. An absent switch means "on".
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_show: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_sound: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_show: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_sound: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_preview: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettings>,
    #[serde(default)]
    pub muted_chat_ids: Vec<String>,
    #[serde(default)]
    pub expo_push_tokens: Vec<String>,
    #[serde(default)]
    pub fcm_tokens: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// In-app notification document, one per recipient per message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message_id: String,
    pub avatar: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Inbound "message created" trigger event.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreatedEvent {
    pub chat_id: String,
    pub message_id: String,
    #[serde(rename = "messageData")]
    pub message: Message,
}

// Structure for the FCM message payload
// See: https://firebase.google.com/docs/reference/fcm/rest/v1/projects.messages#Message
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FcmPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<FcmNotification>,
    pub data: Option<HashMap<String, String>>,

    // Platform specific overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpush: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FcmNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One entry of the JSON array posted to the Expo push endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpoMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
    pub category_id: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_without_optional_fields() {
        let profile: UserProfile = serde_json::from_str(r#"{"displayName":"Ada"}"#).unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));
        assert!(profile.settings.is_none());
        assert!(profile.muted_chat_ids.is_empty());
        assert!(profile.fcm_tokens.is_empty());
        assert!(profile.expo_push_tokens.is_empty());
    }

    #[test]
    fn test_chat_type_is_optional() {
        let chat: Chat =
            serde_json::from_str(r#"{"participants":["a","b","c"],"circleId":"c1"}"#).unwrap();
        assert_eq!(chat.chat_type, None);
        assert_eq!(chat.circle_id.as_deref(), Some("c1"));

        let chat: Chat = serde_json::from_str(r#"{"type":"group","participants":["a","b"]}"#).unwrap();
        assert_eq!(chat.chat_type, Some(ChatType::Group));
    }

    #[test]
    fn test_event_reads_message_data() {
        let raw = r#"{
            "chatId": "chat-1",
            "messageId": "msg-1",
            "messageData": {"chatId": "chat-1", "senderId": "u1", "text": "hi"}
        }"#;
        let event: MessageCreatedEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.message.sender_id, "u1");
        assert_eq!(event.message.text, "hi");
        assert!(event.message.media_url.is_none());
    }

    #[test]
    fn test_expo_message_omits_sound_when_silent() {
        let msg = ExpoMessage {
            to: "ExponentPushToken[abc]".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            data: HashMap::new(),
            category_id: CHAT_MESSAGE_CATEGORY.to_string(),
            channel_id: "silent".to_string(),
            sound: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("sound").is_none());
        assert_eq!(value["categoryId"], "chat-message-actions");
        assert_eq!(value["channelId"], "silent");
    }
}
