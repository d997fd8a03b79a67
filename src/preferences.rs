//! Per-recipient notification preferences.

use crate::models::{Chat, ChatType, UserProfile, UserSettings};
use crate::store::DocumentStore;
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// What a single recipient should receive for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub show_notifications: bool,
    pub show_preview: bool,
    pub play_sound: bool,
}

/// A participant that passed preference filtering.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub uid: String,
    pub profile: UserProfile,
    pub preferences: NotificationPreferences,
}

/// Group rules apply when the chat says so or when it has more than two
/// participants. The participant count covers chats written without a type.
pub fn is_group_chat(chat: &Chat) -> bool {
    chat.chat_type == Some(ChatType::Group) || chat.participants.len() > 2
}

pub fn resolve_preferences(
    profile: &UserProfile,
    chat_id: &str,
    is_group: bool,
) -> NotificationPreferences {
    let defaults = UserSettings::default();
    let settings = profile.settings.as_ref().unwrap_or(&defaults);

    let chat_muted = profile.muted_chat_ids.iter().any(|id| id == chat_id);
    let show_base = if is_group {
        settings.group_show.unwrap_or(true)
    } else {
        settings.msg_show.unwrap_or(true)
    };
    let play_sound = if is_group {
        settings.group_sound.unwrap_or(true)
    } else {
        settings.msg_sound.unwrap_or(true)
    };

    NotificationPreferences {
        show_notifications: show_base && !chat_muted,
        show_preview: settings.show_preview.unwrap_or(true),
        play_sound,
    }
}

/// Reads every participant except the sender concurrently and keeps the
/// ones that want to be notified, once per uid. Order of the result is not
/// meaningful.
///
/// A participant without a profile document is notified with default
/// preferences and no push tokens. A participant whose read fails is skipped.
pub async fn load_eligible_recipients(
    store: &dyn DocumentStore,
    chat: &Chat,
    sender_id: &str,
    is_group: bool,
) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    let reads = chat
        .participants
        .iter()
        .filter(|uid| uid.as_str() != sender_id)
        .filter(|uid| seen.insert(uid.as_str()))
        .map(|uid| async move { (uid, store.get_user(uid).await) });

    let mut recipients = Vec::new();
    for (uid, result) in join_all(reads).await {
        let profile = match result {
            Ok(Some(mut profile)) => {
                profile.id = uid.clone();
                profile
            }
            Ok(None) => {
                debug!(chat_id = %chat.id, uid = %uid, "Recipient has no profile document, using defaults");
                UserProfile {
                    id: uid.clone(),
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!(chat_id = %chat.id, uid = %uid, error = %e, "Failed to load recipient profile, skipping");
                continue;
            }
        };

        let preferences = resolve_preferences(&profile, &chat.id, is_group);
        if !preferences.show_notifications {
            trace!(chat_id = %chat.id, uid = %uid, "Notifications off or chat muted for recipient");
            continue;
        }

        recipients.push(Recipient {
            uid: uid.clone(),
            profile,
            preferences,
        });
    }
    recipients
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn profile_with(settings: Option<UserSettings>, muted: &[&str]) -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            settings,
            muted_chat_ids: muted.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn chat(id: &str, chat_type: Option<ChatType>, participants: &[&str]) -> Chat {
        Chat {
            id: id.to_string(),
            chat_type,
            participants: participants.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_settings_default_to_everything_on() {
        let profile = profile_with(None, &[]);
        let all_on = NotificationPreferences {
            show_notifications: true,
            show_preview: true,
            play_sound: true,
        };
        assert_eq!(resolve_preferences(&profile, "c1", true), all_on);
        assert_eq!(resolve_preferences(&profile, "c1", false), all_on);
    }

    #[test]
    fn test_partial_settings_default_missing_fields() {
        let settings = UserSettings {
            msg_sound: Some(false),
            ..Default::default()
        };
        let prefs = resolve_preferences(&profile_with(Some(settings), &[]), "c1", false);
        assert!(prefs.show_notifications);
        assert!(prefs.show_preview);
        assert!(!prefs.play_sound);
    }

    #[test]
    fn test_mute_overrides_show_flag() {
        let settings = UserSettings {
            msg_show: Some(true),
            group_show: Some(true),
            ..Default::default()
        };
        let profile = profile_with(Some(settings), &["c1"]);
        assert!(!resolve_preferences(&profile, "c1", false).show_notifications);
        assert!(!resolve_preferences(&profile, "c1", true).show_notifications);
        assert!(resolve_preferences(&profile, "c2", false).show_notifications);
    }

    #[test]
    fn test_group_and_direct_use_separate_switches() {
        let settings = UserSettings {
            msg_show: Some(false),
            group_show: Some(true),
            group_sound: Some(false),
            msg_sound: Some(true),
            show_preview: Some(false),
        };
        let profile = profile_with(Some(settings), &[]);

        let direct = resolve_preferences(&profile, "c1", false);
        assert!(!direct.show_notifications);
        assert!(direct.play_sound);

        let group = resolve_preferences(&profile, "c1", true);
        assert!(group.show_notifications);
        assert!(!group.play_sound);
        assert!(!group.show_preview);
    }

    #[test]
    fn test_group_classification() {
        assert!(is_group_chat(&chat("c", None, &["a", "b", "c"])));
        assert!(!is_group_chat(&chat("c", None, &["a", "b"])));
        assert!(is_group_chat(&chat("c", Some(ChatType::Group), &["a", "b"])));
        // Explicit direct type does not win over participant count.
        assert!(is_group_chat(&chat("c", Some(ChatType::Direct), &["a", "b", "c"])));
    }

    #[tokio::test]
    async fn test_load_eligible_recipients_filters_sender_and_muted() {
        let store = MemoryStore::new();
        store.insert_user(UserProfile {
            id: "bob".to_string(),
            ..Default::default()
        });
        store.insert_user(UserProfile {
            id: "cara".to_string(),
            muted_chat_ids: vec!["c1".to_string()],
            ..Default::default()
        });
        let chat = chat("c1", Some(ChatType::Group), &["alice", "bob", "cara", "dan"]);

        let mut uids: Vec<String> = load_eligible_recipients(&store, &chat, "alice", true)
            .await
            .into_iter()
            .map(|r| r.uid)
            .collect();
        uids.sort();

        // dan has no profile document and falls back to defaults.
        assert_eq!(uids, vec!["bob".to_string(), "dan".to_string()]);
    }

    #[tokio::test]
    async fn test_self_chat_has_no_recipients() {
        let store = MemoryStore::new();
        let chat = chat("notes", None, &["alice"]);
        assert!(load_eligible_recipients(&store, &chat, "alice", false)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_repeated_participant_is_notified_once() {
        let store = MemoryStore::new();
        let chat = chat("dm", Some(ChatType::Direct), &["alice", "bob", "bob"]);

        let recipients = load_eligible_recipients(&store, &chat, "alice", false).await;

        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].uid, "bob");
    }
}
