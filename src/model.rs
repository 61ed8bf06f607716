//! Domain model shared across the client
//!
//! Wire shapes match the server's JSON (camelCase field names). The
//! projection helpers at the bottom turn the raw session data (memberships,
//! companion profiles) into the chat list the UI consumes; they are pure
//! functions computed once per data change, never re-derived ad hoc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as stored and displayed
///
/// Immutable once received; `is_read` is the one field the server may flip
/// later. `message_id` is unique within a chat and increases with send order.
/// A locally-generated optimistic id is a temporary placeholder only (see
/// `window::ChatWindow`), always negative so it can never collide with a
/// server-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned message ID, unique within the chat
    pub message_id: i64,
    /// ID of the sending user
    pub sender_id: i64,
    /// ID of the owning chat
    pub chat_id: i64,
    /// Text content
    pub text: String,
    /// Send timestamp, used for both ordering and grouping display
    pub send_dttm: DateTime<Utc>,
    /// Whether the message has been read
    pub is_read: bool,
    /// Optional weak reference to the message this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    /// Timestamp of the last server-side edit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_dttm: Option<DateTime<Utc>>,
}

impl Message {
    /// Ordering key for the message buffer: ascending `(send_dttm, message_id)`
    pub fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.send_dttm, self.message_id)
    }
}

/// A user profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID
    pub user_id: i64,
    /// Display nickname
    pub nickname: String,
    /// Optional first name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    /// Optional second name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondname: Option<String>,
    /// Optional profile picture URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_link: Option<String>,
}

impl User {
    /// Full display name: "firstname secondname" when both are present,
    /// nickname otherwise
    pub fn display_name(&self) -> String {
        match (&self.firstname, &self.secondname) {
            (Some(first), Some(second)) => format!("{} {}", first, second),
            _ => self.nickname.clone(),
        }
    }
}

/// A chat membership record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    /// Chat this membership belongs to
    pub chat_id: i64,
    /// Member user ID
    pub user_id: i64,
    /// When the user joined the chat
    pub join_dttm: DateTime<Utc>,
    /// When the user left the chat, if they did
    #[serde(default)]
    pub leave_dttm: Option<DateTime<Utc>>,
}

/// A contact entry (owner knows user)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// The user who owns this contact entry
    pub owner_id: i64,
    /// The user this entry points to
    pub user_id: i64,
}

/// A chat paired with the companion profile, as shown in the chat list
///
/// Every chat in observed scope has exactly two members; the companion is the
/// other one, relative to the viewing user.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatWithCompanion {
    /// Chat ID
    pub chat_id: i64,
    /// The other member of the chat
    pub companion: User,
}

/// Project raw session data into the chat list
///
/// For each of the viewer's chats, finds the member that is not the viewer
/// and resolves their profile from `companions`. Chats whose companion cannot
/// be resolved (profile missing, or a malformed single-member chat) are
/// skipped rather than surfaced as broken rows.
pub fn map_chats_with_companions(
    my_chats: &[ChatMember],
    all_members: &[ChatMember],
    companions: &[User],
    current_user: &User,
) -> Vec<ChatWithCompanion> {
    my_chats
        .iter()
        .filter_map(|chat| {
            let companion = all_members
                .iter()
                .filter(|m| m.chat_id == chat.chat_id && m.user_id != current_user.user_id)
                .filter_map(|m| companions.iter().find(|c| c.user_id == m.user_id))
                .next()?;
            Some(ChatWithCompanion {
                chat_id: chat.chat_id,
                companion: companion.clone(),
            })
        })
        .collect()
}

/// Find the chat shared with a given user, if one exists
pub fn chat_id_with_user(
    my_chats: &[ChatMember],
    all_members: &[ChatMember],
    user_id: i64,
) -> Option<i64> {
    my_chats
        .iter()
        .find(|chat| {
            all_members
                .iter()
                .any(|m| m.chat_id == chat.chat_id && m.user_id == user_id)
        })
        .map(|chat| chat.chat_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(id: i64, nickname: &str) -> User {
        User {
            user_id: id,
            nickname: nickname.to_string(),
            firstname: None,
            secondname: None,
            profile_picture_link: None,
        }
    }

    fn member(chat_id: i64, user_id: i64) -> ChatMember {
        ChatMember {
            chat_id,
            user_id,
            join_dttm: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            leave_dttm: None,
        }
    }

    #[test]
    fn test_message_wire_shape_round_trip() {
        let json = r#"{
            "messageId": 101,
            "senderId": 7,
            "chatId": 3,
            "text": "hello",
            "sendDttm": "2024-05-01T12:30:00Z",
            "isRead": false,
            "replyToMessageId": 99
        }"#;

        let msg: Message = serde_json::from_str(json).expect("Failed to parse message");
        assert_eq!(msg.message_id, 101);
        assert_eq!(msg.sender_id, 7);
        assert_eq!(msg.chat_id, 3);
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.reply_to_message_id, Some(99));
        assert_eq!(msg.updated_dttm, None);

        let back = serde_json::to_string(&msg).expect("Failed to serialize message");
        assert!(back.contains("\"messageId\":101"));
        assert!(back.contains("\"sendDttm\""));
        assert!(!back.contains("updatedDttm"));
    }

    #[test]
    fn test_message_optional_fields_default() {
        let json = r#"{
            "messageId": 1,
            "senderId": 2,
            "chatId": 3,
            "text": "x",
            "sendDttm": "2024-05-01T12:30:00Z",
            "isRead": true
        }"#;

        let msg: Message = serde_json::from_str(json).expect("Failed to parse message");
        assert_eq!(msg.reply_to_message_id, None);
        assert_eq!(msg.updated_dttm, None);
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let mut u = user(1, "nick");
        assert_eq!(u.display_name(), "nick");

        u.firstname = Some("Ada".to_string());
        assert_eq!(u.display_name(), "nick");

        u.secondname = Some("Lovelace".to_string());
        assert_eq!(u.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_map_chats_with_companions() {
        let me = user(1, "me");
        let alice = user(2, "alice");
        let bob = user(3, "bob");

        let my_chats = vec![member(10, 1), member(20, 1)];
        let all_members = vec![
            member(10, 1),
            member(10, 2),
            member(20, 1),
            member(20, 3),
        ];
        let companions = vec![alice.clone(), bob.clone()];

        let chats = map_chats_with_companions(&my_chats, &all_members, &companions, &me);
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat_id, 10);
        assert_eq!(chats[0].companion, alice);
        assert_eq!(chats[1].chat_id, 20);
        assert_eq!(chats[1].companion, bob);
    }

    #[test]
    fn test_map_chats_skips_unresolvable_companion() {
        let me = user(1, "me");
        let my_chats = vec![member(10, 1), member(20, 1)];
        // Chat 10 has a companion with no profile, chat 20 has no second member.
        let all_members = vec![member(10, 1), member(10, 2), member(20, 1)];
        let companions = vec![user(3, "someone_else")];

        let chats = map_chats_with_companions(&my_chats, &all_members, &companions, &me);
        assert!(chats.is_empty());
    }

    #[test]
    fn test_chat_id_with_user() {
        let my_chats = vec![member(10, 1), member(20, 1)];
        let all_members = vec![
            member(10, 1),
            member(10, 2),
            member(20, 1),
            member(20, 3),
        ];

        assert_eq!(chat_id_with_user(&my_chats, &all_members, 3), Some(20));
        assert_eq!(chat_id_with_user(&my_chats, &all_members, 2), Some(10));
        assert_eq!(chat_id_with_user(&my_chats, &all_members, 99), None);
    }
}
