//! Domain model structs persisted in the service database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer as JSON.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use huddle_shared::{ChatId, GroupId, MessageId, NotificationId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile from the identity directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Unique handle used to add contacts.
    pub username: String,
    pub display_name: Option<String>,
    /// Opaque reference to the avatar image (URL or blob key).
    pub avatar_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Best human-readable name: display name, then username, then `fallback`.
    pub fn name_or(&self, fallback: &str) -> String {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(Some(self.username.as_str()).filter(|n| !n.trim().is_empty()))
            .unwrap_or(fallback)
            .to_string()
    }

    /// Capture the fields chats denormalize at creation / join time.
    pub fn snapshot(&self, fallback: &str) -> ProfileSnapshot {
        ProfileSnapshot {
            display_name: self.name_or(fallback),
            avatar_ref: self.avatar_ref.clone(),
        }
    }
}

/// Display data copied onto a chat record when a participant joins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSnapshot {
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

impl ProfileSnapshot {
    pub fn placeholder(name: &str) -> Self {
        Self {
            display_name: name.to_string(),
            avatar_ref: None,
        }
    }
}

/// Denormalized copy of the newest message, stored on the chat for list views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePreview {
    pub text: String,
    pub sender_id: UserId,
    pub sent_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Direct chat
// ---------------------------------------------------------------------------

/// A 1:1 chat session.  `participants` is always sorted ascending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectChat {
    pub id: ChatId,
    pub participants: [UserId; 2],
    pub participant_profiles: BTreeMap<UserId, ProfileSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<MessagePreview>,
}

impl DirectChat {
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    /// The participant that is not `user`, if `user` takes part at all.
    pub fn other_participant(&self, user: &UserId) -> Option<&UserId> {
        match &self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }
}

/// A single message in a direct chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// Position within the chat, starting at 1.
    pub seq: i64,
    pub sender_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Set once the non-sender has viewed the message.
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Group chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMember {
    pub user_id: UserId,
    pub profile: ProfileSnapshot,
    pub joined_at: DateTime<Utc>,
}

/// A multi-member chat session.  `members` is in join order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupChat {
    pub id: GroupId,
    pub name: String,
    pub owner_id: UserId,
    pub members: Vec<GroupMember>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<MessagePreview>,
}

impl GroupChat {
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.iter().any(|m| &m.user_id == user)
    }

    pub fn member_ids(&self) -> BTreeSet<UserId> {
        self.members.iter().map(|m| m.user_id.clone()).collect()
    }
}

/// A single message in a group chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMessage {
    pub id: MessageId,
    pub group_id: GroupId,
    pub seq: i64,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Members who have viewed the message; always contains the sender.
    pub read_by: BTreeSet<UserId>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A group-invite notification addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub target_user_id: UserId,
    pub group_id: GroupId,
    pub group_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(display: Option<&str>, username: &str) -> User {
        User {
            id: UserId::from("u1"),
            username: username.to_string(),
            display_name: display.map(str::to_string),
            avatar_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn name_prefers_display_name() {
        assert_eq!(user(Some("Alice"), "alice").name_or("User"), "Alice");
    }

    #[test]
    fn name_falls_back_to_username_then_placeholder() {
        assert_eq!(user(None, "alice").name_or("User"), "alice");
        assert_eq!(user(Some("  "), "").name_or("User"), "User");
    }

    #[test]
    fn other_participant() {
        let now = Utc::now();
        let a = UserId::from("a");
        let b = UserId::from("b");
        let chat = DirectChat {
            id: ChatId::for_pair(&a, &b),
            participants: [a.clone(), b.clone()],
            participant_profiles: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            last_message: None,
        };
        assert_eq!(chat.other_participant(&a), Some(&b));
        assert_eq!(chat.other_participant(&b), Some(&a));
        assert_eq!(chat.other_participant(&UserId::from("c")), None);
    }
}
