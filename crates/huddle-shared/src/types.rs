use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DIRECT_CHAT_NAMESPACE;

// User identity = opaque id issued by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a 1:1 chat.
///
/// Derived deterministically from the unordered participant pair, so both
/// sides of a conversation always compute the same id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = sorted_pair(a, b);
        // Length prefix keeps the key unambiguous whatever bytes the ids hold.
        let key = format!("{}:{}{}", lo.as_str().len(), lo.as_str(), hi.as_str());
        Self(Uuid::new_v5(&DIRECT_CHAT_NAMESPACE, key.as_bytes()))
    }
}

/// Order two user ids so that `(lo, hi)` is the same for `(a, b)` and `(b, a)`.
pub fn sorted_pair<'a>(a: &'a UserId, b: &'a UserId) -> (&'a UserId, &'a UserId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct NotificationId(pub Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! uuid_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(&self.0, f)
                }
            }
        )*
    };
}

uuid_display!(ChatId, GroupId, MessageId, NotificationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_ignores_argument_order() {
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        assert_eq!(ChatId::for_pair(&alice, &bob), ChatId::for_pair(&bob, &alice));
    }

    #[test]
    fn chat_id_differs_per_pair() {
        let a = UserId::from("a");
        let b = UserId::from("b");
        let c = UserId::from("c");
        assert_ne!(ChatId::for_pair(&a, &b), ChatId::for_pair(&a, &c));
    }

    #[test]
    fn chat_id_key_is_unambiguous() {
        // "ab" + "c" must not collide with "a" + "bc".
        let left = ChatId::for_pair(&UserId::from("ab"), &UserId::from("c"));
        let right = ChatId::for_pair(&UserId::from("a"), &UserId::from("bc"));
        assert_ne!(left, right);
    }

    #[test]
    fn chat_id_key_survives_embedded_nul() {
        let left = ChatId::for_pair(&UserId::from("a"), &UserId::from("b\0c"));
        let right = ChatId::for_pair(&UserId::from("a\0b"), &UserId::from("c"));
        assert_ne!(left, right);
    }

    #[test]
    fn user_id_serializes_as_plain_string() {
        let id = UserId::from("u1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u1\"");
    }

    #[test]
    fn blank_user_id() {
        assert!(UserId::from("  ").is_blank());
        assert!(!UserId::from("u1").is_blank());
    }
}
