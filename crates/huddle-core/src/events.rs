//! Live events pushed to chat subscribers.

use serde::Serialize;

use huddle_shared::{MessageId, UserId};
use huddle_store::{DirectMessage, GroupMessage};

/// What happened in a chat.
///
/// A fresh subscription first yields one `Appended` per stored message, then
/// live events as they occur.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent<M> {
    Appended { message: M },
    Deleted { message_id: MessageId },
    /// `reader_id` marked the chat as read.
    Read { reader_id: UserId },
    /// `user_id` left or was removed from the group; their subscriptions end.
    MemberRemoved { user_id: UserId },
}

impl<M> MessageEvent<M> {
    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageEvent::Appended { .. } => "appended",
            MessageEvent::Deleted { .. } => "deleted",
            MessageEvent::Read { .. } => "read",
            MessageEvent::MemberRemoved { .. } => "member_removed",
        }
    }
}

/// Messages with a per-chat position, used to line up history with live
/// events.
pub trait Sequenced {
    fn seq(&self) -> i64;
}

impl Sequenced for DirectMessage {
    fn seq(&self) -> i64 {
        self.seq
    }
}

impl Sequenced for GroupMessage {
    fn seq(&self) -> i64 {
        self.seq
    }
}

pub type DirectEvent = MessageEvent<DirectMessage>;
pub type GroupEvent = MessageEvent<GroupMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event: DirectEvent = MessageEvent::Read {
            reader_id: UserId::from("u2"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "read");
        assert_eq!(json["reader_id"], "u2");
        assert_eq!(event.kind(), "read");
    }

    #[test]
    fn member_removed_names_the_user() {
        let event: GroupEvent = MessageEvent::MemberRemoved {
            user_id: UserId::from("u2"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "member_removed");
        assert_eq!(json["user_id"], "u2");
    }
}
