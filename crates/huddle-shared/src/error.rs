use thiserror::Error;

use crate::types::{GroupId, UserId};

/// Errors surfaced to callers of the chat coordination layer.
///
/// Every variant carries a human-readable message; the caller is expected to
/// display it and keep its prior state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// A required field is missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced chat, message, group or user does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requester is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The record being created already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("User {user} is already a member of group {group}")]
    AlreadyMember { group: GroupId, user: UserId },

    /// The backing store could not be reached or failed.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ChatError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_member_message_names_both_ids() {
        let group = GroupId::new();
        let err = ChatError::AlreadyMember {
            group,
            user: UserId::from("u4"),
        };
        let text = err.to_string();
        assert!(text.contains("u4"));
        assert!(text.contains(&group.to_string()));
    }

    #[test]
    fn helper_constructors() {
        assert_eq!(
            ChatError::forbidden("nope"),
            ChatError::Forbidden("nope".to_string())
        );
        assert!(ChatError::invalid("text is empty")
            .to_string()
            .starts_with("Invalid argument"));
    }
}
