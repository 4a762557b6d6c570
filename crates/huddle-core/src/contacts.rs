//! Contact list and chat list views.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use huddle_shared::constants::{FALLBACK_PEER_NAME, FALLBACK_UNKNOWN_NAME};
use huddle_shared::{ChatError, ChatId, ChatResult, UserId};
use huddle_store::{MessagePreview, StoreHandle, User};

use crate::direct::DirectChats;

/// Another user as shown in a contact list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contact {
    pub user_id: UserId,
    pub username: String,
    pub name: String,
    pub avatar_ref: Option<String>,
    /// Set when the contact was just added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
}

impl Contact {
    fn from_user(user: User, fallback: &str) -> Self {
        Self {
            name: user.name_or(fallback),
            user_id: user.id,
            username: user.username,
            avatar_ref: user.avatar_ref,
            chat_id: None,
        }
    }
}

/// One direct chat in a user's chat list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSummary {
    pub chat_id: ChatId,
    pub contact_id: UserId,
    pub name: String,
    pub avatar_ref: Option<String>,
    pub last_message: Option<MessagePreview>,
    pub unread: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Contacts {
    store: StoreHandle,
    direct: DirectChats,
}

impl Contacts {
    pub fn new(store: StoreHandle, direct: DirectChats) -> Self {
        Self { store, direct }
    }

    /// Look a user up by username and open (or reuse) a chat with them.
    pub async fn add_contact(&self, user: &UserId, username: &str) -> ChatResult<Contact> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(ChatError::invalid("username is empty"));
        }

        let lookup = username.clone();
        let found = self
            .store
            .call(move |db| db.find_user_by_username(&lookup))
            .await?
            .ok_or_else(|| ChatError::not_found(format!("user {username}")))?;
        if &found.id == user {
            return Err(ChatError::invalid("you cannot add yourself as a contact"));
        }

        let chat_id = self.direct.resolve_or_create_chat(user, &found.id).await?;
        info!(user = %user, contact = %found.id, chat = %chat_id, "Contact added");

        let mut contact = Contact::from_user(found, FALLBACK_PEER_NAME);
        contact.chat_id = Some(chat_id);
        Ok(contact)
    }

    /// Every known user except `user`, by username.
    pub async fn list_contacts(&self, user: &UserId) -> ChatResult<Vec<Contact>> {
        let user = user.clone();
        let users = self
            .store
            .call(move |db| db.list_users_except(&user))
            .await?;
        Ok(users
            .into_iter()
            .map(|u| Contact::from_user(u, FALLBACK_UNKNOWN_NAME))
            .collect())
    }

    /// `user`'s direct chats, most recently active first, each with the
    /// other participant and the unread count for `user`.
    pub async fn list_chats(&self, user: &UserId) -> ChatResult<Vec<ChatSummary>> {
        let user = user.clone();
        self.store
            .call(move |db| {
                let chats = db.list_direct_chats_for_user(&user)?;
                let mut out = Vec::with_capacity(chats.len());
                for chat in chats {
                    let Some(other) = chat.other_participant(&user).cloned() else {
                        continue;
                    };
                    let profile = chat.participant_profiles.get(&other);
                    out.push(ChatSummary {
                        chat_id: chat.id,
                        name: profile
                            .map(|p| p.display_name.clone())
                            .unwrap_or_else(|| FALLBACK_PEER_NAME.to_string()),
                        avatar_ref: profile.and_then(|p| p.avatar_ref.clone()),
                        unread: db.count_direct_unread(chat.id, &user)?,
                        contact_id: other,
                        last_message: chat.last_message,
                        updated_at: chat.updated_at,
                    });
                }
                Ok(out)
            })
            .await
    }
}
