//! Direct Chat Registry: at most one chat per unordered pair of users.

use std::collections::BTreeMap;

use tracing::{debug, info};

use huddle_shared::constants::{FALLBACK_PEER_NAME, FALLBACK_SELF_NAME};
use huddle_shared::types::sorted_pair;
use huddle_shared::{ChatError, ChatId, ChatResult, UserId};
use huddle_store::{DirectChat, StoreHandle};

use crate::ext::OrNotFound;
use crate::now;

#[derive(Clone)]
pub struct DirectChats {
    store: StoreHandle,
}

impl DirectChats {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Return the chat between `requester` and `peer`, creating it first if
    /// needed.  The id only depends on the unordered pair, so
    /// `(a, b)` and `(b, a)` always resolve to the same chat.
    pub async fn resolve_or_create_chat(
        &self,
        requester: &UserId,
        peer: &UserId,
    ) -> ChatResult<ChatId> {
        if requester.is_blank() || peer.is_blank() {
            return Err(ChatError::invalid("user id is empty"));
        }
        if requester == peer {
            return Err(ChatError::invalid("cannot start a chat with yourself"));
        }

        let requester = requester.clone();
        let peer = peer.clone();
        self.store
            .call(move |db| {
                if let Some(existing) = db.find_direct_chat_between(&requester, &peer)? {
                    debug!(chat = %existing.id, "Reusing direct chat");
                    return Ok(existing.id);
                }

                let me = db
                    .get_user(&requester)
                    .or_not_found(|| format!("user {requester}"))?;
                let other = db.get_user(&peer).or_not_found(|| format!("user {peer}"))?;

                let now = now();
                let (lo, hi) = sorted_pair(&requester, &peer);
                let mut participant_profiles = BTreeMap::new();
                participant_profiles.insert(requester.clone(), me.snapshot(FALLBACK_SELF_NAME));
                participant_profiles.insert(peer.clone(), other.snapshot(FALLBACK_PEER_NAME));

                let chat = DirectChat {
                    id: ChatId::for_pair(&requester, &peer),
                    participants: [lo.clone(), hi.clone()],
                    participant_profiles,
                    created_at: now,
                    updated_at: now,
                    last_message: None,
                };

                if db.insert_direct_chat_if_absent(&chat)? {
                    info!(chat = %chat.id, a = %requester, b = %peer, "Created direct chat");
                }
                Ok(chat.id)
            })
            .await
    }

    /// Load a chat `requester` takes part in.
    pub async fn get_chat(&self, chat_id: ChatId, requester: &UserId) -> ChatResult<DirectChat> {
        let requester = requester.clone();
        self.store
            .call(move |db| {
                let chat = db
                    .get_direct_chat(chat_id)
                    .or_not_found(|| format!("chat {chat_id}"))?;
                ensure_participant(&chat, &requester)?;
                Ok(chat)
            })
            .await
    }
}

pub(crate) fn ensure_participant(chat: &DirectChat, user: &UserId) -> ChatResult<()> {
    if chat.has_participant(user) {
        Ok(())
    } else {
        Err(ChatError::forbidden(format!(
            "user {user} is not a participant of chat {}",
            chat.id
        )))
    }
}
