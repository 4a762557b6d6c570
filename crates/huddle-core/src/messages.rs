//! Message Store: append, delete and mark-read for direct and group chats,
//! plus live subscriptions.
//!
//! Live events are emitted while the store lock is still held, so their
//! order on a channel matches the `seq` order of the writes.

use std::sync::Arc;

use tracing::{debug, info};

use huddle_shared::constants::MAX_MESSAGE_LEN;
use huddle_shared::{ChatError, ChatId, ChatResult, GroupId, MessageId, UserId};
use huddle_store::{DirectMessage, GroupMessage, StoreHandle};

use crate::direct::ensure_participant;
use crate::events::MessageEvent;
use crate::ext::OrNotFound;
use crate::groups::ensure_member;
use crate::now;
use crate::streams::{DirectStreams, GroupStreams, MessageSubscription};

#[derive(Clone)]
pub struct Messages {
    store: StoreHandle,
    direct_streams: Arc<DirectStreams>,
    group_streams: Arc<GroupStreams>,
}

impl Messages {
    pub fn new(
        store: StoreHandle,
        direct_streams: Arc<DirectStreams>,
        group_streams: Arc<GroupStreams>,
    ) -> Self {
        Self {
            store,
            direct_streams,
            group_streams,
        }
    }

    // ------------------------------------------------------------------
    // Direct chats
    // ------------------------------------------------------------------

    /// Append a message to a direct chat `sender` takes part in.  The chat
    /// preview is updated in the same transaction.
    pub async fn append(
        &self,
        chat_id: ChatId,
        sender: &UserId,
        text: &str,
    ) -> ChatResult<DirectMessage> {
        let text = validate_text(text)?;
        let sender = sender.clone();
        let streams = Arc::clone(&self.direct_streams);

        self.store
            .call(move |db| {
                let chat = db
                    .get_direct_chat(chat_id)
                    .or_not_found(|| format!("chat {chat_id}"))?;
                ensure_participant(&chat, &sender)?;

                let message = db.append_direct_message(chat_id, &sender, &text, now())?;
                streams.emit(
                    chat_id,
                    MessageEvent::Appended {
                        message: message.clone(),
                    },
                );
                debug!(
                    chat = %chat_id,
                    message = %message.id,
                    seq = message.seq,
                    "Message appended"
                );
                Ok(message)
            })
            .await
    }

    /// History of a direct chat in ascending order.
    pub async fn list_messages(
        &self,
        chat_id: ChatId,
        requester: &UserId,
    ) -> ChatResult<Vec<DirectMessage>> {
        let requester = requester.clone();
        self.store
            .call(move |db| {
                let chat = db
                    .get_direct_chat(chat_id)
                    .or_not_found(|| format!("chat {chat_id}"))?;
                ensure_participant(&chat, &requester)?;
                Ok(db.list_direct_messages(chat_id)?)
            })
            .await
    }

    /// Replay the chat's history, then follow it live.
    pub async fn subscribe(
        &self,
        chat_id: ChatId,
        requester: &UserId,
    ) -> ChatResult<MessageSubscription<DirectMessage>> {
        // Subscribe before loading so nothing committed in between is lost.
        let live = self.direct_streams.subscribe(chat_id);
        let history = match self.list_messages(chat_id, requester).await {
            Ok(history) => history,
            Err(err) => {
                drop(live);
                self.direct_streams.release(chat_id);
                return Err(err);
            }
        };
        debug!(chat = %chat_id, user = %requester, replay = history.len(), "Subscribed");
        Ok(MessageSubscription::new(requester.clone(), history, live))
    }

    /// Mark every message from the other participant as read.
    /// Returns how many messages changed; repeated calls return 0.
    pub async fn mark_read(&self, chat_id: ChatId, reader: &UserId) -> ChatResult<usize> {
        let reader = reader.clone();
        let streams = Arc::clone(&self.direct_streams);
        self.store
            .call(move |db| {
                let chat = db
                    .get_direct_chat(chat_id)
                    .or_not_found(|| format!("chat {chat_id}"))?;
                ensure_participant(&chat, &reader)?;

                let changed = db.mark_direct_read(chat_id, &reader)?;
                if changed > 0 {
                    streams.emit(chat_id, MessageEvent::Read { reader_id: reader });
                }
                Ok(changed)
            })
            .await
    }

    // ------------------------------------------------------------------
    // Group chats
    // ------------------------------------------------------------------

    /// Append a message to a group `sender` belongs to.  A blank
    /// `sender_name` falls back to the sender's member snapshot.
    pub async fn append_group(
        &self,
        group_id: GroupId,
        sender: &UserId,
        sender_name: &str,
        text: &str,
    ) -> ChatResult<GroupMessage> {
        let text = validate_text(text)?;
        let sender = sender.clone();
        let sender_name = sender_name.trim().to_string();
        let streams = Arc::clone(&self.group_streams);

        self.store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                let Some(member) = group.members.iter().find(|m| m.user_id == sender) else {
                    return Err(ChatError::forbidden(format!(
                        "user {sender} is not a member of group {group_id}"
                    )));
                };
                let name = if sender_name.is_empty() {
                    member.profile.display_name.clone()
                } else {
                    sender_name
                };

                let message = db.append_group_message(group_id, &sender, &name, &text, now())?;
                streams.emit(
                    group_id,
                    MessageEvent::Appended {
                        message: message.clone(),
                    },
                );
                debug!(
                    group = %group_id,
                    message = %message.id,
                    seq = message.seq,
                    "Group message appended"
                );
                Ok(message)
            })
            .await
    }

    pub async fn list_group_messages(
        &self,
        group_id: GroupId,
        requester: &UserId,
    ) -> ChatResult<Vec<GroupMessage>> {
        let requester = requester.clone();
        self.store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                ensure_member(&group, &requester)?;
                Ok(db.list_group_messages(group_id)?)
            })
            .await
    }

    pub async fn subscribe_group(
        &self,
        group_id: GroupId,
        requester: &UserId,
    ) -> ChatResult<MessageSubscription<GroupMessage>> {
        let live = self.group_streams.subscribe(group_id);
        let history = match self.list_group_messages(group_id, requester).await {
            Ok(history) => history,
            Err(err) => {
                drop(live);
                self.group_streams.release(group_id);
                return Err(err);
            }
        };
        debug!(group = %group_id, user = %requester, replay = history.len(), "Subscribed");
        Ok(MessageSubscription::new(requester.clone(), history, live))
    }

    /// Add `reader` to `read_by` of every message they have not read yet.
    pub async fn mark_group_read(&self, group_id: GroupId, reader: &UserId) -> ChatResult<usize> {
        let reader = reader.clone();
        let streams = Arc::clone(&self.group_streams);
        self.store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                ensure_member(&group, &reader)?;

                let changed = db.mark_group_read(group_id, &reader, now())?;
                if changed > 0 {
                    streams.emit(group_id, MessageEvent::Read { reader_id: reader });
                }
                Ok(changed)
            })
            .await
    }

    // ------------------------------------------------------------------
    // Both
    // ------------------------------------------------------------------

    /// Delete a direct or group message.  Only its sender may delete it.
    /// The chat preview is not rewritten.
    pub async fn delete(&self, message_id: MessageId, requester: &UserId) -> ChatResult<()> {
        let requester = requester.clone();
        let direct_streams = Arc::clone(&self.direct_streams);
        let group_streams = Arc::clone(&self.group_streams);

        self.store
            .call(move |db| {
                if let Some(message) = db.find_direct_message(message_id)? {
                    ensure_author(&message.sender_id, &requester)?;
                    db.delete_direct_message(message_id)?;
                    direct_streams.emit(message.chat_id, MessageEvent::Deleted { message_id });
                    info!(chat = %message.chat_id, message = %message_id, "Message deleted");
                    return Ok(());
                }

                if let Some(message) = db.find_group_message(message_id)? {
                    ensure_author(&message.sender_id, &requester)?;
                    db.delete_group_message(message_id)?;
                    group_streams.emit(message.group_id, MessageEvent::Deleted { message_id });
                    info!(
                        group = %message.group_id,
                        message = %message_id,
                        "Group message deleted"
                    );
                    return Ok(());
                }

                Err(ChatError::not_found(format!("message {message_id}")))
            })
            .await
    }
}

fn validate_text(text: &str) -> ChatResult<String> {
    if text.trim().is_empty() {
        return Err(ChatError::invalid("message text is empty"));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChatError::invalid(format!(
            "message exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(text.to_string())
}

fn ensure_author(sender: &UserId, requester: &UserId) -> ChatResult<()> {
    if sender == requester {
        Ok(())
    } else {
        Err(ChatError::forbidden("you can only delete your own messages"))
    }
}
