//! Unread Accounting, recomputed from the message log on every call.

use huddle_shared::{ChatId, ChatResult, GroupId, UserId};
use huddle_store::StoreHandle;

use crate::direct::ensure_participant;
use crate::ext::OrNotFound;
use crate::groups::ensure_member;

#[derive(Clone)]
pub struct Unread {
    store: StoreHandle,
}

impl Unread {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Messages in the chat sent by the other participant and not yet read.
    pub async fn unread_count(&self, chat_id: ChatId, user: &UserId) -> ChatResult<u64> {
        let user = user.clone();
        self.store
            .call(move |db| {
                let chat = db
                    .get_direct_chat(chat_id)
                    .or_not_found(|| format!("chat {chat_id}"))?;
                ensure_participant(&chat, &user)?;
                Ok(db.count_direct_unread(chat_id, &user)?)
            })
            .await
    }

    /// Messages in the group sent by others that `user` has not read.
    pub async fn group_unread_count(&self, group_id: GroupId, user: &UserId) -> ChatResult<u64> {
        let user = user.clone();
        self.store
            .call(move |db| {
                let group = db
                    .get_group(group_id)
                    .or_not_found(|| format!("group {group_id}"))?;
                ensure_member(&group, &user)?;
                Ok(db.count_group_unread(group_id, &user)?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{service, u};

    #[tokio::test]
    async fn direct_scenario() {
        let svc = service().await;
        let c1 = svc
            .direct
            .resolve_or_create_chat(&u("u1"), &u("u2"))
            .await
            .unwrap();

        svc.messages.append(c1, &u("u1"), "hi").await.unwrap();
        assert_eq!(svc.unread.unread_count(c1, &u("u2")).await.unwrap(), 1);
        assert_eq!(svc.unread.unread_count(c1, &u("u1")).await.unwrap(), 0);

        svc.messages.mark_read(c1, &u("u2")).await.unwrap();
        assert_eq!(svc.unread.unread_count(c1, &u("u2")).await.unwrap(), 0);

        svc.messages.mark_read(c1, &u("u2")).await.unwrap();
        assert_eq!(svc.unread.unread_count(c1, &u("u2")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_leaves_own_messages_alone() {
        let svc = service().await;
        let c1 = svc
            .direct
            .resolve_or_create_chat(&u("u1"), &u("u2"))
            .await
            .unwrap();
        svc.messages.append(c1, &u("u1"), "ping").await.unwrap();
        svc.messages.append(c1, &u("u2"), "pong").await.unwrap();

        assert_eq!(svc.messages.mark_read(c1, &u("u1")).await.unwrap(), 1);
        assert_eq!(svc.unread.unread_count(c1, &u("u2")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn group_counts_per_member() {
        let svc = service().await;
        let group = svc
            .groups
            .create_group(&u("u1"), "crew", &[u("u2"), u("u3")])
            .await
            .unwrap()
            .id;
        svc.messages.append_group(group, &u("u1"), "", "a").await.unwrap();
        svc.messages.append_group(group, &u("u2"), "", "b").await.unwrap();

        assert_eq!(svc.unread.group_unread_count(group, &u("u1")).await.unwrap(), 1);
        assert_eq!(svc.unread.group_unread_count(group, &u("u3")).await.unwrap(), 2);

        svc.messages.mark_group_read(group, &u("u3")).await.unwrap();
        assert_eq!(svc.unread.group_unread_count(group, &u("u3")).await.unwrap(), 0);
        assert_eq!(svc.unread.group_unread_count(group, &u("u2")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn non_participants_are_rejected() {
        let svc = service().await;
        let c1 = svc
            .direct
            .resolve_or_create_chat(&u("u1"), &u("u2"))
            .await
            .unwrap();
        assert!(svc.unread.unread_count(c1, &u("u3")).await.is_err());
    }
}
