use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use huddle_shared::constants::STREAM_BUFFER_SIZE;
use huddle_shared::{ChatError, ChatResult, UserId};
use huddle_store::{Notification, StoreHandle, User};

use crate::groups::Groups;
use crate::notifications::{
    NotificationEmitter, NotificationSink, Notifications, StoreNotifications,
};
use crate::streams::GroupStreams;
use crate::ChatService;

pub(crate) fn u(id: &str) -> UserId {
    UserId::from(id)
}

/// In-memory store with users `u1`..`u4`.  Only `u2` has a display name.
pub(crate) async fn seeded_store() -> StoreHandle {
    let store = StoreHandle::in_memory().unwrap();
    store
        .call(|db| {
            let now = Utc::now();
            for (id, username, display) in [
                ("u1", "alice", None),
                ("u2", "bob", Some("Bob")),
                ("u3", "carol", None),
                ("u4", "dave", None),
            ] {
                db.upsert_user(&User {
                    id: UserId::from(id),
                    username: username.to_string(),
                    display_name: display.map(str::to_string),
                    avatar_ref: None,
                    created_at: now,
                    updated_at: now,
                })?;
            }
            Ok::<_, huddle_store::StoreError>(())
        })
        .await
        .unwrap();
    store
}

pub(crate) async fn service() -> ChatService {
    ChatService::new(seeded_store().await, STREAM_BUFFER_SIZE)
}

/// Groups wired to `sink` (the store when `None`), plus the inbox to check it.
pub(crate) fn groups_with_sink(
    store: StoreHandle,
    sink: Option<Arc<dyn NotificationSink>>,
) -> (Groups, Notifications) {
    let sink: Arc<dyn NotificationSink> = match sink {
        Some(sink) => sink,
        None => Arc::new(StoreNotifications::new(store.clone())),
    };
    let groups = Groups::new(
        store.clone(),
        Arc::new(GroupStreams::default()),
        NotificationEmitter::new(sink),
    );
    (groups, Notifications::new(store))
}

#[derive(Default)]
pub(crate) struct FailingSink {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _notification: Notification) -> ChatResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ChatError::Unavailable("sink offline".into()))
    }
}
