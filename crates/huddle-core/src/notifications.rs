//! Group-invite notifications.
//!
//! Emitting is best-effort: a failing sink is logged and never fails the
//! membership change that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use huddle_shared::{ChatError, ChatResult, GroupId, NotificationId, UserId};
use huddle_store::{Notification, StoreHandle};

use crate::now;

/// Destination for notification records.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> ChatResult<()>;
}

/// Persists notifications in the `notifications` table.
#[derive(Clone)]
pub struct StoreNotifications {
    store: StoreHandle,
}

impl StoreNotifications {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationSink for StoreNotifications {
    async fn deliver(&self, notification: Notification) -> ChatResult<()> {
        self.store
            .call(move |db| Ok(db.insert_notification(&notification)?))
            .await
    }
}

#[derive(Clone)]
pub struct NotificationEmitter {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationEmitter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub async fn emit_group_invite(&self, target: &UserId, group_id: GroupId, group_name: &str) {
        let notification = Notification {
            id: NotificationId::new(),
            target_user_id: target.clone(),
            group_id,
            group_name: group_name.to_string(),
            message: format!("You were added to {group_name}"),
            created_at: now(),
            read: false,
        };
        let id = notification.id;

        match self.sink.deliver(notification).await {
            Ok(()) => debug!(
                user = %target,
                group = %group_id,
                notification = %id,
                "Group invite sent"
            ),
            Err(e) => warn!(
                user = %target,
                group = %group_id,
                error = %e,
                "Failed to emit group invite"
            ),
        }
    }
}

/// Read side of the notification inbox.
#[derive(Clone)]
pub struct Notifications {
    store: StoreHandle,
}

impl Notifications {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// `user`'s notifications, newest first.
    pub async fn list(&self, user: &UserId) -> ChatResult<Vec<Notification>> {
        let user = user.clone();
        self.store
            .call(move |db| Ok(db.list_notifications_for_user(&user)?))
            .await
    }

    pub async fn mark_read(&self, id: NotificationId, user: &UserId) -> ChatResult<()> {
        let user = user.clone();
        let updated = self
            .store
            .call(move |db| db.mark_notification_read(id, &user))
            .await?;
        if updated {
            Ok(())
        } else {
            Err(ChatError::not_found(format!("notification {id}")))
        }
    }
}
