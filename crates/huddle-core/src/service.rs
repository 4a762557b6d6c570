use std::sync::Arc;

use huddle_store::StoreHandle;

use crate::contacts::Contacts;
use crate::direct::DirectChats;
use crate::groups::Groups;
use crate::messages::Messages;
use crate::notifications::{
    NotificationEmitter, NotificationSink, Notifications, StoreNotifications,
};
use crate::streams::{DirectStreams, GroupStreams};
use crate::unread::Unread;

/// All chat components over one injected store.
#[derive(Clone)]
pub struct ChatService {
    pub direct: DirectChats,
    pub groups: Groups,
    pub messages: Messages,
    pub unread: Unread,
    pub contacts: Contacts,
    pub notifications: Notifications,
}

impl ChatService {
    /// Service whose group invites are written to the store.
    pub fn new(store: StoreHandle, stream_capacity: usize) -> Self {
        let sink = Arc::new(StoreNotifications::new(store.clone()));
        Self::with_notification_sink(store, stream_capacity, sink)
    }

    pub fn with_notification_sink(
        store: StoreHandle,
        stream_capacity: usize,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let direct_streams = Arc::new(DirectStreams::new(stream_capacity));
        let group_streams = Arc::new(GroupStreams::new(stream_capacity));
        let direct = DirectChats::new(store.clone());

        Self {
            groups: Groups::new(
                store.clone(),
                Arc::clone(&group_streams),
                NotificationEmitter::new(sink),
            ),
            messages: Messages::new(store.clone(), direct_streams, group_streams),
            unread: Unread::new(store.clone()),
            contacts: Contacts::new(store.clone(), direct.clone()),
            notifications: Notifications::new(store),
            direct,
        }
    }
}
