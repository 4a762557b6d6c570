//! Per-chat broadcast channels and the subscription handle built on them.
//!
//! Channels are created lazily on first subscribe and dropped on the next
//! emit after their last receiver is gone, or by [`MessageStreams::release`]
//! when a subscribe attempt is refused.

use std::collections::VecDeque;
use std::fmt::Display;
use std::hash::Hash;

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use huddle_shared::constants::STREAM_BUFFER_SIZE;
use huddle_shared::{ChatId, GroupId, UserId};
use huddle_store::{DirectMessage, GroupMessage};

use crate::events::{MessageEvent, Sequenced};

pub type DirectStreams = MessageStreams<ChatId, DirectMessage>;
pub type GroupStreams = MessageStreams<GroupId, GroupMessage>;

pub struct MessageStreams<K, M> {
    streams: DashMap<K, broadcast::Sender<MessageEvent<M>>>,
    capacity: usize,
}

impl<K, M> MessageStreams<K, M>
where
    K: Eq + Hash + Copy + Display,
    M: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            streams: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self, key: K) -> broadcast::Receiver<MessageEvent<M>> {
        self.streams
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn emit(&self, key: K, event: MessageEvent<M>) {
        let delivered = match self.streams.get(&key) {
            Some(sender) => sender.send(event).is_ok(),
            None => return,
        };
        if !delivered
            && self
                .streams
                .remove_if(&key, |_, sender| sender.receiver_count() == 0)
                .is_some()
        {
            debug!(chat = %key, "Dropped idle message stream");
        }
    }

    /// Drop the channel for `key` if nobody listens on it.
    pub fn release(&self, key: K) {
        self.streams
            .remove_if(&key, |_, sender| sender.receiver_count() == 0);
    }

    /// Drop the channel for `key`; open subscriptions end after draining.
    pub fn close(&self, key: K) {
        if self.streams.remove(&key).is_some() {
            debug!(chat = %key, "Closed message stream");
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl<K, M> Default for MessageStreams<K, M>
where
    K: Eq + Hash + Copy + Display,
    M: Clone,
{
    fn default() -> Self {
        Self::new(STREAM_BUFFER_SIZE)
    }
}

/// A live, restartable view of one chat, held on behalf of one user.
///
/// Yields the full history as `Appended` events, then live events.  Live
/// appends already covered by the history are skipped.  Call [`close`] (any
/// number of times) or drop the handle to release it; once closed, `next`
/// returns `None`.  A `MemberRemoved` event naming the subscriber closes it.
///
/// [`close`]: MessageSubscription::close
#[derive(Debug)]
pub struct MessageSubscription<M> {
    subscriber: UserId,
    backlog: VecDeque<M>,
    replayed_to: i64,
    live: Option<broadcast::Receiver<MessageEvent<M>>>,
}

impl<M> MessageSubscription<M>
where
    M: Sequenced + Clone,
{
    /// `live` must be subscribed before `history` was loaded.
    pub(crate) fn new(
        subscriber: UserId,
        history: Vec<M>,
        live: broadcast::Receiver<MessageEvent<M>>,
    ) -> Self {
        let replayed_to = history.last().map(Sequenced::seq).unwrap_or(0);
        Self {
            subscriber,
            backlog: history.into(),
            replayed_to,
            live: Some(live),
        }
    }

    pub async fn next(&mut self) -> Option<MessageEvent<M>> {
        if self.live.is_none() {
            return None;
        }
        if let Some(message) = self.backlog.pop_front() {
            return Some(MessageEvent::Appended { message });
        }

        let rx = self.live.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(MessageEvent::Appended { message }) if message.seq() <= self.replayed_to => {
                    continue;
                }
                Ok(MessageEvent::MemberRemoved { user_id }) if user_id == self.subscriber => {
                    debug!(user = %user_id, "Subscriber removed, closing subscription");
                    self.close();
                    return None;
                }
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged, dropping live events");
                }
                Err(RecvError::Closed) => {
                    self.close();
                    return None;
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.backlog.clear();
        self.live = None;
    }

    pub fn is_closed(&self) -> bool {
        self.live.is_none()
    }

    pub fn into_stream(self) -> impl Stream<Item = MessageEvent<M>>
    where
        M: Send + 'static,
    {
        futures::stream::unfold(self, |mut sub| async move {
            let event = sub.next().await?;
            Some((event, sub))
        })
    }
}
