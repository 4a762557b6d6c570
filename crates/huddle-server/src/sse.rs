//! Server-Sent Events push channel for chat subscriptions.

use std::convert::Infallible;
use std::pin::Pin;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;

use huddle_core::events::Sequenced;
use huddle_core::MessageSubscription;

pub type BoxedEvents = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub type EventStream = Sse<BoxedEvents>;

/// Turn a subscription into an SSE response.  Each event is named by
/// [`huddle_core::MessageEvent::kind`] and carries the event as JSON.  The
/// subscription is released when the client disconnects or the subscriber
/// leaves the group.
pub fn event_stream<M>(subscription: MessageSubscription<M>) -> EventStream
where
    M: Sequenced + Clone + Serialize + Send + 'static,
{
    let stream = subscription.into_stream().map(|event| {
        let sse = Event::default()
            .event(event.kind())
            .json_data(&event)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to encode live event");
                Event::default().comment("encoding failed")
            });
        Ok::<_, Infallible>(sse)
    });

    let boxed: BoxedEvents = Box::pin(stream);
    Sse::new(boxed).keep_alive(KeepAlive::default())
}
