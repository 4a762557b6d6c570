//! # huddle-core
//!
//! Chat coordination layer for Huddle.
//!
//! Every component receives an explicit [`StoreHandle`] (and, where it
//! pushes live updates, the shared stream registry) instead of reaching for
//! a global database.  [`ChatService`] wires them together for the server;
//! tests build the same service over an in-memory database.
//!
//! - [`direct::DirectChats`]: find-or-create of 1:1 chats
//! - [`groups::Groups`]: group lifecycle, membership and ownership transfer
//! - [`messages::Messages`]: append, delete, mark-read, live subscriptions
//! - [`unread::Unread`]: per-user unread counts, recomputed on demand
//! - [`notifications`]: best-effort group-invite notifications
//! - [`contacts::Contacts`]: contact list and chat list views

pub mod contacts;
pub mod direct;
pub mod events;
pub mod groups;
pub mod messages;
pub mod notifications;
pub mod service;
pub mod streams;
pub mod unread;

mod ext;
#[cfg(test)]
mod test_support;

pub use events::MessageEvent;
pub use service::ChatService;
pub use streams::MessageSubscription;

pub use huddle_store::StoreHandle;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
