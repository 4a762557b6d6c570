//! # huddle-shared
//!
//! Types shared by every Huddle crate: strongly typed identifiers, service
//! wide constants, and the [`ChatError`] taxonomy surfaced to callers.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ChatError, ChatResult};
pub use types::{ChatId, GroupId, MessageId, NotificationId, UserId};
