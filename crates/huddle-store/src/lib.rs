//! # huddle-store
//!
//! Persistent storage for the Huddle chat service, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every
//! collection (users, direct chats, direct messages, group chats, group
//! messages, notifications). [`StoreHandle`] shares one `Database` between
//! async callers by running each closure on the blocking thread pool.

pub mod database;
pub mod direct_chats;
pub mod direct_messages;
pub mod group_messages;
pub mod groups;
pub mod handle;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod users;

mod error;
mod rows;
#[cfg(test)]
mod test_support;

pub use database::Database;
pub use error::{Result, StoreError};
pub use handle::StoreHandle;
pub use models::*;
