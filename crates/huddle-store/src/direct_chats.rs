//! CRUD operations for [`DirectChat`] records.

use std::collections::BTreeMap;

use rusqlite::params;

use huddle_shared::constants::FALLBACK_PEER_NAME;
use huddle_shared::types::sorted_pair;
use huddle_shared::{ChatId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{DirectChat, MessagePreview, ProfileSnapshot};
use crate::rows::{fmt_ts, opt_ts_at, ts_at, uuid_at};

const CHAT_COLUMNS: &str = "id, participant_lo, participant_hi, lo_name, lo_avatar, hi_name, \
                            hi_avatar, created_at, updated_at, last_text, last_sender, last_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert `chat` unless a chat for the same participant pair exists.
    ///
    /// Returns `true` when a row was written.  The pair is unique in the
    /// schema, so concurrent callers converge on a single chat.
    pub fn insert_direct_chat_if_absent(&self, chat: &DirectChat) -> Result<bool> {
        let (lo, hi) = sorted_pair(&chat.participants[0], &chat.participants[1]);
        let lo_profile = snapshot_for(chat, lo);
        let hi_profile = snapshot_for(chat, hi);

        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO direct_chats
                 (id, participant_lo, participant_hi, lo_name, lo_avatar, hi_name, hi_avatar,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                chat.id.0.to_string(),
                lo.as_str(),
                hi.as_str(),
                lo_profile.display_name,
                lo_profile.avatar_ref,
                hi_profile.display_name,
                hi_profile.avatar_ref,
                fmt_ts(&chat.created_at),
                fmt_ts(&chat.updated_at),
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_direct_chat(&self, id: ChatId) -> Result<DirectChat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM direct_chats WHERE id = ?1"),
                params![id.0.to_string()],
                row_to_chat,
            )
            .map_err(StoreError::from_query)
    }

    /// Find the chat between two users, whatever order they are given in.
    pub fn find_direct_chat_between(&self, a: &UserId, b: &UserId) -> Result<Option<DirectChat>> {
        let (lo, hi) = sorted_pair(a, b);
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM direct_chats
             WHERE participant_lo = ?1 AND participant_hi = ?2"
        ))?;
        let mut rows = stmt.query_map(params![lo.as_str(), hi.as_str()], row_to_chat)?;
        rows.next().transpose().map_err(StoreError::Sqlite)
    }

    /// All chats `user` takes part in, most recently active first.
    pub fn list_direct_chats_for_user(&self, user: &UserId) -> Result<Vec<DirectChat>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHAT_COLUMNS} FROM direct_chats
             WHERE participant_lo = ?1 OR participant_hi = ?1
             ORDER BY updated_at DESC"
        ))?;
        let rows = stmt.query_map(params![user.as_str()], row_to_chat)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn snapshot_for(chat: &DirectChat, user: &UserId) -> ProfileSnapshot {
    chat.participant_profiles
        .get(user)
        .cloned()
        .unwrap_or_else(|| ProfileSnapshot::placeholder(FALLBACK_PEER_NAME))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn row_to_preview(
    row: &rusqlite::Row<'_>,
    first: usize,
) -> rusqlite::Result<Option<MessagePreview>> {
    let text: Option<String> = row.get(first)?;
    let sender: Option<String> = row.get(first + 1)?;
    let sent_at = opt_ts_at(row, first + 2)?;
    Ok(match (text, sender, sent_at) {
        (Some(text), Some(sender), Some(sent_at)) => Some(MessagePreview {
            text,
            sender_id: UserId(sender),
            sent_at,
        }),
        _ => None,
    })
}

/// Map a `rusqlite::Row` to a [`DirectChat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectChat> {
    let id = ChatId(uuid_at(row, 0)?);
    let lo = UserId(row.get(1)?);
    let hi = UserId(row.get(2)?);

    let mut participant_profiles = BTreeMap::new();
    participant_profiles.insert(
        lo.clone(),
        ProfileSnapshot {
            display_name: row.get(3)?,
            avatar_ref: row.get(4)?,
        },
    );
    participant_profiles.insert(
        hi.clone(),
        ProfileSnapshot {
            display_name: row.get(5)?,
            avatar_ref: row.get(6)?,
        },
    );

    Ok(DirectChat {
        id,
        participants: [lo, hi],
        participant_profiles,
        created_at: ts_at(row, 7)?,
        updated_at: ts_at(row, 8)?,
        last_message: row_to_preview(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chat_between, seeded_db};

    #[test]
    fn insert_is_idempotent_per_pair() {
        let db = seeded_db();
        assert!(db.insert_direct_chat_if_absent(&chat_between("u1", "u2")).unwrap());
        assert!(!db.insert_direct_chat_if_absent(&chat_between("u2", "u1")).unwrap());

        let chats = db.list_direct_chats_for_user(&UserId::from("u1")).unwrap();
        assert_eq!(chats.len(), 1);
    }

    #[test]
    fn get_round_trips_snapshots() {
        let db = seeded_db();
        let chat = chat_between("u2", "u1");
        db.insert_direct_chat_if_absent(&chat).unwrap();

        let fetched = db.get_direct_chat(chat.id).unwrap();
        assert_eq!(fetched.participants, [UserId::from("u1"), UserId::from("u2")]);
        assert_eq!(
            fetched.participant_profiles[&UserId::from("u2")].display_name,
            "A"
        );
        assert!(fetched.last_message.is_none());
    }

    #[test]
    fn find_between_either_order() {
        let db = seeded_db();
        let chat = chat_between("u1", "u3");
        db.insert_direct_chat_if_absent(&chat).unwrap();

        let found = db
            .find_direct_chat_between(&UserId::from("u3"), &UserId::from("u1"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, chat.id);
        assert!(db
            .find_direct_chat_between(&UserId::from("u1"), &UserId::from("u2"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_chat_is_not_found() {
        let db = seeded_db();
        let id = ChatId::for_pair(&UserId::from("x"), &UserId::from("y"));
        assert!(matches!(db.get_direct_chat(id), Err(StoreError::NotFound)));
    }
}
