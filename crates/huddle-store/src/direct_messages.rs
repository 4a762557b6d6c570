use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use huddle_shared::{ChatId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::DirectMessage;
use crate::rows::{fmt_ts, parse_ts, ts_at, uuid_at};

const MESSAGE_COLUMNS: &str = "id, chat_id, seq, sender_id, text, created_at, read";

impl Database {
    /// Append a message and refresh the chat's preview in one transaction.
    ///
    /// The message gets the next per-chat `seq` (never reused, even after
    /// deletes); its `created_at` is clamped so it never precedes the
    /// previous message of the same chat.
    pub fn append_direct_message(
        &mut self,
        chat_id: ChatId,
        sender: &UserId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<DirectMessage> {
        let tx = self.conn_mut().transaction()?;

        let (seq, created_at) = next_position(
            &tx,
            "SELECT last_seq, last_at FROM direct_chats WHERE id = ?1",
            &chat_id.0.to_string(),
            now,
        )?;

        let message = DirectMessage {
            id: MessageId::new(),
            chat_id,
            seq,
            sender_id: sender.clone(),
            text: text.to_string(),
            created_at,
            read: false,
        };

        tx.execute(
            "INSERT INTO direct_messages (id, chat_id, seq, sender_id, text, created_at, read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                message.id.0.to_string(),
                chat_id.0.to_string(),
                seq,
                sender.as_str(),
                message.text,
                fmt_ts(&created_at),
            ],
        )?;

        tx.execute(
            "UPDATE direct_chats
             SET last_text = ?1, last_sender = ?2, last_at = ?3, updated_at = ?3, last_seq = ?4
             WHERE id = ?5",
            params![
                message.text,
                sender.as_str(),
                fmt_ts(&created_at),
                seq,
                chat_id.0.to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(message)
    }

    /// Full history of a chat in ascending `seq` order.
    pub fn list_direct_messages(&self, chat_id: ChatId) -> Result<Vec<DirectMessage>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM direct_messages
             WHERE chat_id = ?1
             ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![chat_id.0.to_string()], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn find_direct_message(&self, id: MessageId) -> Result<Option<DirectMessage>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM direct_messages WHERE id = ?1"),
                params![id.0.to_string()],
                row_to_message,
            )
            .optional()?)
    }

    /// Delete a message.  The chat preview is left untouched.
    pub fn delete_direct_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM direct_messages WHERE id = ?1",
            params![id.0.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Mark every unread message not sent by `reader` as read.
    /// Returns the number of messages that changed.
    pub fn mark_direct_read(&self, chat_id: ChatId, reader: &UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE direct_messages SET read = 1
             WHERE chat_id = ?1 AND sender_id != ?2 AND read = 0",
            params![chat_id.0.to_string(), reader.as_str()],
        )?;
        Ok(affected)
    }

    pub fn count_direct_unread(&self, chat_id: ChatId, user: &UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM direct_messages
             WHERE chat_id = ?1 AND sender_id != ?2 AND read = 0",
            params![chat_id.0.to_string(), user.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Compute `(seq, created_at)` for the next message from the chat row
/// selected by `chat_sql` (`last_seq`, `last_at`).  A missing chat row is
/// [`StoreError::NotFound`].
pub(crate) fn next_position(
    tx: &Transaction<'_>,
    chat_sql: &str,
    chat_key: &str,
    now: DateTime<Utc>,
) -> Result<(i64, DateTime<Utc>)> {
    let (last_seq, last_at): (i64, Option<String>) = tx
        .query_row(chat_sql, params![chat_key], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(StoreError::from_query)?;

    // Stored timestamps carry microseconds; truncate so the returned record
    // equals what a later read yields.
    let now = now.trunc_subsecs(6);
    let created_at = match last_at {
        Some(ts) => now.max(parse_ts(&ts)?),
        None => now,
    };
    Ok((last_seq + 1, created_at))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectMessage> {
    let read: i64 = row.get(6)?;
    Ok(DirectMessage {
        id: MessageId(uuid_at(row, 0)?),
        chat_id: ChatId(uuid_at(row, 1)?),
        seq: row.get(2)?,
        sender_id: UserId(row.get(3)?),
        text: row.get(4)?,
        created_at: ts_at(row, 5)?,
        read: read != 0,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::test_support::db_with_chat;

    fn u(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn append_assigns_sequence_and_updates_preview() {
        let (mut db, chat) = db_with_chat();
        let now = Utc::now();

        let first = db.append_direct_message(chat, &u("u1"), "hi", now).unwrap();
        let second = db.append_direct_message(chat, &u("u2"), "hey", now).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);

        let stored = db.get_direct_chat(chat).unwrap();
        let preview = stored.last_message.unwrap();
        assert_eq!(preview.text, "hey");
        assert_eq!(preview.sender_id, u("u2"));
    }

    #[test]
    fn created_at_never_goes_backwards() {
        let (mut db, chat) = db_with_chat();
        let now = Utc::now();

        let first = db.append_direct_message(chat, &u("u1"), "a", now).unwrap();
        let earlier = now - Duration::seconds(30);
        let second = db.append_direct_message(chat, &u("u1"), "b", earlier).unwrap();
        assert!(second.created_at >= first.created_at);
    }

    #[test]
    fn append_to_missing_chat_writes_nothing() {
        let (mut db, _) = db_with_chat();
        let ghost = ChatId::for_pair(&u("u3"), &u("u4"));

        assert!(matches!(
            db.append_direct_message(ghost, &u("u3"), "hi", Utc::now()),
            Err(StoreError::NotFound)
        ));
        assert!(db.list_direct_messages(ghost).unwrap().is_empty());
    }

    #[test]
    fn seq_is_not_reused_after_delete() {
        let (mut db, chat) = db_with_chat();
        db.append_direct_message(chat, &u("u1"), "a", Utc::now()).unwrap();
        let b = db.append_direct_message(chat, &u("u1"), "b", Utc::now()).unwrap();
        db.delete_direct_message(b.id).unwrap();

        let c = db.append_direct_message(chat, &u("u1"), "c", Utc::now()).unwrap();
        assert_eq!(c.seq, 3);
    }

    #[test]
    fn history_is_ordered() {
        let (mut db, chat) = db_with_chat();
        for text in ["one", "two", "three"] {
            db.append_direct_message(chat, &u("u1"), text, Utc::now()).unwrap();
        }
        let texts: Vec<_> = db
            .list_direct_messages(chat)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn read_marking_and_counting() {
        let (mut db, chat) = db_with_chat();
        db.append_direct_message(chat, &u("u1"), "hi", Utc::now()).unwrap();
        db.append_direct_message(chat, &u("u1"), "there", Utc::now()).unwrap();
        db.append_direct_message(chat, &u("u2"), "yo", Utc::now()).unwrap();

        assert_eq!(db.count_direct_unread(chat, &u("u2")).unwrap(), 2);
        assert_eq!(db.count_direct_unread(chat, &u("u1")).unwrap(), 1);

        assert_eq!(db.mark_direct_read(chat, &u("u2")).unwrap(), 2);
        assert_eq!(db.mark_direct_read(chat, &u("u2")).unwrap(), 0);
        assert_eq!(db.count_direct_unread(chat, &u("u2")).unwrap(), 0);
        assert_eq!(db.count_direct_unread(chat, &u("u1")).unwrap(), 1);
    }

    #[test]
    fn delete_keeps_preview() {
        let (mut db, chat) = db_with_chat();
        let msg = db.append_direct_message(chat, &u("u1"), "oops", Utc::now()).unwrap();

        assert!(db.delete_direct_message(msg.id).unwrap());
        assert!(!db.delete_direct_message(msg.id).unwrap());
        assert!(db.find_direct_message(msg.id).unwrap().is_none());

        let preview = db.get_direct_chat(chat).unwrap().last_message.unwrap();
        assert_eq!(preview.text, "oops");
    }
}
