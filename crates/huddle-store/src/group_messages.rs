use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use huddle_shared::{GroupId, MessageId, UserId};

use crate::database::Database;
use crate::direct_messages::next_position;
use crate::error::{Result, StoreError};
use crate::models::GroupMessage;
use crate::rows::{fmt_ts, ts_at, uuid_at};

const MESSAGE_COLUMNS: &str = "id, group_id, seq, sender_id, sender_name, text, created_at";

impl Database {
    /// Append a group message, record the sender as its first reader and
    /// refresh the group preview, all in one transaction.
    pub fn append_group_message(
        &mut self,
        group_id: GroupId,
        sender: &UserId,
        sender_name: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<GroupMessage> {
        let tx = self.conn_mut().transaction()?;
        let group_key = group_id.0.to_string();

        let (seq, created_at) = next_position(
            &tx,
            "SELECT last_seq, last_at FROM group_chats WHERE id = ?1",
            &group_key,
            now,
        )?;

        let message = GroupMessage {
            id: MessageId::new(),
            group_id,
            seq,
            sender_id: sender.clone(),
            sender_name: sender_name.to_string(),
            text: text.to_string(),
            created_at,
            read_by: BTreeSet::from([sender.clone()]),
        };

        tx.execute(
            "INSERT INTO group_messages
                 (id, group_id, seq, sender_id, sender_name, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.0.to_string(),
                group_key,
                seq,
                sender.as_str(),
                message.sender_name,
                message.text,
                fmt_ts(&created_at),
            ],
        )?;

        tx.execute(
            "INSERT INTO group_message_reads (message_id, user_id, read_at)
             VALUES (?1, ?2, ?3)",
            params![message.id.0.to_string(), sender.as_str(), fmt_ts(&created_at)],
        )?;

        tx.execute(
            "UPDATE group_chats
             SET last_text = ?1, last_sender = ?2, last_at = ?3, updated_at = ?3, last_seq = ?4
             WHERE id = ?5",
            params![message.text, sender.as_str(), fmt_ts(&created_at), seq, group_key],
        )?;

        tx.commit()?;
        Ok(message)
    }

    /// Full history of a group in ascending `seq` order, with readers.
    pub fn list_group_messages(&self, group_id: GroupId) -> Result<Vec<GroupMessage>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM group_messages
             WHERE group_id = ?1
             ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![group_id.0.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            let mut message = row?;
            message.read_by = load_readers(self.conn(), message.id)?;
            messages.push(message);
        }
        Ok(messages)
    }

    pub fn find_group_message(&self, id: MessageId) -> Result<Option<GroupMessage>> {
        let message = self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM group_messages WHERE id = ?1"),
                params![id.0.to_string()],
                row_to_message,
            )
            .optional()?;

        match message {
            Some(mut message) => {
                message.read_by = load_readers(self.conn(), id)?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    pub fn delete_group_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM group_messages WHERE id = ?1",
            params![id.0.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Add `reader` to `read_by` of every message they did not send and have
    /// not read yet.  Returns the number of messages that changed.
    pub fn mark_group_read(
        &self,
        group_id: GroupId,
        reader: &UserId,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO group_message_reads (message_id, user_id, read_at)
             SELECT id, ?2, ?3 FROM group_messages
             WHERE group_id = ?1 AND sender_id != ?2",
            params![group_id.0.to_string(), reader.as_str(), fmt_ts(&now)],
        )?;
        Ok(affected)
    }

    pub fn count_group_unread(&self, group_id: GroupId, user: &UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM group_messages m
             WHERE m.group_id = ?1 AND m.sender_id != ?2
               AND NOT EXISTS (
                   SELECT 1 FROM group_message_reads r
                   WHERE r.message_id = m.id AND r.user_id = ?2
               )",
            params![group_id.0.to_string(), user.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

fn load_readers(conn: &Connection, message_id: MessageId) -> Result<BTreeSet<UserId>> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM group_message_reads WHERE message_id = ?1")?;
    let rows = stmt.query_map(params![message_id.0.to_string()], |row| {
        Ok(UserId(row.get(0)?))
    })?;
    rows.collect::<std::result::Result<BTreeSet<_>, _>>()
        .map_err(StoreError::Sqlite)
}

/// Map a `rusqlite::Row` to a [`GroupMessage`] without readers.
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupMessage> {
    Ok(GroupMessage {
        id: MessageId(uuid_at(row, 0)?),
        group_id: GroupId(uuid_at(row, 1)?),
        seq: row.get(2)?,
        sender_id: UserId(row.get(3)?),
        sender_name: row.get(4)?,
        text: row.get(5)?,
        created_at: ts_at(row, 6)?,
        read_by: BTreeSet::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::db_with_group;

    fn u(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn sender_is_first_reader() {
        let (mut db, group) = db_with_group();
        let msg = db
            .append_group_message(group, &u("u1"), "alice", "hello", Utc::now())
            .unwrap();
        assert_eq!(msg.read_by, BTreeSet::from([u("u1")]));

        let stored = db.find_group_message(msg.id).unwrap().unwrap();
        assert_eq!(stored, msg);

        let preview = db.get_group(group).unwrap().last_message.unwrap();
        assert_eq!(preview.text, "hello");
    }

    #[test]
    fn unread_and_mark_read() {
        let (mut db, group) = db_with_group();
        db.append_group_message(group, &u("u1"), "alice", "a", Utc::now()).unwrap();
        db.append_group_message(group, &u("u2"), "bob", "b", Utc::now()).unwrap();

        assert_eq!(db.count_group_unread(group, &u("u1")).unwrap(), 1);
        assert_eq!(db.count_group_unread(group, &u("u3")).unwrap(), 2);

        assert_eq!(db.mark_group_read(group, &u("u3"), Utc::now()).unwrap(), 2);
        assert_eq!(db.mark_group_read(group, &u("u3"), Utc::now()).unwrap(), 0);
        assert_eq!(db.count_group_unread(group, &u("u3")).unwrap(), 0);
        assert_eq!(db.count_group_unread(group, &u("u2")).unwrap(), 1);

        let history = db.list_group_messages(group).unwrap();
        assert!(history.iter().all(|m| m.read_by.contains(&u("u3"))));
    }

    #[test]
    fn append_to_missing_group() {
        let (mut db, _) = db_with_group();
        let err = db
            .append_group_message(GroupId::new(), &u("u1"), "alice", "x", Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn deleting_group_cascades() {
        let (mut db, group) = db_with_group();
        let msg = db
            .append_group_message(group, &u("u1"), "alice", "bye", Utc::now())
            .unwrap();
        db.mark_group_read(group, &u("u2"), Utc::now()).unwrap();

        assert!(db.delete_group(group).unwrap());
        assert!(db.find_group_message(msg.id).unwrap().is_none());
        let reads: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM group_message_reads", [], |row| row.get(0))
            .unwrap();
        assert_eq!(reads, 0);
    }

    #[test]
    fn delete_message() {
        let (mut db, group) = db_with_group();
        let msg = db
            .append_group_message(group, &u("u2"), "bob", "x", Utc::now())
            .unwrap();
        assert!(db.delete_group_message(msg.id).unwrap());
        assert!(db.list_group_messages(group).unwrap().is_empty());
    }
}
