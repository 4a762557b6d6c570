//! CRUD operations for [`Notification`] records.

use rusqlite::params;

use huddle_shared::{GroupId, NotificationId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Notification;
use crate::rows::{fmt_ts, ts_at, uuid_at};

impl Database {
    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.conn().execute(
            "INSERT INTO notifications
                 (id, target_user_id, kind, group_id, group_name, message, created_at, read)
             VALUES (?1, ?2, 'group_invite', ?3, ?4, ?5, ?6, ?7)",
            params![
                notification.id.0.to_string(),
                notification.target_user_id.as_str(),
                notification.group_id.0.to_string(),
                notification.group_name,
                notification.message,
                fmt_ts(&notification.created_at),
                notification.read as i64,
            ],
        )?;
        Ok(())
    }

    /// Notifications addressed to `user`, newest first.
    pub fn list_notifications_for_user(&self, user: &UserId) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, target_user_id, group_id, group_name, message, created_at, read
             FROM notifications
             WHERE target_user_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], row_to_notification)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Mark one of `user`'s notifications as read.  Returns `false` if no
    /// such notification belongs to them.
    pub fn mark_notification_read(&self, id: NotificationId, user: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND target_user_id = ?2",
            params![id.0.to_string(), user.as_str()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let read: i64 = row.get(6)?;
    Ok(Notification {
        id: NotificationId(uuid_at(row, 0)?),
        target_user_id: UserId(row.get(1)?),
        group_id: GroupId(uuid_at(row, 2)?),
        group_name: row.get(3)?,
        message: row.get(4)?,
        created_at: ts_at(row, 5)?,
        read: read != 0,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn invite(target: &str, offset_secs: i64) -> Notification {
        Notification {
            id: NotificationId::new(),
            target_user_id: UserId::from(target),
            group_id: GroupId::new(),
            group_name: "crew".into(),
            message: "You were added to crew".into(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
            read: false,
        }
    }

    #[test]
    fn list_newest_first_per_user() {
        let db = Database::open_in_memory().unwrap();
        let older = invite("u4", 0);
        let newer = invite("u4", 5);
        db.insert_notification(&older).unwrap();
        db.insert_notification(&newer).unwrap();
        db.insert_notification(&invite("u2", 0)).unwrap();

        let list = db.list_notifications_for_user(&UserId::from("u4")).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[1].id, older.id);
    }

    #[test]
    fn mark_read_only_for_target() {
        let db = Database::open_in_memory().unwrap();
        let n = invite("u4", 0);
        db.insert_notification(&n).unwrap();

        assert!(!db.mark_notification_read(n.id, &UserId::from("u2")).unwrap());
        assert!(db.mark_notification_read(n.id, &UserId::from("u4")).unwrap());

        let list = db.list_notifications_for_user(&UserId::from("u4")).unwrap();
        assert!(list[0].read);
    }
}
