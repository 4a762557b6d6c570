//! CRUD operations for [`User`] records.

use rusqlite::{params, OptionalExtension};

use huddle_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::rows::{fmt_ts, ts_at};

const USER_COLUMNS: &str = "id, username, display_name, avatar_ref, created_at, updated_at";

impl Database {
    /// Insert a user, or update the profile fields of an existing one.
    /// `created_at` of an existing row is preserved.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, username, display_name, avatar_ref, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 username     = excluded.username,
                 display_name = excluded.display_name,
                 avatar_ref   = excluded.avatar_ref,
                 updated_at   = excluded.updated_at",
            params![
                user.id.as_str(),
                user.username,
                user.display_name,
                user.avatar_ref,
                fmt_ts(&user.created_at),
                fmt_ts(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.as_str()],
                row_to_user,
            )
            .map_err(StoreError::from_query)
    }

    /// Like [`Database::get_user`] but maps a missing row to `None`.
    pub fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.as_str()],
                row_to_user,
            )
            .optional()?)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .optional()?)
    }

    /// Every user except `exclude`, ordered by username.
    pub fn list_users_except(&self, exclude: &UserId) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id != ?1 ORDER BY username ASC"
        ))?;
        let rows = stmt.query_map(params![exclude.as_str()], row_to_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    Ok(User {
        id: UserId(id),
        username: row.get(1)?,
        display_name: row.get(2)?,
        avatar_ref: row.get(3)?,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}
