//! CRUD operations for [`GroupChat`] records and their membership rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use huddle_shared::{GroupId, UserId};

use crate::database::Database;
use crate::direct_chats::row_to_preview;
use crate::error::{Result, StoreError};
use crate::models::{GroupChat, GroupMember, ProfileSnapshot};
use crate::rows::{fmt_ts, ts_at, uuid_at};

const GROUP_COLUMNS: &str =
    "id, name, owner_id, created_at, updated_at, last_text, last_sender, last_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a group together with its initial members (in the given order).
    pub fn create_group(&mut self, group: &GroupChat) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO group_chats (id, name, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                group.id.0.to_string(),
                group.name,
                group.owner_id.as_str(),
                fmt_ts(&group.created_at),
                fmt_ts(&group.updated_at),
            ],
        )?;

        for (idx, member) in group.members.iter().enumerate() {
            insert_member(&tx, group.id, member, idx as i64 + 1)?;
        }

        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_group(&self, id: GroupId) -> Result<GroupChat> {
        self.find_group(id)?.ok_or(StoreError::NotFound)
    }

    pub fn find_group(&self, id: GroupId) -> Result<Option<GroupChat>> {
        let group = self
            .conn()
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM group_chats WHERE id = ?1"),
                params![id.0.to_string()],
                row_to_group,
            )
            .optional()?;

        match group {
            Some(mut group) => {
                group.members = load_members(self.conn(), id)?;
                Ok(Some(group))
            }
            None => Ok(None),
        }
    }

    /// Groups `user` is a member of, most recently active first.
    pub fn list_groups_for_user(&self, user: &UserId) -> Result<Vec<GroupChat>> {
        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.name, g.owner_id, g.created_at, g.updated_at,
                    g.last_text, g.last_sender, g.last_at
             FROM group_chats g
             JOIN group_members m ON m.group_id = g.id
             WHERE m.user_id = ?1
             ORDER BY g.updated_at DESC",
        )?;
        let rows = stmt.query_map(params![user.as_str()], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            let mut group = row?;
            group.members = load_members(self.conn(), group.id)?;
            groups.push(group);
        }
        Ok(groups)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Append a member at the end of the join order and bump `updated_at`.
    pub fn add_group_member(&mut self, group_id: GroupId, member: &GroupMember) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(join_seq), 0) + 1 FROM group_members WHERE group_id = ?1",
            params![group_id.0.to_string()],
            |row| row.get(0),
        )?;
        insert_member(&tx, group_id, member, next_seq)?;
        touch_group(&tx, group_id, &member.joined_at)?;

        tx.commit()?;
        Ok(())
    }

    /// Remove a non-owner member.  Returns `false` if they were not a member.
    pub fn remove_group_member(
        &mut self,
        group_id: GroupId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;
        let removed = delete_member(&tx, group_id, user)?;
        if removed {
            touch_group(&tx, group_id, &now)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Hand ownership to `new_owner` and remove `old_owner`, atomically.
    pub fn transfer_ownership_and_remove(
        &mut self,
        group_id: GroupId,
        old_owner: &UserId,
        new_owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let updated = tx.execute(
            "UPDATE group_chats SET owner_id = ?1 WHERE id = ?2 AND owner_id = ?3",
            params![new_owner.as_str(), group_id.0.to_string(), old_owner.as_str()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        if !delete_member(&tx, group_id, old_owner)? {
            return Err(StoreError::NotFound);
        }
        touch_group(&tx, group_id, &now)?;

        tx.commit()?;
        Ok(())
    }

    pub fn rename_group(&self, group_id: GroupId, name: &str, now: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE group_chats SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, fmt_ts(&now), group_id.0.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a group with every member row, message and read marker.
    pub fn delete_group(&mut self, group_id: GroupId) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;
        let key = group_id.0.to_string();

        tx.execute(
            "DELETE FROM group_message_reads
             WHERE message_id IN (SELECT id FROM group_messages WHERE group_id = ?1)",
            params![key],
        )?;
        tx.execute("DELETE FROM group_messages WHERE group_id = ?1", params![key])?;
        tx.execute("DELETE FROM group_members WHERE group_id = ?1", params![key])?;
        let affected = tx.execute("DELETE FROM group_chats WHERE id = ?1", params![key])?;

        tx.commit()?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_member(
    conn: &Connection,
    group_id: GroupId,
    member: &GroupMember,
    join_seq: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO group_members
             (group_id, user_id, join_seq, display_name, avatar_ref, joined_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            group_id.0.to_string(),
            member.user_id.as_str(),
            join_seq,
            member.profile.display_name,
            member.profile.avatar_ref,
            fmt_ts(&member.joined_at),
        ],
    )?;
    Ok(())
}

fn delete_member(conn: &Connection, group_id: GroupId, user: &UserId) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
        params![group_id.0.to_string(), user.as_str()],
    )?;
    Ok(affected > 0)
}

fn touch_group(conn: &Connection, group_id: GroupId, now: &DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE group_chats SET updated_at = ?1 WHERE id = ?2",
        params![fmt_ts(now), group_id.0.to_string()],
    )?;
    Ok(())
}

fn load_members(conn: &Connection, group_id: GroupId) -> Result<Vec<GroupMember>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, display_name, avatar_ref, joined_at
         FROM group_members
         WHERE group_id = ?1
         ORDER BY join_seq ASC",
    )?;
    let rows = stmt.query_map(params![group_id.0.to_string()], |row| {
        Ok(GroupMember {
            user_id: UserId(row.get(0)?),
            profile: ProfileSnapshot {
                display_name: row.get(1)?,
                avatar_ref: row.get(2)?,
            },
            joined_at: ts_at(row, 3)?,
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::Sqlite)
}

/// Map a `rusqlite::Row` to a [`GroupChat`] without members.
fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupChat> {
    Ok(GroupChat {
        id: GroupId(uuid_at(row, 0)?),
        name: row.get(1)?,
        owner_id: UserId(row.get(2)?),
        members: Vec::new(),
        created_at: ts_at(row, 3)?,
        updated_at: ts_at(row, 4)?,
        last_message: row_to_preview(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{member, sample_group, seeded_db};

    fn u(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn create_and_get_preserves_join_order() {
        let mut db = seeded_db();
        let group = sample_group("u1", &["u3", "u2"]);
        db.create_group(&group).unwrap();

        let fetched = db.get_group(group.id).unwrap();
        let ids: Vec<_> = fetched.members.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u3", "u2"]);
        assert_eq!(fetched.owner_id, u("u1"));
        assert_eq!(fetched.name, "crew");
    }

    #[test]
    fn add_member_goes_last_and_duplicates_fail() {
        let mut db = seeded_db();
        let group = sample_group("u1", &["u2"]);
        db.create_group(&group).unwrap();

        db.add_group_member(group.id, &member("u4")).unwrap();
        assert!(db.add_group_member(group.id, &member("u4")).is_err());

        let fetched = db.get_group(group.id).unwrap();
        assert_eq!(fetched.members.last().unwrap().user_id, u("u4"));
        assert_eq!(fetched.members.len(), 3);
    }

    #[test]
    fn transfer_then_remove() {
        let mut db = seeded_db();
        let group = sample_group("u1", &["u2", "u3"]);
        db.create_group(&group).unwrap();

        db.transfer_ownership_and_remove(group.id, &u("u1"), &u("u2"), Utc::now())
            .unwrap();
        let fetched = db.get_group(group.id).unwrap();
        assert_eq!(fetched.owner_id, u("u2"));
        assert!(!fetched.is_member(&u("u1")));
    }

    #[test]
    fn transfer_requires_current_owner() {
        let mut db = seeded_db();
        let group = sample_group("u1", &["u2"]);
        db.create_group(&group).unwrap();

        let err = db
            .transfer_ownership_and_remove(group.id, &u("u2"), &u("u1"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert_eq!(db.get_group(group.id).unwrap().owner_id, u("u1"));
    }

    #[test]
    fn list_for_user_and_remove() {
        let mut db = seeded_db();
        let g1 = sample_group("u1", &["u2"]);
        let g2 = sample_group("u3", &["u2"]);
        db.create_group(&g1).unwrap();
        db.create_group(&g2).unwrap();

        assert_eq!(db.list_groups_for_user(&u("u2")).unwrap().len(), 2);
        assert!(db.remove_group_member(g1.id, &u("u2"), Utc::now()).unwrap());
        assert!(!db.remove_group_member(g1.id, &u("u2"), Utc::now()).unwrap());
        assert_eq!(db.list_groups_for_user(&u("u2")).unwrap().len(), 1);
    }

    #[test]
    fn rename_and_delete() {
        let mut db = seeded_db();
        let group = sample_group("u1", &["u2"]);
        db.create_group(&group).unwrap();

        assert!(db.rename_group(group.id, "renamed", Utc::now()).unwrap());
        assert_eq!(db.get_group(group.id).unwrap().name, "renamed");

        assert!(db.delete_group(group.id).unwrap());
        assert!(db.find_group(group.id).unwrap().is_none());
        assert!(db.list_groups_for_user(&u("u1")).unwrap().is_empty());
    }
}
