use rusqlite::Connection;

// No FK on group_id: an invite outlives the group it points to.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    id             TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    target_user_id TEXT NOT NULL,
    kind           TEXT NOT NULL DEFAULT 'group_invite',
    group_id       TEXT NOT NULL,
    group_name     TEXT NOT NULL,
    message        TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    read           INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_notifications_target
    ON notifications(target_user_id, created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
