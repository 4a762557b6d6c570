//! v001 -- Initial schema creation.
//!
//! Creates the user directory plus the direct and group chat collections.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (identity directory, read-only to the chat core)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- auth-provider uid
    username     TEXT NOT NULL UNIQUE,
    display_name TEXT,
    avatar_ref   TEXT,
    created_at   TEXT NOT NULL,               -- RFC-3339
    updated_at   TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Direct chats (exactly two participants, stored sorted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS direct_chats (
    id              TEXT PRIMARY KEY NOT NULL, -- UUIDv5 of the sorted pair
    participant_lo  TEXT NOT NULL,
    participant_hi  TEXT NOT NULL,
    lo_name         TEXT NOT NULL,             -- profile snapshot at creation
    lo_avatar       TEXT,
    hi_name         TEXT NOT NULL,
    hi_avatar       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    last_text       TEXT,                      -- denormalized preview
    last_sender     TEXT,
    last_at         TEXT,
    last_seq        INTEGER NOT NULL DEFAULT 0, -- highest seq ever assigned

    UNIQUE (participant_lo, participant_hi),
    CHECK (participant_lo < participant_hi)
);

CREATE INDEX IF NOT EXISTS idx_direct_chats_lo ON direct_chats(participant_lo);
CREATE INDEX IF NOT EXISTS idx_direct_chats_hi ON direct_chats(participant_hi);

-- ----------------------------------------------------------------
-- Direct messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS direct_messages (
    id          TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    chat_id     TEXT NOT NULL,                 -- FK -> direct_chats(id)
    seq         INTEGER NOT NULL,              -- per-chat ordering key
    sender_id   TEXT NOT NULL,
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    read        INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1

    UNIQUE (chat_id, seq),
    FOREIGN KEY (chat_id) REFERENCES direct_chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_direct_messages_unread
    ON direct_messages(chat_id, read, sender_id);

-- ----------------------------------------------------------------
-- Group chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_chats (
    id          TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    name        TEXT NOT NULL,
    owner_id    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    last_text   TEXT,
    last_sender TEXT,
    last_at     TEXT,
    last_seq    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id     TEXT NOT NULL,                -- FK -> group_chats(id)
    user_id      TEXT NOT NULL,
    join_seq     INTEGER NOT NULL,             -- insertion order within the group
    display_name TEXT NOT NULL,                -- profile snapshot
    avatar_ref   TEXT,
    joined_at    TEXT NOT NULL,

    PRIMARY KEY (group_id, user_id),
    FOREIGN KEY (group_id) REFERENCES group_chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id);

CREATE TABLE IF NOT EXISTS group_messages (
    id          TEXT PRIMARY KEY NOT NULL,
    group_id    TEXT NOT NULL,
    seq         INTEGER NOT NULL,
    sender_id   TEXT NOT NULL,
    sender_name TEXT NOT NULL,                 -- snapshot at send time
    text        TEXT NOT NULL,
    created_at  TEXT NOT NULL,

    UNIQUE (group_id, seq),
    FOREIGN KEY (group_id) REFERENCES group_chats(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS group_message_reads (
    message_id TEXT NOT NULL,                  -- FK -> group_messages(id)
    user_id    TEXT NOT NULL,
    read_at    TEXT NOT NULL,

    PRIMARY KEY (message_id, user_id),
    FOREIGN KEY (message_id) REFERENCES group_messages(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
