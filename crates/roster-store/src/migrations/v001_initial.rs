//! v001 -- Initial schema creation.
//!
//! Creates the recipient tables: `contacts`, `hidden_recipients`,
//! `group_models`, `story_lists` (with members and tombstones) and
//! `call_links`, and seeds the "My Story" list.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Contacts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    row_id              INTEGER PRIMARY KEY AUTOINCREMENT,
    aci                 TEXT UNIQUE,              -- UUID
    pni                 TEXT UNIQUE,              -- UUID
    e164                TEXT UNIQUE,              -- "+15550000001"
    is_registered       INTEGER NOT NULL DEFAULT 1,
    unregistered_at_ms  INTEGER,
    username            TEXT,
    profile_key         TEXT,                     -- hex-encoded 32 bytes
    profile_given_name  TEXT,
    profile_family_name TEXT,
    nickname_given      TEXT,
    nickname_family     TEXT,
    note                TEXT,
    system_given_name   TEXT,
    system_family_name  TEXT,
    system_nickname     TEXT,
    identity_key        TEXT,                     -- hex-encoded 32 bytes
    identity_state      INTEGER NOT NULL DEFAULT 0,
    is_blocked          INTEGER NOT NULL DEFAULT 0,
    is_whitelisted      INTEGER NOT NULL DEFAULT 0,
    hide_story          INTEGER NOT NULL DEFAULT 0
);

-- ----------------------------------------------------------------
-- Hidden recipients
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS hidden_recipients (
    contact_row_id                 INTEGER PRIMARY KEY NOT NULL,
    in_known_message_request_state INTEGER NOT NULL DEFAULT 0,
    hidden_at                      TEXT NOT NULL,

    FOREIGN KEY (contact_row_id) REFERENCES contacts(row_id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS group_models (
    group_id                    TEXT PRIMARY KEY NOT NULL,  -- hex-encoded 32 bytes
    master_key                  BLOB NOT NULL,
    title                       TEXT,
    description                 TEXT,
    avatar_url                  TEXT,
    disappearing_timer_secs     INTEGER NOT NULL DEFAULT 0,
    access_attributes           INTEGER NOT NULL DEFAULT 0,
    access_members              INTEGER NOT NULL DEFAULT 0,
    access_add_from_invite_link INTEGER NOT NULL DEFAULT 0,
    revision                    INTEGER NOT NULL DEFAULT 0,
    announcements_only          INTEGER NOT NULL DEFAULT 0,
    invite_link_password        BLOB,
    members                     TEXT NOT NULL,              -- JSON
    invited_members             TEXT NOT NULL,              -- JSON
    requesting_members          TEXT NOT NULL,              -- JSON
    banned_members              TEXT NOT NULL,              -- JSON
    is_whitelisted              INTEGER NOT NULL DEFAULT 0,
    is_blocked                  INTEGER NOT NULL DEFAULT 0,
    hide_story                  INTEGER NOT NULL DEFAULT 0,
    story_send_mode             INTEGER NOT NULL DEFAULT 0
);

-- ----------------------------------------------------------------
-- Story distribution lists
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS story_lists (
    distribution_id TEXT PRIMARY KEY NOT NULL,  -- UUID, nil for My Story
    name            TEXT NOT NULL,
    allow_replies   INTEGER NOT NULL DEFAULT 1,
    privacy_mode    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS story_list_members (
    distribution_id TEXT NOT NULL,
    contact_row_id  INTEGER NOT NULL,

    PRIMARY KEY (distribution_id, contact_row_id),
    FOREIGN KEY (distribution_id) REFERENCES story_lists(distribution_id) ON DELETE CASCADE,
    FOREIGN KEY (contact_row_id) REFERENCES contacts(row_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS story_list_tombstones (
    distribution_id TEXT PRIMARY KEY NOT NULL,
    deleted_at_ms   INTEGER NOT NULL
);

INSERT OR IGNORE INTO story_lists (distribution_id, name, allow_replies, privacy_mode)
VALUES ('00000000-0000-0000-0000-000000000000', '', 1, 3);

-- ----------------------------------------------------------------
-- Call links
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS call_links (
    row_id                INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id               TEXT UNIQUE NOT NULL,   -- hex-encoded 32 bytes
    root_key              BLOB NOT NULL,
    admin_passkey         BLOB,
    admin_deleted_at_ms   INTEGER,
    name                  TEXT,
    restrictions          INTEGER,
    revoked               INTEGER,
    expiration_ms         INTEGER,
    is_upcoming           INTEGER NOT NULL DEFAULT 0,
    pending_fetch_counter INTEGER NOT NULL DEFAULT 0
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
