use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS threads (
    id                          INTEGER PRIMARY KEY AUTOINCREMENT,
    kind                        TEXT NOT NULL,    -- 'contact' | 'group' | 'note_to_self'
    contact_row_id              INTEGER UNIQUE,
    group_id                    TEXT UNIQUE,
    is_archived                 INTEGER NOT NULL DEFAULT 0,
    pinned_order                INTEGER,
    mute_until_ms               INTEGER NOT NULL DEFAULT 0,
    marked_unread               INTEGER NOT NULL DEFAULT 0,
    has_pending_message_request INTEGER NOT NULL DEFAULT 0,
    created_at                  TEXT NOT NULL,

    FOREIGN KEY (contact_row_id) REFERENCES contacts(row_id) ON DELETE CASCADE,
    FOREIGN KEY (group_id) REFERENCES group_models(group_id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_threads_note_to_self
    ON threads(kind) WHERE kind = 'note_to_self';

CREATE TABLE IF NOT EXISTS info_messages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id     INTEGER NOT NULL,
    kind          TEXT NOT NULL,
    created_at_ms INTEGER NOT NULL,

    FOREIGN KEY (thread_id) REFERENCES threads(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_info_messages_thread ON info_messages(thread_id);

CREATE TABLE IF NOT EXISTS fetch_jobs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    payload     TEXT NOT NULL,                    -- JSON-encoded FetchJobKind
    enqueued_at TEXT NOT NULL                     -- RFC-3339
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
