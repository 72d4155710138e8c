//! CRUD operations for [`ThreadRecord`]s and their [`InfoMessage`]s.

use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use roster_shared::GroupId;

use crate::database::{bad_column, not_found, StoreTx};
use crate::error::Result;
use crate::models::{InfoMessage, InfoMessageKind, ThreadKind, ThreadRecord};

const THREAD_COLUMNS: &str = "id, kind, contact_row_id, group_id, is_archived, pinned_order,
     mute_until_ms, marked_unread, has_pending_message_request, created_at";

impl StoreTx<'_> {
    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Return the thread for `kind`, creating an empty one if needed.
    pub fn get_or_create_thread(&self, kind: &ThreadKind) -> Result<ThreadRecord> {
        if let Some(existing) = self.find_thread(kind)? {
            return Ok(existing);
        }

        let (contact_row_id, group_id) = match kind {
            ThreadKind::Contact { contact_row_id } => (Some(*contact_row_id), None),
            ThreadKind::Group { group_id } => (None, Some(group_id.to_hex())),
            ThreadKind::NoteToSelf => (None, None),
        };
        self.conn().execute(
            "INSERT INTO threads (kind, contact_row_id, group_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![kind.as_str(), contact_row_id, group_id, Utc::now().to_rfc3339()],
        )?;
        self.get_thread(self.conn().last_insert_rowid())
    }

    /// Persist the chat-level settings of a thread.
    pub fn update_thread(&self, thread: &ThreadRecord) -> Result<()> {
        self.conn().execute(
            "UPDATE threads SET is_archived = ?2, pinned_order = ?3, mute_until_ms = ?4,
                 marked_unread = ?5, has_pending_message_request = ?6
             WHERE id = ?1",
            params![
                thread.id,
                thread.is_archived,
                thread.pinned_order,
                thread.mute_until_ms as i64,
                thread.marked_unread,
                thread.has_pending_message_request,
            ],
        )?;
        Ok(())
    }

    /// Append an info message to a thread and return its id.
    pub fn insert_info_message(&self, thread_id: i64, kind: InfoMessageKind, created_at_ms: u64) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO info_messages (thread_id, kind, created_at_ms) VALUES (?1, ?2, ?3)",
            params![thread_id, kind.as_str(), created_at_ms as i64],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_thread(&self, id: i64) -> Result<ThreadRecord> {
        self.conn()
            .query_row(
                &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
                params![id],
                row_to_thread,
            )
            .map_err(not_found)
    }

    pub fn find_thread(&self, kind: &ThreadKind) -> Result<Option<ThreadRecord>> {
        let (clause, value): (&str, rusqlite::types::Value) = match kind {
            ThreadKind::Contact { contact_row_id } => ("contact_row_id = ?1", (*contact_row_id).into()),
            ThreadKind::Group { group_id } => ("group_id = ?1", group_id.to_hex().into()),
            ThreadKind::NoteToSelf => ("kind = ?1", kind.as_str().to_string().into()),
        };
        let thread = self
            .conn()
            .query_row(
                &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE {clause}"),
                params![value],
                row_to_thread,
            )
            .optional()?;
        Ok(thread)
    }

    /// Visit every thread in id order until `visit` breaks.
    pub fn enumerate_threads<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(ThreadRecord) -> ControlFlow<()>,
    {
        self.for_each_row(
            &format!("SELECT {THREAD_COLUMNS} FROM threads ORDER BY id ASC"),
            [],
            row_to_thread,
            visit,
        )
    }

    /// List the info messages of a thread, oldest first.
    pub fn list_info_messages(&self, thread_id: i64) -> Result<Vec<InfoMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, thread_id, kind, created_at_ms
             FROM info_messages
             WHERE thread_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![thread_id], |row| {
            let kind_str: String = row.get(2)?;
            let kind = InfoMessageKind::parse(&kind_str)
                .ok_or_else(|| bad_column(2, format!("unknown info message kind: {kind_str}")))?;
            Ok(InfoMessage {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                kind,
                created_at_ms: row.get::<_, i64>(3)? as u64,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ThreadRecord`].
fn row_to_thread(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadRecord> {
    let kind_str: String = row.get(1)?;
    let kind = match kind_str.as_str() {
        "contact" => {
            let contact_row_id: Option<i64> = row.get(2)?;
            ThreadKind::Contact {
                contact_row_id: contact_row_id.ok_or_else(|| bad_column(2, "contact thread without contact"))?,
            }
        }
        "group" => {
            let hex_id: Option<String> = row.get(3)?;
            let hex_id = hex_id.ok_or_else(|| bad_column(3, "group thread without group"))?;
            let bytes: [u8; 32] = hex::decode(&hex_id)
                .map_err(|e| bad_column(3, e))?
                .try_into()
                .map_err(|_| bad_column(3, format!("group id has wrong length: {hex_id}")))?;
            ThreadKind::Group { group_id: GroupId(bytes) }
        }
        "note_to_self" => ThreadKind::NoteToSelf,
        other => return Err(bad_column(1, format!("unknown thread kind: {other}"))),
    };

    let created_str: String = row.get(9)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| bad_column(9, e))?;

    Ok(ThreadRecord {
        id: row.get(0)?,
        kind,
        is_archived: row.get(4)?,
        pinned_order: row.get(5)?,
        mute_until_ms: row.get::<_, i64>(6)? as u64,
        marked_unread: row.get(7)?,
        has_pending_message_request: row.get(8)?,
        created_at,
    })
}
