//! CRUD operations for [`CallLinkRecord`] rows.

use std::ops::ControlFlow;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension};
use roster_shared::protocol::CallLinkRestrictions;
use roster_shared::{CallLinkRootKey, CallLinkRoomId};

use crate::database::{bad_column, StoreTx};
use crate::error::Result;
use crate::models::CallLinkRecord;

const CALL_LINK_COLUMNS: &str = "row_id, root_key, admin_passkey, admin_deleted_at_ms, name,
     restrictions, revoked, expiration_ms, is_upcoming, pending_fetch_counter";

impl StoreTx<'_> {
    /// Insert a call link and return its row id.  The room id is unique.
    pub fn insert_call_link(&self, link: &CallLinkRecord) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO call_links (room_id, root_key, admin_passkey, admin_deleted_at_ms, name,
                 restrictions, revoked, expiration_ms, is_upcoming, pending_fetch_counter)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                link.room_id.to_hex(),
                link.root_key.0.to_vec(),
                link.admin_passkey,
                link.admin_deleted_at_ms.map(|ms| ms as i64),
                link.name,
                link.restrictions.map(i32::from),
                link.revoked,
                link.expiration.map(|dt| dt.timestamp_millis()),
                link.is_upcoming,
                link.pending_fetch_counter,
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Persist the mutable state of an existing link.
    pub fn update_call_link(&self, link: &CallLinkRecord) -> Result<()> {
        self.conn().execute(
            "UPDATE call_links SET admin_passkey = ?2, admin_deleted_at_ms = ?3, name = ?4,
                 restrictions = ?5, revoked = ?6, expiration_ms = ?7, is_upcoming = ?8,
                 pending_fetch_counter = ?9
             WHERE row_id = ?1",
            params![
                link.row_id,
                link.admin_passkey,
                link.admin_deleted_at_ms.map(|ms| ms as i64),
                link.name,
                link.restrictions.map(i32::from),
                link.revoked,
                link.expiration.map(|dt| dt.timestamp_millis()),
                link.is_upcoming,
                link.pending_fetch_counter,
            ],
        )?;
        Ok(())
    }

    pub fn get_call_link(&self, room_id: &CallLinkRoomId) -> Result<Option<CallLinkRecord>> {
        let link = self
            .conn()
            .query_row(
                &format!("SELECT {CALL_LINK_COLUMNS} FROM call_links WHERE room_id = ?1"),
                params![room_id.to_hex()],
                row_to_call_link,
            )
            .optional()?;
        Ok(link)
    }

    /// Visit every call link in row-id order until `visit` breaks.
    pub fn enumerate_call_links<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(CallLinkRecord) -> ControlFlow<()>,
    {
        self.for_each_row(
            &format!("SELECT {CALL_LINK_COLUMNS} FROM call_links ORDER BY row_id ASC"),
            [],
            row_to_call_link,
            visit,
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`CallLinkRecord`].  The room id is derived
/// from the root key rather than read back.
fn row_to_call_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallLinkRecord> {
    let root_key_bytes: Vec<u8> = row.get(1)?;
    let root_key = CallLinkRootKey::from_bytes(&root_key_bytes).map_err(|e| bad_column(1, e))?;

    let restrictions = row
        .get::<_, Option<i32>>(5)?
        .map(CallLinkRestrictions::try_from)
        .transpose()
        .map_err(|e| bad_column(5, e))?;

    let expiration: Option<DateTime<Utc>> = match row.get::<_, Option<i64>>(7)? {
        Some(ms) => Some(
            Utc.timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| bad_column(7, format!("expiration out of range: {ms}")))?,
        ),
        None => None,
    };

    Ok(CallLinkRecord {
        row_id: row.get(0)?,
        room_id: root_key.room_id(),
        root_key,
        admin_passkey: row.get(2)?,
        admin_deleted_at_ms: row.get::<_, Option<i64>>(3)?.map(|ms| ms as u64),
        name: row.get(4)?,
        restrictions,
        revoked: row.get(6)?,
        expiration,
        is_upcoming: row.get(8)?,
        pending_fetch_counter: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn insert_update_and_get() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();

        let expiration = Utc.timestamp_millis_opt(1_800_000_000_000).unwrap();
        let mut link = CallLinkRecord::new_from_backup(
            CallLinkRootKey([9u8; 16]),
            Some(vec![1, 2, 3]),
            Some("Standup".into()),
            Some(CallLinkRestrictions::AdminApproval),
            Some(expiration),
        );
        assert!(link.is_upcoming);

        link.row_id = tx.insert_call_link(&link).unwrap();
        assert_eq!(tx.get_call_link(&link.room_id).unwrap().unwrap(), link);

        link.mark_call_recorded();
        tx.update_call_link(&link).unwrap();
        let fetched = tx.get_call_link(&link.room_id).unwrap().unwrap();
        assert!(!fetched.is_upcoming);
        assert_eq!(fetched.name.as_deref(), Some("Standup"));

        link.mark_deleted(42);
        tx.update_call_link(&link).unwrap();
        let fetched = tx.get_call_link(&link.room_id).unwrap().unwrap();
        assert!(fetched.is_deleted());
        assert!(fetched.admin_passkey.is_none());
        assert!(!fetched.is_upcoming);
    }

    #[test]
    fn tombstone_clears_server_state() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();

        let mut link = CallLinkRecord::new_from_backup(
            CallLinkRootKey([4u8; 16]),
            Some(vec![7, 7]),
            Some("Retro".into()),
            Some(CallLinkRestrictions::None),
            Some(Utc.timestamp_millis_opt(1_900_000_000_000).unwrap()),
        );
        link.revoked = Some(true);
        link.pending_fetch_counter = 3;
        link.row_id = tx.insert_call_link(&link).unwrap();
        assert!(link.is_upcoming);

        link.mark_deleted(1_000);
        tx.update_call_link(&link).unwrap();

        let fetched = tx.get_call_link(&link.room_id).unwrap().unwrap();
        assert!(fetched.is_deleted());
        assert_eq!(fetched.admin_deleted_at_ms, Some(1_000));
        assert_eq!(fetched.name, None);
        assert_eq!(fetched.restrictions, None);
        assert_eq!(fetched.revoked, None);
        assert_eq!(fetched.expiration, None);
        assert_eq!(fetched.admin_passkey, None);
        assert_eq!(fetched.pending_fetch_counter, 0);
        assert!(!fetched.is_upcoming);
    }

    #[test]
    fn duplicate_room_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let link = CallLinkRecord::new(CallLinkRootKey([1u8; 16]));
        tx.insert_call_link(&link).unwrap();
        assert!(tx.insert_call_link(&link).is_err());
    }
}
