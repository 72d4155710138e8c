//! CRUD operations for [`ContactRecord`] and hidden-recipient markers.

use std::ops::ControlFlow;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use roster_shared::protocol::{AvatarColor, IdentityState};
use roster_shared::{Aci, ContactAddress, E164, IdentityKey, Pni, ProfileKey};
use uuid::Uuid;

use crate::database::{bad_column, not_found, StoreTx};
use crate::error::Result;
use crate::models::{ContactRecord, HiddenRecipient};

const CONTACT_COLUMNS: &str = "row_id, aci, pni, e164, is_registered, unregistered_at_ms, username,
     profile_key, profile_given_name, profile_family_name, nickname_given, nickname_family, note,
     system_given_name, system_family_name, system_nickname, identity_key, identity_state,
     is_blocked, is_whitelisted, hide_story, avatar_color";

impl StoreTx<'_> {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a contact and return its new row id.
    ///
    /// Fails if another contact already owns one of its identifiers.
    pub fn insert_contact(&self, contact: &ContactRecord) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO contacts (aci, pni, e164, is_registered, unregistered_at_ms, username,
                 profile_key, profile_given_name, profile_family_name, nickname_given,
                 nickname_family, note, system_given_name, system_family_name, system_nickname,
                 identity_key, identity_state, is_blocked, is_whitelisted, hide_story, avatar_color)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)",
            params![
                contact.aci.map(|a| a.0.to_string()),
                contact.pni.map(|p| p.0.to_string()),
                contact.e164.as_ref().map(|e| e.as_str().to_string()),
                contact.is_registered,
                contact.unregistered_at_ms.map(|ms| ms as i64),
                contact.username,
                contact.profile_key.map(|k| hex::encode(k.0)),
                contact.profile_given_name,
                contact.profile_family_name,
                contact.nickname_given,
                contact.nickname_family,
                contact.note,
                contact.system_given_name,
                contact.system_family_name,
                contact.system_nickname,
                contact.identity_key.map(|k| hex::encode(k.0)),
                i32::from(contact.identity_state),
                contact.is_blocked,
                contact.is_whitelisted,
                contact.hide_story,
                contact.avatar_color.map(i32::from),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Mark a contact hidden. Re-hiding replaces the previous marker.
    pub fn set_contact_hidden(&self, contact_row_id: i64, in_known_message_request_state: bool) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO hidden_recipients
                 (contact_row_id, in_known_message_request_state, hidden_at)
             VALUES (?1, ?2, ?3)",
            params![contact_row_id, in_known_message_request_state, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single contact by row id.
    pub fn get_contact(&self, row_id: i64) -> Result<ContactRecord> {
        self.conn()
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE row_id = ?1"),
                params![row_id],
                row_to_contact,
            )
            .map_err(not_found)
    }

    /// Look a contact up by address, trying ACI first, then phone number,
    /// then PNI.
    pub fn find_contact(&self, address: &ContactAddress) -> Result<Option<ContactRecord>> {
        if let Some(aci) = address.aci() {
            if let Some(found) = self.find_contact_by("aci", aci.0.to_string())? {
                return Ok(Some(found));
            }
        }
        if let Some(e164) = address.e164() {
            if let Some(found) = self.find_contact_by("e164", e164.as_str().to_string())? {
                return Ok(Some(found));
            }
        }
        if let Some(pni) = address.pni() {
            if let Some(found) = self.find_contact_by("pni", pni.0.to_string())? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn find_contact_by(&self, column: &str, value: String) -> Result<Option<ContactRecord>> {
        let found = self
            .conn()
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE {column} = ?1"),
                params![value],
                row_to_contact,
            )
            .optional()?;
        Ok(found)
    }

    /// Visit every contact in row-id order until `visit` breaks.
    pub fn enumerate_contacts<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(ContactRecord) -> ControlFlow<()>,
    {
        self.for_each_row(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY row_id ASC"),
            [],
            row_to_contact,
            visit,
        )
    }

    /// The hidden marker for a contact, if it is hidden.
    pub fn get_hidden_recipient(&self, contact_row_id: i64) -> Result<Option<HiddenRecipient>> {
        let hidden = self
            .conn()
            .query_row(
                "SELECT contact_row_id, in_known_message_request_state
                 FROM hidden_recipients
                 WHERE contact_row_id = ?1",
                params![contact_row_id],
                |row| {
                    Ok(HiddenRecipient {
                        contact_row_id: row.get(0)?,
                        in_known_message_request_state: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(hidden)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Un-hide a contact.  Returns `true` if a marker was removed.
    pub fn clear_contact_hidden(&self, contact_row_id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM hidden_recipients WHERE contact_row_id = ?1",
            params![contact_row_id],
        )?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ContactRecord`].
fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactRecord> {
    let aci = row
        .get::<_, Option<String>>(1)?
        .map(|s| Uuid::parse_str(&s).map(Aci))
        .transpose()
        .map_err(|e| bad_column(1, e))?;
    let pni = row
        .get::<_, Option<String>>(2)?
        .map(|s| Uuid::parse_str(&s).map(Pni))
        .transpose()
        .map_err(|e| bad_column(2, e))?;
    let e164 = row
        .get::<_, Option<String>>(3)?
        .map(|s| E164::parse(&s))
        .transpose()
        .map_err(|e| bad_column(3, e))?;
    let profile_key = row
        .get::<_, Option<String>>(7)?
        .map(|s| {
            let bytes = hex::decode(s).map_err(|e| bad_column(7, e))?;
            ProfileKey::from_bytes(&bytes).map_err(|e| bad_column(7, e))
        })
        .transpose()?;
    let identity_key = row
        .get::<_, Option<String>>(16)?
        .map(|s| {
            let bytes = hex::decode(s).map_err(|e| bad_column(16, e))?;
            IdentityKey::from_bytes(&bytes).map_err(|e| bad_column(16, e))
        })
        .transpose()?;
    let identity_state =
        IdentityState::try_from(row.get::<_, i32>(17)?).map_err(|e| bad_column(17, e))?;
    let avatar_color = row
        .get::<_, Option<i32>>(21)?
        .map(AvatarColor::try_from)
        .transpose()
        .map_err(|e| bad_column(21, e))?;

    Ok(ContactRecord {
        row_id: row.get(0)?,
        aci,
        pni,
        e164,
        is_registered: row.get(4)?,
        unregistered_at_ms: row.get::<_, Option<i64>>(5)?.map(|ms| ms as u64),
        username: row.get(6)?,
        profile_key,
        profile_given_name: row.get(8)?,
        profile_family_name: row.get(9)?,
        nickname_given: row.get(10)?,
        nickname_family: row.get(11)?,
        note: row.get(12)?,
        system_given_name: row.get(13)?,
        system_family_name: row.get(14)?,
        system_nickname: row.get(15)?,
        identity_key,
        identity_state,
        is_blocked: row.get(18)?,
        is_whitelisted: row.get(19)?,
        hide_story: row.get(20)?,
        avatar_color,
    })
}
