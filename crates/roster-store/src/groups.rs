//! CRUD operations for [`GroupRecord`] models.

use std::ops::ControlFlow;

use rusqlite::{params, OptionalExtension};
use roster_shared::protocol::{AccessRequired, StorySendMode};
use roster_shared::GroupId;

use crate::database::{bad_column, StoreTx};
use crate::error::Result;
use crate::models::{GroupAccess, GroupRecord};

const GROUP_COLUMNS: &str = "group_id, master_key, title, description, avatar_url,
     disappearing_timer_secs, access_attributes, access_members, access_add_from_invite_link,
     revision, announcements_only, invite_link_password, members, invited_members,
     requesting_members, banned_members, is_whitelisted, is_blocked, hide_story, story_send_mode";

impl StoreTx<'_> {
    /// Insert a group model.  Fails if the group already exists.
    pub fn insert_group(&self, group: &GroupRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO group_models (group_id, master_key, title, description, avatar_url,
                 disappearing_timer_secs, access_attributes, access_members,
                 access_add_from_invite_link, revision, announcements_only, invite_link_password,
                 members, invited_members, requesting_members, banned_members, is_whitelisted,
                 is_blocked, hide_story, story_send_mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20)",
            params![
                group.group_id.to_hex(),
                group.master_key,
                group.title,
                group.description,
                group.avatar_url,
                group.disappearing_timer_secs,
                i32::from(group.access.attributes),
                i32::from(group.access.members),
                i32::from(group.access.add_from_invite_link),
                group.revision,
                group.announcements_only,
                group.invite_link_password,
                serde_json::to_string(&group.members)?,
                serde_json::to_string(&group.invited_members)?,
                serde_json::to_string(&group.requesting_members)?,
                serde_json::to_string(&group.banned_members)?,
                group.is_whitelisted,
                group.is_blocked,
                group.hide_story,
                i32::from(group.story_send_mode),
            ],
        )?;
        Ok(())
    }

    /// Fetch a group by id, if present.
    pub fn get_group(&self, group_id: &GroupId) -> Result<Option<GroupRecord>> {
        let group = self
            .conn()
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM group_models WHERE group_id = ?1"),
                params![group_id.to_hex()],
                row_to_group,
            )
            .optional()?;
        Ok(group)
    }

    /// Visit every group, ordered by id, until `visit` breaks.
    pub fn enumerate_groups<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(GroupRecord) -> ControlFlow<()>,
    {
        self.for_each_row(
            &format!("SELECT {GROUP_COLUMNS} FROM group_models ORDER BY group_id ASC"),
            [],
            row_to_group,
            visit,
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn access_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<AccessRequired> {
    AccessRequired::try_from(row.get::<_, i32>(idx)?).map_err(|e| bad_column(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| bad_column(idx, e))
}

/// Map a `rusqlite::Row` to a [`GroupRecord`].
fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRecord> {
    let id_hex: String = row.get(0)?;
    let id_bytes: [u8; 32] = hex::decode(&id_hex)
        .map_err(|e| bad_column(0, e))?
        .try_into()
        .map_err(|_| bad_column(0, format!("group id has wrong length: {id_hex}")))?;

    let story_send_mode =
        StorySendMode::try_from(row.get::<_, i32>(19)?).map_err(|e| bad_column(19, e))?;

    Ok(GroupRecord {
        group_id: GroupId(id_bytes),
        master_key: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        avatar_url: row.get(4)?,
        disappearing_timer_secs: row.get(5)?,
        access: GroupAccess {
            attributes: access_column(row, 6)?,
            members: access_column(row, 7)?,
            add_from_invite_link: access_column(row, 8)?,
        },
        revision: row.get(9)?,
        announcements_only: row.get(10)?,
        invite_link_password: row.get(11)?,
        members: json_column(row, 12)?,
        invited_members: json_column(row, 13)?,
        requesting_members: json_column(row, 14)?,
        banned_members: json_column(row, 15)?,
        is_whitelisted: row.get(16)?,
        is_blocked: row.get(17)?,
        hide_story: row.get(18)?,
        story_send_mode,
    })
}
