//! CRUD operations for story distribution lists and their tombstones.

use std::ops::ControlFlow;

use rusqlite::{params, OptionalExtension};
use roster_shared::protocol::PrivacyMode;
use roster_shared::DistributionId;
use uuid::Uuid;

use crate::database::{bad_column, StoreTx};
use crate::error::Result;
use crate::models::{StoryListRecord, StoryListTombstone};

impl StoreTx<'_> {
    // ------------------------------------------------------------------
    // Create / update
    // ------------------------------------------------------------------

    /// Insert a new story list.  Fails if the distribution id is taken.
    pub fn insert_story_list(&self, list: &StoryListRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO story_lists (distribution_id, name, allow_replies, privacy_mode)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                list.distribution_id.0.to_string(),
                list.name,
                list.allow_replies,
                i32::from(list.privacy_mode),
            ],
        )?;
        self.replace_story_list_members(&list.distribution_id, &list.member_row_ids)
    }

    /// Insert a story list, or overwrite the existing list with the same
    /// distribution id (this is how "My Story" gets its restored settings).
    pub fn upsert_story_list(&self, list: &StoryListRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO story_lists (distribution_id, name, allow_replies, privacy_mode)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(distribution_id) DO UPDATE SET
                 name = excluded.name,
                 allow_replies = excluded.allow_replies,
                 privacy_mode = excluded.privacy_mode",
            params![
                list.distribution_id.0.to_string(),
                list.name,
                list.allow_replies,
                i32::from(list.privacy_mode),
            ],
        )?;
        self.replace_story_list_members(&list.distribution_id, &list.member_row_ids)
    }

    fn replace_story_list_members(&self, distribution_id: &DistributionId, member_row_ids: &[i64]) -> Result<()> {
        let id = distribution_id.0.to_string();
        self.conn().execute(
            "DELETE FROM story_list_members WHERE distribution_id = ?1",
            params![id],
        )?;
        let mut stmt = self.conn().prepare(
            "INSERT OR IGNORE INTO story_list_members (distribution_id, contact_row_id)
             VALUES (?1, ?2)",
        )?;
        for row_id in member_row_ids {
            stmt.execute(params![id, row_id])?;
        }
        Ok(())
    }

    /// Record a deleted list.  Recording the same tombstone twice is a no-op.
    pub fn insert_story_list_tombstone(&self, tombstone: &StoryListTombstone) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO story_list_tombstones (distribution_id, deleted_at_ms)
             VALUES (?1, ?2)",
            params![tombstone.distribution_id.0.to_string(), tombstone.deleted_at_ms as i64],
        )?;
        Ok(())
    }

    /// Delete a list and leave a tombstone in its place.
    pub fn delete_story_list(&self, distribution_id: &DistributionId, deleted_at_ms: u64) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM story_lists WHERE distribution_id = ?1",
            params![distribution_id.0.to_string()],
        )?;
        if affected > 0 {
            self.insert_story_list_tombstone(&StoryListTombstone {
                distribution_id: *distribution_id,
                deleted_at_ms,
            })?;
        }
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_story_list(&self, distribution_id: &DistributionId) -> Result<Option<StoryListRecord>> {
        let list = self
            .conn()
            .query_row(
                "SELECT distribution_id, name, allow_replies, privacy_mode
                 FROM story_lists
                 WHERE distribution_id = ?1",
                params![distribution_id.0.to_string()],
                row_to_story_list,
            )
            .optional()?;

        match list {
            Some(mut list) => {
                list.member_row_ids = self.story_list_member_row_ids(&list.distribution_id)?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    /// Visit every live list, ordered by distribution id, until `visit`
    /// breaks.
    pub fn enumerate_story_lists<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(StoryListRecord) -> ControlFlow<()>,
    {
        // Collected first so member lookups don't overlap the outer cursor.
        let mut lists = Vec::new();
        self.for_each_row(
            "SELECT distribution_id, name, allow_replies, privacy_mode
             FROM story_lists
             ORDER BY distribution_id ASC",
            [],
            row_to_story_list,
            |list| {
                lists.push(list);
                ControlFlow::Continue(())
            },
        )?;

        for mut list in lists {
            list.member_row_ids = self.story_list_member_row_ids(&list.distribution_id)?;
            if visit(list).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Visit every tombstone, ordered by distribution id.
    pub fn enumerate_story_list_tombstones<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(StoryListTombstone) -> ControlFlow<()>,
    {
        self.for_each_row(
            "SELECT distribution_id, deleted_at_ms
             FROM story_list_tombstones
             ORDER BY distribution_id ASC",
            [],
            |row| {
                Ok(StoryListTombstone {
                    distribution_id: distribution_id_column(row, 0)?,
                    deleted_at_ms: row.get::<_, i64>(1)? as u64,
                })
            },
            visit,
        )
    }

    fn story_list_member_row_ids(&self, distribution_id: &DistributionId) -> Result<Vec<i64>> {
        let mut stmt = self.conn().prepare(
            "SELECT contact_row_id
             FROM story_list_members
             WHERE distribution_id = ?1
             ORDER BY contact_row_id ASC",
        )?;
        let rows = stmt.query_map(params![distribution_id.0.to_string()], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn distribution_id_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DistributionId> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map(DistributionId)
        .map_err(|e| bad_column(idx, e))
}

/// Map a `rusqlite::Row` to a [`StoryListRecord`] without its members.
fn row_to_story_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoryListRecord> {
    let privacy_mode =
        PrivacyMode::try_from(row.get::<_, i32>(3)?).map_err(|e| bad_column(3, e))?;
    Ok(StoryListRecord {
        distribution_id: distribution_id_column(row, 0)?,
        name: row.get(1)?,
        allow_replies: row.get(2)?,
        privacy_mode,
        member_row_ids: Vec::new(),
    })
}
