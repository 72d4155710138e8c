//! Persistent queue of post-restore fetch jobs.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{bad_column, StoreTx};
use crate::error::Result;
use crate::models::{FetchJob, FetchJobKind};

impl StoreTx<'_> {
    /// Append a job and return its id.
    pub fn enqueue_fetch_job(&self, kind: &FetchJobKind) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO fetch_jobs (payload, enqueued_at) VALUES (?1, ?2)",
            params![serde_json::to_string(kind)?, Utc::now().to_rfc3339()],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// List pending jobs in enqueue order.
    pub fn list_fetch_jobs(&self) -> Result<Vec<FetchJob>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, payload, enqueued_at FROM fetch_jobs ORDER BY id ASC")?;

        let rows = stmt.query_map([], |row| {
            let payload: String = row.get(1)?;
            let enqueued_str: String = row.get(2)?;
            Ok(FetchJob {
                id: row.get(0)?,
                kind: serde_json::from_str(&payload).map_err(|e| bad_column(1, e))?,
                enqueued_at: DateTime::parse_from_rfc3339(&enqueued_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| bad_column(2, e))?,
            })
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    /// Remove a finished job.  Returns `true` if it existed.
    pub fn complete_fetch_job(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM fetch_jobs WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}
