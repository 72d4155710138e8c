//! Work handed off after a restore commits.
//!
//! The restore never waits on these; it only enqueues them.

use roster_shared::{Aci, GroupId};
use roster_store::{Database, FetchJobKind, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpTask {
    FetchGroupAvatar { group_id: GroupId, url: String },
    FetchProfile { aci: Aci },
}

impl From<FollowUpTask> for FetchJobKind {
    fn from(task: FollowUpTask) -> Self {
        match task {
            FollowUpTask::FetchGroupAvatar { group_id, url } => FetchJobKind::GroupAvatar {
                group_id,
                avatar_url: url,
            },
            FollowUpTask::FetchProfile { aci } => FetchJobKind::Profile { aci },
        }
    }
}

/// A durable queue that runs avatar and profile fetches later.
pub trait FetchQueue {
    fn enqueue_all(&mut self, tasks: Vec<FollowUpTask>) -> Result<(), StoreError>;
}

/// Persists tasks as `fetch_jobs` rows in one transaction.
impl FetchQueue for Database {
    fn enqueue_all(&mut self, tasks: Vec<FollowUpTask>) -> Result<(), StoreError> {
        let tx = self.write_tx()?;
        for task in tasks {
            tx.enqueue_fetch_job(&task.into())?;
        }
        tx.commit()
    }
}

impl FetchQueue for Vec<FollowUpTask> {
    fn enqueue_all(&mut self, tasks: Vec<FollowUpTask>) -> Result<(), StoreError> {
        self.extend(tasks);
        Ok(())
    }
}
