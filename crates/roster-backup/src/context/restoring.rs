use std::collections::HashMap;

use roster_shared::{ArchivingAddress, ChatId, GroupId, LocalIdentifiers, RecipientId};

use crate::cancel::CancellationToken;
use crate::error::{DeveloperError, InvalidProtoData};
use crate::followup::FollowUpTask;
use crate::post_restore::PostRestoreAction;

/// Handle to a restored thread, by row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(pub i64);

/// Binds recipient ids to restored addresses during one restore pass, and
/// carries the work that has to wait until every frame is in.
pub struct RestoringContext {
    local: LocalIdentifiers,
    start_timestamp_ms: u64,
    cancellation: CancellationToken,

    recipients: HashMap<RecipientId, ArchivingAddress>,
    contact_rows: HashMap<RecipientId, i64>,
    group_threads: HashMap<GroupId, ThreadHandle>,
    chats: HashMap<ChatId, ThreadHandle>,

    post_restore_actions: Vec<PostRestoreAction>,
    follow_ups: Vec<FollowUpTask>,

    seen_self_recipient: bool,
    seen_release_notes: bool,
}

impl RestoringContext {
    pub fn new(local: LocalIdentifiers, start_timestamp_ms: u64, cancellation: CancellationToken) -> Self {
        Self {
            local,
            start_timestamp_ms,
            cancellation,
            recipients: HashMap::new(),
            contact_rows: HashMap::new(),
            group_threads: HashMap::new(),
            chats: HashMap::new(),
            post_restore_actions: Vec::new(),
            follow_ups: Vec::new(),
            seen_self_recipient: false,
            seen_release_notes: false,
        }
    }

    pub fn local(&self) -> &LocalIdentifiers {
        &self.local
    }

    pub fn start_timestamp_ms(&self) -> u64 {
        self.start_timestamp_ms
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    // ------------------------------------------------------------------
    // Recipient ids
    // ------------------------------------------------------------------

    pub fn is_bound(&self, id: RecipientId) -> bool {
        self.recipients.contains_key(&id)
    }

    /// Each id is declared by exactly one frame; binding it twice means the
    /// duplicate check upstream was skipped.
    pub fn bind(&mut self, id: RecipientId, address: ArchivingAddress) -> Result<(), DeveloperError> {
        if self.recipients.contains_key(&id) {
            return Err(DeveloperError::DuplicateRecipientId(id));
        }
        self.recipients.insert(id, address);
        Ok(())
    }

    pub fn resolve(&self, id: RecipientId) -> Option<&ArchivingAddress> {
        self.recipients.get(&id)
    }

    pub fn set_contact_row(&mut self, id: RecipientId, row_id: i64) {
        self.contact_rows.insert(id, row_id);
    }

    /// Store row of a restored contact.
    pub fn contact_row(&self, id: RecipientId) -> Option<i64> {
        self.contact_rows.get(&id).copied()
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    pub fn cache_group_thread(&mut self, group_id: GroupId, thread: ThreadHandle) {
        self.group_threads.insert(group_id, thread);
    }

    pub fn group_thread(&self, group_id: &GroupId) -> Option<ThreadHandle> {
        self.group_threads.get(group_id).copied()
    }

    pub fn bind_chat(&mut self, id: ChatId, thread: ThreadHandle) -> Result<(), DeveloperError> {
        if self.chats.contains_key(&id) {
            return Err(DeveloperError::DuplicateChatId(id));
        }
        self.chats.insert(id, thread);
        Ok(())
    }

    pub fn chat_thread(&self, id: ChatId) -> Option<ThreadHandle> {
        self.chats.get(&id).copied()
    }

    // ------------------------------------------------------------------
    // Singletons
    // ------------------------------------------------------------------

    pub fn mark_self_recipient_seen(&mut self) -> Result<(), InvalidProtoData> {
        if std::mem::replace(&mut self.seen_self_recipient, true) {
            return Err(InvalidProtoData::DuplicateSelfRecipient);
        }
        Ok(())
    }

    pub fn mark_release_notes_seen(&mut self) -> Result<(), InvalidProtoData> {
        if std::mem::replace(&mut self.seen_release_notes, true) {
            return Err(InvalidProtoData::DuplicateReleaseNotes);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deferred work
    // ------------------------------------------------------------------

    pub fn add_post_restore_action(&mut self, action: PostRestoreAction) {
        self.post_restore_actions.push(action);
    }

    pub fn take_post_restore_actions(&mut self) -> Vec<PostRestoreAction> {
        std::mem::take(&mut self.post_restore_actions)
    }

    pub fn schedule_follow_up(&mut self, task: FollowUpTask) {
        self.follow_ups.push(task);
    }

    pub fn take_follow_ups(&mut self) -> Vec<FollowUpTask> {
        std::mem::take(&mut self.follow_ups)
    }
}
