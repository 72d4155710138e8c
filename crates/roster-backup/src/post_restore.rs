//! Actions queued during restore that need every frame to be in place.

use roster_shared::RecipientId;
use roster_store::{InfoMessageKind, StoreTx, ThreadKind};

use crate::context::RestoringContext;
use crate::error::{DeveloperError, FrameRef, RestoreFrameError, RestoreFrameErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRestoreAction {
    /// Add the "you hid this contact" notice to the contact's thread.
    InsertContactHiddenInfoMessage { recipient_id: RecipientId },
}

/// Drain and run every queued action in the order it was queued.
pub fn run_post_restore_actions(tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> Vec<RestoreFrameError> {
    let actions = ctx.take_post_restore_actions();
    tracing::debug!(count = actions.len(), "running post-restore actions");

    let mut errors = Vec::new();
    for action in actions {
        let PostRestoreAction::InsertContactHiddenInfoMessage { recipient_id } = action;
        if let Err(kind) = insert_contact_hidden_info_message(tx, ctx, recipient_id) {
            errors.push(RestoreFrameError::new(FrameRef::PostRestore(recipient_id), kind));
        }
    }
    errors
}

fn insert_contact_hidden_info_message(
    tx: &StoreTx<'_>,
    ctx: &RestoringContext,
    recipient_id: RecipientId,
) -> Result<(), RestoreFrameErrorKind> {
    let contact_row_id = ctx
        .contact_row(recipient_id)
        .ok_or(DeveloperError::MissingContactRow(recipient_id))?;

    let thread = tx.get_or_create_thread(&ThreadKind::Contact { contact_row_id })?;
    tx.insert_info_message(thread.id, InfoMessageKind::ContactHidden, ctx.start_timestamp_ms())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use roster_shared::{Aci, LocalIdentifiers};
    use roster_store::{ContactRecord, Database};
    use uuid::Uuid;

    #[test]
    fn hidden_info_message_lands_in_contact_thread() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let row_id = tx
            .insert_contact(&ContactRecord::new(Some(Aci(Uuid::from_u128(5))), None, None))
            .unwrap();

        let mut ctx = RestoringContext::new(
            LocalIdentifiers::new(Aci(Uuid::from_u128(1)), None, None),
            777,
            CancellationToken::new(),
        );
        ctx.set_contact_row(RecipientId(2), row_id);
        ctx.add_post_restore_action(PostRestoreAction::InsertContactHiddenInfoMessage {
            recipient_id: RecipientId(2),
        });
        ctx.add_post_restore_action(PostRestoreAction::InsertContactHiddenInfoMessage {
            recipient_id: RecipientId(9),
        });

        let errors = run_post_restore_actions(&tx, &mut ctx);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].frame, FrameRef::PostRestore(RecipientId(9)));

        let thread = tx
            .find_thread(&ThreadKind::Contact { contact_row_id: row_id })
            .unwrap()
            .unwrap();
        let messages = tx.list_info_messages(thread.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].created_at_ms, 777);
    }
}
