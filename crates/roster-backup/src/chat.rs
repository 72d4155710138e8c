//! Chat frames: one per thread, pointing at the thread's recipient.
//!
//! Chats are archived after every recipient so their recipient ids always
//! resolve, and restored the same way.

use std::ops::ControlFlow;

use roster_shared::protocol::{Chat, Frame};
use roster_shared::{ArchivingAddress, ChatId, RecipientId};
use roster_store::{StoreError, StoreTx, ThreadKind, ThreadRecord};

use crate::context::{ArchivingContext, RestoringContext, ThreadHandle};
use crate::error::{
    ArchiveCategory, ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, ArchiveTarget,
    Cancelled, DeveloperError, FrameRef, InvalidProtoData, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::frame_io::FrameSink;
use crate::recipient::ArchivePass;

#[derive(Debug, Default)]
pub struct ChatArchiver;

impl ChatArchiver {
    pub fn archive(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        let mut pass = ArchivePass::default();
        let enumeration = tx.enumerate_threads(|thread| {
            if !pass.proceed(ctx) {
                return ControlFlow::Break(());
            }
            pass.record(archive_chat(tx, &thread, sink, ctx));
            ControlFlow::Continue(())
        });
        pass.finish(ArchiveCategory::Chat, enumeration)
    }

    pub fn restore(&self, chat: &Chat, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        RestoreFrameResult::from_outcome(FrameRef::Chat(ChatId(chat.id)), restore_chat(chat, tx, ctx))
    }
}

fn archive_chat(
    tx: &StoreTx<'_>,
    thread: &ThreadRecord,
    sink: &mut dyn FrameSink,
    ctx: &mut ArchivingContext,
) -> Result<(), ArchiveFrameError> {
    let fail = |kind| ArchiveFrameError::new(ArchiveTarget::Chat { thread_id: thread.id }, kind);

    let recipient_id = thread_recipient(tx, thread, ctx)
        .map_err(|e| fail(ArchiveFrameErrorKind::Store(e)))?
        .ok_or_else(|| fail(ArchiveFrameErrorKind::ReferencedRecipientIdMissing))?;

    let id = ctx.assign_chat_id();
    let frame = Frame::chat(Chat {
        id: id.0,
        recipient_id: recipient_id.0,
        archived: thread.is_archived,
        pinned_order: thread.pinned_order,
        mute_until_ms: thread.mute_until_ms,
        marked_unread: thread.marked_unread,
    });
    sink.write_frame(&frame).map_err(|e| fail(ArchiveFrameErrorKind::Write(e)))
}

/// The id the thread's recipient got earlier in this pass, if it got one.
fn thread_recipient(
    tx: &StoreTx<'_>,
    thread: &ThreadRecord,
    ctx: &ArchivingContext,
) -> Result<Option<RecipientId>, StoreError> {
    let address = match &thread.kind {
        ThreadKind::Contact { contact_row_id } => match tx.get_contact(*contact_row_id)?.address() {
            Some(address) => ArchivingAddress::Contact(address),
            None => return Ok(None),
        },
        ThreadKind::Group { group_id } => ArchivingAddress::Group(*group_id),
        ThreadKind::NoteToSelf => ArchivingAddress::Local,
    };
    Ok(ctx.recipient_id(&address))
}

fn restore_chat(
    chat: &Chat,
    tx: &StoreTx<'_>,
    ctx: &mut RestoringContext,
) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let recipient_id = RecipientId(chat.recipient_id);
    let address = ctx
        .resolve(recipient_id)
        .ok_or(RestoreFrameErrorKind::RecipientIdNotFound(recipient_id))?;

    let mut thread = match address {
        ArchivingAddress::Contact(_) => {
            let contact_row_id = ctx
                .contact_row(recipient_id)
                .ok_or(DeveloperError::MissingContactRow(recipient_id))?;
            tx.get_or_create_thread(&ThreadKind::Contact { contact_row_id })?
        }
        ArchivingAddress::Group(group_id) => {
            let handle = ctx
                .group_thread(group_id)
                .ok_or(RestoreFrameErrorKind::ReferencedGroupThreadNotFound(*group_id))?;
            tx.get_thread(handle.0)?
        }
        ArchivingAddress::Local => tx.get_or_create_thread(&ThreadKind::NoteToSelf)?,
        other => return Err(InvalidProtoData::InvalidChatRecipient(other.kind()).into()),
    };

    thread.is_archived = chat.archived;
    thread.pinned_order = chat.pinned_order;
    thread.mute_until_ms = chat.mute_until_ms;
    thread.marked_unread = chat.marked_unread;
    tx.update_thread(&thread)?;

    ctx.bind_chat(ChatId(chat.id), ThreadHandle(thread.id))?;
    Ok(Vec::new())
}
