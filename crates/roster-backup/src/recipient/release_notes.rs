use roster_shared::protocol::{Destination, Frame, Recipient, ReleaseNotes};
use roster_shared::{ArchivingAddress, RecipientId};
use roster_store::StoreTx;

use super::{mismatched, restore_result, RecipientArchiver, RecipientCategory};
use crate::context::{ArchivingContext, RestoringContext};
use crate::error::{
    ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, Cancelled, RestoreFrameErrorKind,
    RestoreFrameResult,
};
use crate::frame_io::FrameSink;

/// The release-notes channel. There is no channel model yet, so this only
/// reserves an id and round-trips an empty frame.
pub struct ReleaseNotesArchiver;

impl RecipientArchiver for ReleaseNotesArchiver {
    fn category(&self) -> RecipientCategory {
        RecipientCategory::ReleaseNotes
    }

    fn archive(
        &self,
        _tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        if ctx.is_cancelled() {
            return Err(Cancelled);
        }

        let id = ctx.assign_recipient_id(&ArchivingAddress::ReleaseNotes);
        let frame = Frame::recipient(Recipient {
            id: id.0,
            destination: Some(Destination::ReleaseNotes(ReleaseNotes {})),
        });
        match sink.write_frame(&frame) {
            Ok(()) => Ok(ArchiveMultiFrameResult::Success),
            Err(err) => Ok(ArchiveMultiFrameResult::PartialSuccess(vec![ArchiveFrameError::recipient(
                ArchivingAddress::ReleaseNotes,
                ArchiveFrameErrorKind::Write(err),
            )])),
        }
    }

    fn restore(&self, recipient: &Recipient, _tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        restore_result(recipient, restore_release_notes(recipient, ctx))
    }
}

fn restore_release_notes(
    recipient: &Recipient,
    ctx: &mut RestoringContext,
) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let Some(Destination::ReleaseNotes(_)) = &recipient.destination else {
        return Err(mismatched(RecipientCategory::ReleaseNotes));
    };
    ctx.mark_release_notes_seen()?;
    ctx.bind(RecipientId(recipient.id), ArchivingAddress::ReleaseNotes)?;
    Ok(Vec::new())
}
