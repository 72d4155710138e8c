use roster_shared::protocol::{Destination, Frame, Recipient, SelfRecipient};
use roster_shared::{ArchivingAddress, RecipientId};
use roster_store::StoreTx;

use super::{mismatched, restore_result, RecipientArchiver, RecipientCategory};
use crate::context::{ArchivingContext, RestoringContext};
use crate::error::{
    ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, Cancelled, RestoreFrameErrorKind,
    RestoreFrameResult,
};
use crate::frame_io::FrameSink;

/// The device owner. Always written first, always with the reserved id.
pub struct LocalArchiver;

impl RecipientArchiver for LocalArchiver {
    fn category(&self) -> RecipientCategory {
        RecipientCategory::Local
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

        let id = ctx.assign_recipient_id(&ArchivingAddress::Local);
        let frame = Frame::recipient(Recipient {
            id: id.0,
            destination: Some(Destination::SelfRecipient(SelfRecipient {})),
        });
        match sink.write_frame(&frame) {
            Ok(()) => Ok(ArchiveMultiFrameResult::Success),
            Err(err) => Ok(ArchiveMultiFrameResult::PartialSuccess(vec![ArchiveFrameError::recipient(
                ArchivingAddress::Local,
                ArchiveFrameErrorKind::Write(err),
            )])),
        }
    }

    fn restore(&self, recipient: &Recipient, _tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        restore_result(recipient, restore_local(recipient, ctx))
    }
}

fn restore_local(recipient: &Recipient, ctx: &mut RestoringContext) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let Some(Destination::SelfRecipient(_)) = &recipient.destination else {
        return Err(mismatched(RecipientCategory::Local));
    };
    ctx.mark_self_recipient_seen()?;
    ctx.bind(RecipientId(recipient.id), ArchivingAddress::Local)?;
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use roster_shared::{Aci, LocalIdentifiers};
    use roster_store::Database;
    use uuid::Uuid;

    #[test]
    fn archives_reserved_id_and_restores_once() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let local = LocalIdentifiers::new(Aci(Uuid::from_u128(1)), None, None);

        let mut sink: Vec<Frame> = Vec::new();
        let mut actx = ArchivingContext::new(local.clone(), 0, CancellationToken::new());
        LocalArchiver.archive(&tx, &mut sink, &mut actx).unwrap();
        let Some(roster_shared::protocol::FrameItem::Recipient(recipient)) = sink[0].item.clone() else {
            panic!("expected a recipient frame");
        };
        assert_eq!(recipient.id, RecipientId::LOCAL.0);

        let mut rctx = RestoringContext::new(local, 0, CancellationToken::new());
        assert!(LocalArchiver.restore(&recipient, &tx, &mut rctx).is_success());
        assert_eq!(rctx.resolve(RecipientId::LOCAL), Some(&ArchivingAddress::Local));

        let again = Recipient { id: 5, ..recipient };
        assert!(matches!(
            LocalArchiver.restore(&again, &tx, &mut rctx),
            RestoreFrameResult::Failure(_)
        ));
    }
}
