use std::ops::ControlFlow;

use chrono::{TimeZone, Utc};
use roster_shared::protocol::{CallLink, CallLinkRestrictions, Destination, Frame, Recipient};
use roster_shared::{ArchivingAddress, CallLinkRootKey, RecipientId};
use roster_store::{CallLinkRecord, StoreTx};

use super::{mismatched, restore_result, ArchivePass, RecipientArchiver, RecipientCategory};
use crate::context::{ArchivingContext, RestoringContext};
use crate::error::{
    ArchiveCategory, ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, Cancelled,
    InvalidProtoData, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::frame_io::FrameSink;

/// Call links the user created or joined. Links the admin deleted are left
/// out of the backup.
pub struct CallLinkArchiver;

impl RecipientArchiver for CallLinkArchiver {
    fn category(&self) -> RecipientCategory {
        RecipientCategory::CallLink
    }

    fn archive(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        let mut pass = ArchivePass::default();
        let enumeration = tx.enumerate_call_links(|link| {
            if !pass.proceed(ctx) {
                return ControlFlow::Break(());
            }
            if link.is_deleted() {
                return ControlFlow::Continue(());
            }
            pass.record(archive_call_link(&link, sink, ctx));
            ControlFlow::Continue(())
        });
        pass.finish(ArchiveCategory::Recipient(self.category()), enumeration)
    }

    fn restore(&self, recipient: &Recipient, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        restore_result(recipient, restore_call_link(recipient, tx, ctx))
    }
}

fn archive_call_link(link: &CallLinkRecord, sink: &mut dyn FrameSink, ctx: &mut ArchivingContext) -> Result<(), ArchiveFrameError> {
    let address = ArchivingAddress::CallLink(link.room_id);
    let id = ctx.assign_recipient_id(&address);
    let frame = Frame::recipient(Recipient {
        id: id.0,
        destination: Some(Destination::CallLink(CallLink {
            root_key: link.root_key.0.to_vec(),
            admin_key: link.admin_passkey.clone(),
            name: link.name.clone().unwrap_or_default(),
            restrictions: link.restrictions.unwrap_or(CallLinkRestrictions::Unknown).into(),
            expiration_ms: link
                .expiration
                .map_or(0, |expiration| expiration.timestamp_millis().max(0) as u64),
        })),
    });
    sink.write_frame(&frame)
        .map_err(|e| ArchiveFrameError::recipient(address, ArchiveFrameErrorKind::Write(e)))
}

fn restore_call_link(
    recipient: &Recipient,
    tx: &StoreTx<'_>,
    ctx: &mut RestoringContext,
) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let Some(Destination::CallLink(link)) = &recipient.destination else {
        return Err(mismatched(RecipientCategory::CallLink));
    };

    let root_key = CallLinkRootKey::from_bytes(&link.root_key).map_err(InvalidProtoData::InvalidCallLinkRootKey)?;
    // Zero values stand for state that was never fetched.
    let restrictions = Some(CallLinkRestrictions::try_from(link.restrictions)?)
        .filter(|restrictions| *restrictions != CallLinkRestrictions::Unknown);
    let expiration = match link.expiration_ms {
        0 => None,
        ms => Some(
            i64::try_from(ms)
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or(InvalidProtoData::InvalidCallLinkExpiration(ms))?,
        ),
    };
    let name = Some(link.name.clone()).filter(|name| !name.is_empty());

    let record = CallLinkRecord::new_from_backup(root_key, link.admin_key.clone(), name, restrictions, expiration);
    tx.insert_call_link(&record)?;

    ctx.bind(RecipientId(recipient.id), ArchivingAddress::CallLink(record.room_id))?;
    Ok(Vec::new())
}
