use std::ops::ControlFlow;

use roster_shared::protocol::{
    Destination, DistributionList, DistributionListItem, DistributionListKind, Frame, PrivacyMode,
    Recipient,
};
use roster_shared::{ArchivingAddress, DistributionId, RecipientId};
use roster_store::{StoreError, StoreTx, StoryListRecord, StoryListTombstone};

use super::{mismatched, restore_result, ArchivePass, RecipientArchiver, RecipientCategory};
use crate::context::{ArchivingContext, RestoringContext};
use crate::error::{
    ArchiveCategory, ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, Cancelled,
    DeveloperError, InvalidProtoData, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::frame_io::FrameSink;

/// Story distribution lists, including "My Story" and tombstones of deleted
/// lists. Member ids refer to contacts, so this runs after the contacts.
pub struct DistributionListArchiver;

impl RecipientArchiver for DistributionListArchiver {
    fn category(&self) -> RecipientCategory {
        RecipientCategory::DistributionList
    }

    fn archive(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        let mut pass = ArchivePass::default();
        let lists = tx.enumerate_story_lists(|list| {
            if !pass.proceed(ctx) {
                return ControlFlow::Break(());
            }
            pass.record(archive_list(tx, &list, sink, ctx));
            ControlFlow::Continue(())
        });
        let enumeration = lists.and_then(|()| {
            tx.enumerate_story_list_tombstones(|tombstone| {
                if !pass.proceed(ctx) {
                    return ControlFlow::Break(());
                }
                pass.record(archive_tombstone(&tombstone, sink, ctx));
                ControlFlow::Continue(())
            })
        });
        pass.finish(ArchiveCategory::Recipient(self.category()), enumeration)
    }

    fn restore(&self, recipient: &Recipient, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        restore_result(recipient, restore_distribution_list(recipient, tx, ctx))
    }
}

/// `All` shares with everyone, so it takes no members; the explicit modes
/// need at least one.
fn privacy_mode_allows(mode: PrivacyMode, count: usize) -> bool {
    match mode {
        PrivacyMode::Unknown => false,
        PrivacyMode::All => count == 0,
        PrivacyMode::OnlyWith | PrivacyMode::AllExcept => count > 0,
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

fn archive_list(
    tx: &StoreTx<'_>,
    list: &StoryListRecord,
    sink: &mut dyn FrameSink,
    ctx: &mut ArchivingContext,
) -> Result<(), ArchiveFrameError> {
    let address = ArchivingAddress::DistributionList(list.distribution_id);
    let fail = |kind| ArchiveFrameError::recipient(address.clone(), kind);

    let count = list.member_row_ids.len();
    if !privacy_mode_allows(list.privacy_mode, count) {
        return Err(fail(ArchiveFrameErrorKind::DistributionListInvalidPrivacyMode {
            mode: list.privacy_mode,
            count,
        }));
    }

    let mut member_ids = Vec::with_capacity(count);
    for &row_id in &list.member_row_ids {
        let contact = tx.get_contact(row_id).map_err(|e| fail(ArchiveFrameErrorKind::Store(e)))?;
        let member = contact
            .address()
            .ok_or_else(|| fail(ArchiveFrameErrorKind::InvalidDistributionListMemberAddress))?;
        let id = ctx
            .recipient_id(&ArchivingAddress::Contact(member))
            .ok_or_else(|| fail(ArchiveFrameErrorKind::ReferencedRecipientIdMissing))?;
        member_ids.push(id.0);
    }

    write_item(
        sink,
        ctx,
        list.distribution_id,
        DistributionListKind::DistributionList(DistributionList {
            name: list.name.clone(),
            allow_replies: list.allow_replies,
            privacy_mode: list.privacy_mode.into(),
            member_recipient_ids: member_ids,
        }),
    )
    .map_err(fail)
}

fn archive_tombstone(
    tombstone: &StoryListTombstone,
    sink: &mut dyn FrameSink,
    ctx: &mut ArchivingContext,
) -> Result<(), ArchiveFrameError> {
    let address = ArchivingAddress::DistributionList(tombstone.distribution_id);
    if tombstone.deleted_at_ms == 0 {
        return Err(ArchiveFrameError::recipient(
            address,
            ArchiveFrameErrorKind::DistributionListMissingDeletionTimestamp,
        ));
    }
    write_item(
        sink,
        ctx,
        tombstone.distribution_id,
        DistributionListKind::DeletionTimestamp(tombstone.deleted_at_ms),
    )
    .map_err(|kind| ArchiveFrameError::recipient(address, kind))
}

fn write_item(
    sink: &mut dyn FrameSink,
    ctx: &mut ArchivingContext,
    distribution_id: DistributionId,
    item: DistributionListKind,
) -> Result<(), ArchiveFrameErrorKind> {
    let id = ctx.assign_recipient_id(&ArchivingAddress::DistributionList(distribution_id));
    let frame = Frame::recipient(Recipient {
        id: id.0,
        destination: Some(Destination::DistributionList(DistributionListItem {
            distribution_id: distribution_id.to_bytes(),
            item: Some(item),
        })),
    });
    sink.write_frame(&frame).map_err(ArchiveFrameErrorKind::Write)
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

fn restore_distribution_list(
    recipient: &Recipient,
    tx: &StoreTx<'_>,
    ctx: &mut RestoringContext,
) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let Some(Destination::DistributionList(item)) = &recipient.destination else {
        return Err(mismatched(RecipientCategory::DistributionList));
    };
    let distribution_id =
        DistributionId::from_bytes(&item.distribution_id).map_err(InvalidProtoData::InvalidDistributionId)?;

    match item.item.as_ref().ok_or(InvalidProtoData::DistributionListItemMissing)? {
        DistributionListKind::DeletionTimestamp(0) => {
            return Err(InvalidProtoData::DistributionListMissingDeletionTimestamp.into());
        }
        DistributionListKind::DeletionTimestamp(deleted_at_ms) => {
            tx.insert_story_list_tombstone(&StoryListTombstone {
                distribution_id,
                deleted_at_ms: *deleted_at_ms,
            })?;
        }
        DistributionListKind::DistributionList(list) => {
            let record = list_record(distribution_id, list, ctx)?;
            store_list(tx, &record)?;
        }
    }

    ctx.bind(RecipientId(recipient.id), ArchivingAddress::DistributionList(distribution_id))?;
    Ok(Vec::new())
}

fn list_record(
    distribution_id: DistributionId,
    list: &DistributionList,
    ctx: &RestoringContext,
) -> Result<StoryListRecord, RestoreFrameErrorKind> {
    let privacy_mode = match PrivacyMode::try_from(list.privacy_mode) {
        Ok(PrivacyMode::Unknown) | Err(_) => {
            return Err(InvalidProtoData::DistributionListUnknownPrivacyMode.into());
        }
        Ok(mode) => mode,
    };
    let count = list.member_recipient_ids.len();
    if !privacy_mode_allows(privacy_mode, count) {
        return Err(InvalidProtoData::DistributionListInvalidPrivacyModeMembers {
            mode: privacy_mode,
            count,
        }
        .into());
    }

    let mut member_row_ids = Vec::with_capacity(count);
    for &raw in &list.member_recipient_ids {
        let member = RecipientId(raw);
        match ctx.resolve(member) {
            None => return Err(RestoreFrameErrorKind::RecipientIdNotFound(member)),
            Some(ArchivingAddress::Contact(_)) => {}
            Some(_) => return Err(InvalidProtoData::InvalidDistributionListMember(member).into()),
        }
        let row_id = ctx
            .contact_row(member)
            .ok_or(DeveloperError::MissingContactRow(member))?;
        member_row_ids.push(row_id);
    }

    Ok(StoryListRecord {
        distribution_id,
        name: list.name.clone(),
        allow_replies: list.allow_replies,
        privacy_mode,
        member_row_ids,
    })
}

/// "My Story" always exists locally, so its restored settings overwrite it.
/// Any other list must be new.
fn store_list(tx: &StoreTx<'_>, record: &StoryListRecord) -> Result<(), StoreError> {
    if record.distribution_id.is_my_story() {
        tx.upsert_story_list(record)
    } else {
        tx.insert_story_list(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::error::RestoreFrameError;
    use roster_shared::protocol::FrameItem;
    use roster_shared::{Aci, ContactAddress, LocalIdentifiers};
    use roster_store::{ContactRecord, Database};
    use uuid::Uuid;

    fn local() -> LocalIdentifiers {
        LocalIdentifiers::new(Aci(Uuid::from_u128(1)), None, None)
    }

    fn list_frame(id: u64, distribution_id: DistributionId, kind: Option<DistributionListKind>) -> Recipient {
        Recipient {
            id,
            destination: Some(Destination::DistributionList(DistributionListItem {
                distribution_id: distribution_id.to_bytes(),
                item: kind,
            })),
        }
    }

    fn failure(result: RestoreFrameResult) -> RestoreFrameError {
        match result {
            RestoreFrameResult::Failure(mut errors) => errors.remove(0),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    fn items(sink: Vec<Frame>) -> Vec<DistributionListItem> {
        sink.into_iter()
            .filter_map(|frame| match frame.item {
                Some(FrameItem::Recipient(Recipient {
                    destination: Some(Destination::DistributionList(item)),
                    ..
                })) => Some(item),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn archive_maps_members_and_writes_tombstones() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let aci = Aci(Uuid::from_u128(7));
        let row_id = tx.insert_contact(&ContactRecord::new(Some(aci), None, None)).unwrap();

        let friends = DistributionId(Uuid::from_u128(50));
        tx.insert_story_list(&StoryListRecord {
            distribution_id: friends,
            name: "Friends".into(),
            allow_replies: true,
            privacy_mode: PrivacyMode::OnlyWith,
            member_row_ids: vec![row_id],
        })
        .unwrap();
        tx.insert_story_list_tombstone(&StoryListTombstone {
            distribution_id: DistributionId(Uuid::from_u128(60)),
            deleted_at_ms: 1234,
        })
        .unwrap();

        let mut ctx = ArchivingContext::new(local(), 0, CancellationToken::new());
        let contact_id = ctx.assign_recipient_id(&ArchivingAddress::Contact(ContactAddress::from_aci(aci)));

        let mut sink: Vec<Frame> = Vec::new();
        let result = DistributionListArchiver.archive(&tx, &mut sink, &mut ctx).unwrap();
        assert!(matches!(result, ArchiveMultiFrameResult::Success));

        let items = items(sink);
        // My Story, Friends, then the tombstone.
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].distribution_id, DistributionId::MY_STORY.to_bytes());
        let Some(DistributionListKind::DistributionList(list)) = &items[1].item else {
            panic!("expected a live list");
        };
        assert_eq!(list.member_recipient_ids, vec![contact_id.0]);
        assert_eq!(items[2].item, Some(DistributionListKind::DeletionTimestamp(1234)));
    }

    #[test]
    fn archive_rejects_bad_lists() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let row_id = tx
            .insert_contact(&ContactRecord::new(Some(Aci(Uuid::from_u128(7))), None, None))
            .unwrap();

        // Member never archived as a contact.
        tx.insert_story_list(&StoryListRecord {
            distribution_id: DistributionId(Uuid::from_u128(50)),
            name: "Orphaned".into(),
            allow_replies: false,
            privacy_mode: PrivacyMode::AllExcept,
            member_row_ids: vec![row_id],
        })
        .unwrap();
        // Explicit mode with nobody in it.
        tx.insert_story_list(&StoryListRecord {
            distribution_id: DistributionId(Uuid::from_u128(51)),
            name: "Empty".into(),
            allow_replies: false,
            privacy_mode: PrivacyMode::OnlyWith,
            member_row_ids: vec![],
        })
        .unwrap();
        tx.insert_story_list_tombstone(&StoryListTombstone {
            distribution_id: DistributionId(Uuid::from_u128(60)),
            deleted_at_ms: 0,
        })
        .unwrap();

        let mut ctx = ArchivingContext::new(local(), 0, CancellationToken::new());
        let mut sink: Vec<Frame> = Vec::new();
        let ArchiveMultiFrameResult::PartialSuccess(errors) =
            DistributionListArchiver.archive(&tx, &mut sink, &mut ctx).unwrap()
        else {
            panic!("expected partial success");
        };

        let kinds: Vec<_> = errors.iter().map(|e| &e.kind).collect();
        assert!(matches!(kinds[0], ArchiveFrameErrorKind::ReferencedRecipientIdMissing));
        assert!(matches!(
            kinds[1],
            ArchiveFrameErrorKind::DistributionListInvalidPrivacyMode { mode: PrivacyMode::OnlyWith, count: 0 }
        ));
        assert!(matches!(kinds[2], ArchiveFrameErrorKind::DistributionListMissingDeletionTimestamp));
        // Only My Story made it out.
        assert_eq!(items(sink).len(), 1);
    }

    #[test]
    fn restore_checks_privacy_mode_against_members() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let mut ctx = RestoringContext::new(local(), 0, CancellationToken::new());

        let row_id = tx
            .insert_contact(&ContactRecord::new(Some(Aci(Uuid::from_u128(7))), None, None))
            .unwrap();
        ctx.bind(
            RecipientId(2),
            ArchivingAddress::Contact(ContactAddress::from_aci(Aci(Uuid::from_u128(7)))),
        )
        .unwrap();
        ctx.set_contact_row(RecipientId(2), row_id);

        let list = |mode: PrivacyMode, members: Vec<u64>| {
            Some(DistributionListKind::DistributionList(DistributionList {
                name: "L".into(),
                allow_replies: true,
                privacy_mode: mode.into(),
                member_recipient_ids: members,
            }))
        };

        let err = failure(DistributionListArchiver.restore(
            &list_frame(3, DistributionId(Uuid::from_u128(50)), list(PrivacyMode::All, vec![2])),
            &tx,
            &mut ctx,
        ));
        assert!(matches!(
            err.kind,
            RestoreFrameErrorKind::InvalidProtoData(InvalidProtoData::DistributionListInvalidPrivacyModeMembers { .. })
        ));

        let err = failure(DistributionListArchiver.restore(
            &list_frame(4, DistributionId(Uuid::from_u128(51)), list(PrivacyMode::Unknown, vec![2])),
            &tx,
            &mut ctx,
        ));
        assert!(matches!(
            err.kind,
            RestoreFrameErrorKind::InvalidProtoData(InvalidProtoData::DistributionListUnknownPrivacyMode)
        ));

        let err = failure(DistributionListArchiver.restore(
            &list_frame(5, DistributionId(Uuid::from_u128(52)), list(PrivacyMode::OnlyWith, vec![9])),
            &tx,
            &mut ctx,
        ));
        assert!(matches!(err.kind, RestoreFrameErrorKind::RecipientIdNotFound(RecipientId(9))));

        let ok = list_frame(6, DistributionId(Uuid::from_u128(53)), list(PrivacyMode::OnlyWith, vec![2]));
        assert!(DistributionListArchiver.restore(&ok, &tx, &mut ctx).is_success());
        let stored = tx.get_story_list(&DistributionId(Uuid::from_u128(53))).unwrap().unwrap();
        assert_eq!(stored.member_row_ids, vec![row_id]);
    }

    #[test]
    fn restore_my_story_overwrites_and_tombstones_stay_tombstones() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.write_tx().unwrap();
        let mut ctx = RestoringContext::new(local(), 0, CancellationToken::new());

        let my_story = list_frame(
            2,
            DistributionId::MY_STORY,
            Some(DistributionListKind::DistributionList(DistributionList {
                name: String::new(),
                allow_replies: false,
                privacy_mode: PrivacyMode::All.into(),
                member_recipient_ids: vec![],
            })),
        );
        assert!(DistributionListArchiver.restore(&my_story, &tx, &mut ctx).is_success());
        assert!(!tx.get_story_list(&DistributionId::MY_STORY).unwrap().unwrap().allow_replies);

        let deleted = DistributionId(Uuid::from_u128(70));
        let tombstone = list_frame(3, deleted, Some(DistributionListKind::DeletionTimestamp(99)));
        assert!(DistributionListArchiver.restore(&tombstone, &tx, &mut ctx).is_success());
        assert!(tx.get_story_list(&deleted).unwrap().is_none());
        assert_eq!(ctx.resolve(RecipientId(3)), Some(&ArchivingAddress::DistributionList(deleted)));

        let zero = list_frame(4, DistributionId(Uuid::from_u128(71)), Some(DistributionListKind::DeletionTimestamp(0)));
        let err = failure(DistributionListArchiver.restore(&zero, &tx, &mut ctx));
        assert!(matches!(
            err.kind,
            RestoreFrameErrorKind::InvalidProtoData(InvalidProtoData::DistributionListMissingDeletionTimestamp)
        ));

        let empty = list_frame(5, DistributionId(Uuid::from_u128(72)), None);
        let err = failure(DistributionListArchiver.restore(&empty, &tx, &mut ctx));
        assert!(matches!(
            err.kind,
            RestoreFrameErrorKind::InvalidProtoData(InvalidProtoData::DistributionListItemMissing)
        ));
    }
}
