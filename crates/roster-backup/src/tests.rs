//! End-to-end export/import scenarios against in-memory stores.

use std::collections::VecDeque;
use std::ops::ControlFlow;

use chrono::{TimeZone, Utc};
use ed25519_dalek::SigningKey;
use roster_shared::crypto::derive_backup_key;
use roster_shared::protocol::{
    AvatarColor, Chat, Destination, Frame, FrameItem, IdentityState, MemberRole, Recipient,
    SelfRecipient, StorySendMode,
};
use roster_shared::{
    Aci, CallLinkRootKey, ChatId, ContactAddress, DistributionId, E164, GroupMasterKey, IdentityKey,
    LocalIdentifiers, Pni, ProfileKey, RecipientId,
};
use roster_store::{
    CallLinkRecord, ContactRecord, Database, GroupAccess, GroupMemberRecord, GroupRecord,
    InfoMessageKind, InvitedMemberRecord, StoryListRecord, ThreadKind,
};
use uuid::Uuid;

use crate::error::{
    ArchiveCategory, ArchiveFrameErrorKind, FatalArchiveError, FrameRef, InvalidProtoData,
    RestoreFrameErrorKind,
};
use crate::recipient::RecipientCategory;
use crate::{
    ArchiveOptions, ArchiveOutcome, BackupExporter, BackupImporter, CancellationToken, FollowUpTask,
    FrameReader, FrameWriter, ImportError, RestoreOptions, RestoreReport,
};

fn local() -> LocalIdentifiers {
    LocalIdentifiers::new(
        Aci(Uuid::from_u128(1)),
        Some(Pni(Uuid::from_u128(2))),
        Some(E164::parse("+15550009999").unwrap()),
    )
}

fn fixed_time() -> ArchiveOptions {
    ArchiveOptions {
        backup_time_ms: Some(1_700_000_000_000),
        ..Default::default()
    }
}

fn export(db: &mut Database) -> (Vec<Frame>, ArchiveOutcome) {
    let mut sink: Vec<Frame> = Vec::new();
    let outcome = BackupExporter::new().export(db, &mut sink, &local(), &fixed_time());
    (sink, outcome)
}

fn import(frames: Vec<Frame>) -> (Database, RestoreReport, Vec<FollowUpTask>) {
    let mut db = Database::open_in_memory().unwrap();
    let mut source: VecDeque<Frame> = frames.into();
    let mut queue: Vec<FollowUpTask> = Vec::new();
    let report = BackupImporter::new()
        .import(&mut db, &mut source, &local(), &mut queue, &RestoreOptions::default())
        .unwrap();
    (db, report, queue)
}

fn recipient_ids(frames: &[Frame]) -> Vec<u64> {
    frames
        .iter()
        .filter_map(|frame| match &frame.item {
            Some(FrameItem::Recipient(recipient)) => Some(recipient.id),
            _ => None,
        })
        .collect()
}

fn header() -> Frame {
    Frame::header(roster_shared::protocol::BackupInfo {
        version: roster_shared::constants::BACKUP_VERSION,
        backup_time_ms: 1,
    })
}

fn full_contact(aci: Aci) -> ContactRecord {
    let identity = SigningKey::from_bytes(&[9u8; 32]).verifying_key().to_bytes();
    let mut contact = ContactRecord::new(Some(aci), Some(Pni(Uuid::from_u128(70))), Some(E164::parse("+15550000001").unwrap()));
    contact.username = Some("ada.01".into());
    contact.profile_key = Some(ProfileKey([3u8; 32]));
    contact.profile_given_name = Some("Ada".into());
    contact.profile_family_name = Some("Lovelace".into());
    contact.nickname_given = Some("Countess".into());
    contact.note = Some("met at the analytical engine meetup".into());
    contact.system_given_name = Some("Augusta".into());
    contact.identity_key = Some(IdentityKey(identity));
    contact.identity_state = IdentityState::Verified;
    contact.is_whitelisted = true;
    contact.hide_story = true;
    contact.avatar_color = Some(AvatarColor::A150);
    contact
}

fn group_with_invite(master_key: [u8; 32], inviter: Option<Aci>) -> GroupRecord {
    GroupRecord {
        group_id: GroupMasterKey(master_key).group_id(),
        master_key: master_key.to_vec(),
        title: Some("Book club".into()),
        description: Some("Monthly".into()),
        avatar_url: Some("groups/avatar/1".into()),
        disappearing_timer_secs: 0,
        access: GroupAccess::default(),
        revision: 3,
        announcements_only: false,
        invite_link_password: Some(vec![1, 2, 3]),
        members: vec![GroupMemberRecord {
            aci: local().aci,
            role: MemberRole::Administrator,
            joined_at_revision: 0,
        }],
        invited_members: vec![InvitedMemberRecord {
            aci: Aci(Uuid::from_u128(40)),
            role: MemberRole::Default,
            added_by: inviter,
            timestamp_ms: 1_650_000_000_000,
        }],
        requesting_members: vec![],
        banned_members: vec![],
        is_whitelisted: true,
        is_blocked: false,
        hide_story: false,
        story_send_mode: StorySendMode::Default,
    }
}

#[test]
fn contact_round_trip() {
    let aci = Aci(Uuid::from_u128(7));
    let original = full_contact(aci);

    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        let row_id = tx.insert_contact(&original).unwrap();
        let mut thread = tx.get_or_create_thread(&ThreadKind::Contact { contact_row_id: row_id }).unwrap();
        thread.pinned_order = Some(1);
        thread.mute_until_ms = 5_000;
        tx.update_thread(&thread).unwrap();
        tx.commit().unwrap();
    }

    let (frames, outcome) = export(&mut source);
    assert!(outcome.is_success());
    // Self recipient is 1, so the first contact gets 2.
    assert_eq!(recipient_ids(&frames)[..2], [1, 2]);

    let (mut target, report, follow_ups) = import(frames);
    assert!(report.errors.is_empty());
    assert_eq!(report.chats_restored, 1);
    assert_eq!(follow_ups, vec![FollowUpTask::FetchProfile { aci }]);

    let tx = target.read_tx().unwrap();
    let mut restored = tx.find_contact(&ContactAddress::from_aci(aci)).unwrap().unwrap();
    let restored_row = restored.row_id;
    restored.row_id = original.row_id;
    assert_eq!(restored, original);
    assert!(tx.get_hidden_recipient(restored_row).unwrap().is_none());

    // Each identifier alone still finds the same row.
    let by_pni = ContactAddress::new(None, original.pni, None).unwrap();
    let by_e164 = ContactAddress::new(None, None, original.e164.clone()).unwrap();
    for address in [by_pni, by_e164] {
        let found = tx.find_contact(&address).unwrap().unwrap();
        assert_eq!(found.row_id, restored_row);
    }

    let thread = tx
        .find_thread(&ThreadKind::Contact { contact_row_id: restored_row })
        .unwrap()
        .unwrap();
    assert_eq!(thread.pinned_order, Some(1));
    assert_eq!(thread.mute_until_ms, 5_000);
}

#[test]
fn hidden_contact_gets_notice_in_its_thread() {
    let aci = Aci(Uuid::from_u128(8));
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        let row_id = tx.insert_contact(&ContactRecord::new(Some(aci), None, None)).unwrap();
        tx.set_contact_hidden(row_id, false).unwrap();
        tx.commit().unwrap();
    }

    let (frames, _) = export(&mut source);
    let (mut target, report, _) = import(frames);
    assert!(report.errors.is_empty());

    let tx = target.read_tx().unwrap();
    let contact = tx.find_contact(&ContactAddress::from_aci(aci)).unwrap().unwrap();
    let hidden = tx.get_hidden_recipient(contact.row_id).unwrap().unwrap();
    assert!(!hidden.in_known_message_request_state);

    let thread = tx
        .find_thread(&ThreadKind::Contact { contact_row_id: contact.row_id })
        .unwrap()
        .unwrap();
    let notices = tx.list_info_messages(thread.id).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, InfoMessageKind::ContactHidden);
}

#[test]
fn group_with_invited_member_round_trips() {
    let original = group_with_invite([11u8; 32], Some(local().aci));
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_group(&original).unwrap();
        tx.get_or_create_thread(&ThreadKind::Group { group_id: original.group_id }).unwrap();
        tx.commit().unwrap();
    }

    let (frames, outcome) = export(&mut source);
    assert!(outcome.is_success());

    let (mut target, report, follow_ups) = import(frames);
    assert!(report.errors.is_empty());
    assert_eq!(report.chats_restored, 1);
    assert!(follow_ups.contains(&FollowUpTask::FetchGroupAvatar {
        group_id: original.group_id,
        url: "groups/avatar/1".into(),
    }));

    let tx = target.read_tx().unwrap();
    assert_eq!(tx.get_group(&original.group_id).unwrap().unwrap(), original);
    assert!(tx
        .find_thread(&ThreadKind::Group { group_id: original.group_id })
        .unwrap()
        .is_some());
}

#[test]
fn invited_member_without_inviter_is_left_out() {
    let broken = group_with_invite([12u8; 32], None);
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_group(&broken).unwrap();
        tx.commit().unwrap();
    }

    let (frames, outcome) = export(&mut source);
    let ArchiveOutcome::PartialSuccess(errors) = outcome else {
        panic!("expected partial success");
    };
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].kind, ArchiveFrameErrorKind::MissingRequiredGroupMemberParams));

    let (mut target, report, _) = import(frames);
    assert!(report.errors.is_empty());
    let tx = target.read_tx().unwrap();
    assert!(tx.get_group(&broken.group_id).unwrap().is_none());
}

#[test]
fn deleted_list_exports_identically_and_restores_as_tombstone() {
    let deleted = DistributionId(Uuid::from_u128(90));
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_story_list(&StoryListRecord {
            distribution_id: deleted,
            name: "Old friends".into(),
            allow_replies: true,
            privacy_mode: roster_shared::protocol::PrivacyMode::All,
            member_row_ids: vec![],
        })
        .unwrap();
        assert!(tx.delete_story_list(&deleted, 1234).unwrap());
        tx.commit().unwrap();
    }

    let (first, _) = export(&mut source);
    let (second, _) = export(&mut source);
    assert_eq!(first, second);

    let (mut target, report, _) = import(first);
    assert!(report.errors.is_empty());

    let tx = target.read_tx().unwrap();
    assert!(tx.get_story_list(&deleted).unwrap().is_none());
    let mut tombstones = Vec::new();
    tx.enumerate_story_list_tombstones(|tombstone| {
        tombstones.push(tombstone);
        ControlFlow::Continue(())
    })
    .unwrap();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].distribution_id, deleted);
    assert_eq!(tombstones[0].deleted_at_ms, 1234);
}

#[test]
fn live_call_link_restores_as_upcoming() {
    let root_key = CallLinkRootKey([5u8; 16]);
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        let mut link = CallLinkRecord::new(root_key);
        link.name = Some("Standup".into());
        link.restrictions = Some(roster_shared::protocol::CallLinkRestrictions::AdminApproval);
        link.revoked = Some(false);
        link.expiration = Utc.timestamp_millis_opt(1_800_000_000_000).single();
        tx.insert_call_link(&link).unwrap();

        let mut gone = CallLinkRecord::new(CallLinkRootKey([6u8; 16]));
        gone.mark_deleted(10);
        tx.insert_call_link(&gone).unwrap();
        tx.commit().unwrap();
    }

    let (frames, _) = export(&mut source);
    let (mut target, report, _) = import(frames);
    assert!(report.errors.is_empty());

    let tx = target.read_tx().unwrap();
    let restored = tx.get_call_link(&root_key.room_id()).unwrap().unwrap();
    assert!(restored.is_upcoming);
    assert_eq!(restored.name.as_deref(), Some("Standup"));
    assert_eq!(restored.revoked, Some(false));
    assert!(tx
        .get_call_link(&CallLinkRootKey([6u8; 16]).room_id())
        .unwrap()
        .is_none());
}

#[test]
fn call_link_without_details_round_trips_empty() {
    let root_key = CallLinkRootKey([12u8; 16]);
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_call_link(&CallLinkRecord::new(root_key)).unwrap();
        tx.commit().unwrap();
    }

    let (frames, outcome) = export(&mut source);
    assert!(outcome.is_success());
    let (mut target, report, _) = import(frames);
    assert!(report.errors.is_empty());

    let tx = target.read_tx().unwrap();
    let restored = tx.get_call_link(&root_key.room_id()).unwrap().unwrap();
    assert_eq!(restored.expiration, None);
    assert_eq!(restored.name, None);
    assert_eq!(restored.restrictions, None);
    assert!(restored.is_upcoming);
}

#[test]
fn duplicate_chat_id_keeps_first_thread_state() {
    let chat = |archived| {
        Frame::chat(Chat {
            id: 1,
            recipient_id: 1,
            archived,
            ..Default::default()
        })
    };
    let frames = vec![
        header(),
        Frame::recipient(Recipient {
            id: 1,
            destination: Some(Destination::SelfRecipient(SelfRecipient {})),
        }),
        chat(false),
        chat(true),
    ];

    let (mut target, report, _) = import(frames);
    assert_eq!(report.chats_restored, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].frame, FrameRef::Chat(ChatId(1)));

    let tx = target.read_tx().unwrap();
    let thread = tx.find_thread(&ThreadKind::NoteToSelf).unwrap().unwrap();
    assert!(!thread.is_archived);
}

#[test]
fn recipient_ids_increase_in_frame_order() {
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_contact(&ContactRecord::new(Some(Aci(Uuid::from_u128(20))), None, None)).unwrap();
        tx.insert_contact(&ContactRecord::new(None, None, Some(E164::parse("+15550000002").unwrap())))
            .unwrap();
        tx.insert_group(&group_with_invite([13u8; 32], Some(local().aci))).unwrap();
        tx.insert_call_link(&CallLinkRecord::new(CallLinkRootKey([7u8; 16]))).unwrap();
        tx.commit().unwrap();
    }

    let (frames, outcome) = export(&mut source);
    assert!(outcome.is_success());
    // Self, two contacts, group, My Story, call link, release notes.
    assert_eq!(recipient_ids(&frames), (1..=7).collect::<Vec<_>>());
}

#[test]
fn unresolvable_chat_is_skipped() {
    let frames = vec![
        header(),
        Frame::recipient(Recipient {
            id: 1,
            destination: Some(Destination::SelfRecipient(SelfRecipient {})),
        }),
        Frame::chat(Chat {
            id: 1,
            recipient_id: 42,
            ..Default::default()
        }),
        Frame::chat(Chat {
            id: 2,
            recipient_id: 1,
            ..Default::default()
        }),
    ];

    let (mut target, report, _) = import(frames);
    assert_eq!(report.chats_restored, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].frame, FrameRef::Chat(ChatId(1)));
    assert!(matches!(
        report.errors[0].kind,
        RestoreFrameErrorKind::RecipientIdNotFound(RecipientId(42))
    ));

    let tx = target.read_tx().unwrap();
    assert!(tx.find_thread(&ThreadKind::NoteToSelf).unwrap().is_some());
}

#[test]
fn second_self_recipient_is_rejected() {
    let self_frame = |id| {
        Frame::recipient(Recipient {
            id,
            destination: Some(Destination::SelfRecipient(SelfRecipient {})),
        })
    };
    let (_, report, _) = import(vec![header(), self_frame(1), self_frame(5)]);
    assert_eq!(report.recipients_restored, 1);
    assert!(matches!(
        report.errors[0].kind,
        RestoreFrameErrorKind::InvalidProtoData(InvalidProtoData::DuplicateSelfRecipient)
    ));
}

#[test]
fn sealed_stream_round_trip() {
    let aci = Aci(Uuid::from_u128(9));
    let mut source = Database::open_in_memory().unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_contact(&ContactRecord::new(Some(aci), None, None)).unwrap();
        tx.commit().unwrap();
    }

    let key = derive_backup_key(b"correct horse battery staple");
    let mut writer = FrameWriter::new(Vec::<u8>::new()).with_key(key);
    let outcome = BackupExporter::new().export(&mut source, &mut writer, &local(), &fixed_time());
    assert!(outcome.is_success());
    let bytes = writer.into_inner();

    let mut target = Database::open_in_memory().unwrap();
    let mut reader = FrameReader::new(bytes.as_slice()).with_key(key);
    let report = BackupImporter::new()
        .import(&mut target, &mut reader, &local(), &mut Vec::<FollowUpTask>::new(), &RestoreOptions::default())
        .unwrap();
    assert_eq!(report.backup_time_ms, 1_700_000_000_000);
    assert!(report.errors.is_empty());

    let tx = target.read_tx().unwrap();
    assert!(tx.find_contact(&ContactAddress::from_aci(aci)).unwrap().is_some());
    drop(tx);

    let wrong = derive_backup_key(b"wrong");
    let mut reader = FrameReader::new(bytes.as_slice()).with_key(wrong);
    let result = BackupImporter::new().import(
        &mut Database::open_in_memory().unwrap(),
        &mut reader,
        &local(),
        &mut Vec::<FollowUpTask>::new(),
        &RestoreOptions::default(),
    );
    assert!(matches!(result, Err(ImportError::MissingHeader)));
}

#[test]
fn broken_table_fails_the_whole_export() {
    let mut source = Database::open_in_memory().unwrap();
    source.conn().execute_batch("DROP TABLE call_links").unwrap();

    let (frames, outcome) = export(&mut source);
    let ArchiveOutcome::CompleteFailure(FatalArchiveError::Enumeration { category, .. }) = outcome else {
        panic!("expected complete failure");
    };
    assert_eq!(category, ArchiveCategory::Recipient(RecipientCategory::CallLink));
    // Header, self recipient and My Story were written before the failure.
    assert_eq!(frames.len(), 3);
}

#[test]
fn cancelled_export_stops_after_header() {
    let mut source = Database::open_in_memory().unwrap();
    let cancellation = CancellationToken::new();
    cancellation.cancel();
    let options = ArchiveOptions {
        backup_time_ms: None,
        cancellation,
    };

    let mut sink: Vec<Frame> = Vec::new();
    let outcome = BackupExporter::new().export(&mut source, &mut sink, &local(), &options);
    assert!(matches!(outcome, ArchiveOutcome::Cancelled));
    assert_eq!(sink.len(), 1);
}

#[test]
fn file_backed_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let aci = Aci(Uuid::from_u128(21));

    let mut source = Database::open_at(&dir.path().join("source.db")).unwrap();
    {
        let tx = source.write_tx().unwrap();
        tx.insert_contact(&ContactRecord::new(Some(aci), None, None)).unwrap();
        tx.commit().unwrap();
    }

    let backup_path = dir.path().join("roster.backup");
    let mut writer = FrameWriter::new(std::fs::File::create(&backup_path).unwrap());
    assert!(BackupExporter::new()
        .export(&mut source, &mut writer, &local(), &fixed_time())
        .is_success());
    writer.flush().unwrap();
    drop(writer);

    let target_path = dir.path().join("target.db");
    let mut target = Database::open_at(&target_path).unwrap();
    let mut queue = Database::open_at(&target_path).unwrap();
    let mut reader = FrameReader::new(std::io::BufReader::new(std::fs::File::open(&backup_path).unwrap()));
    let report = BackupImporter::new()
        .import(&mut target, &mut reader, &local(), &mut queue, &RestoreOptions::default())
        .unwrap();
    assert_eq!(report.follow_ups_enqueued, 1);

    let tx = target.read_tx().unwrap();
    assert!(tx.find_contact(&ContactAddress::from_aci(aci)).unwrap().is_some());
    assert_eq!(tx.list_fetch_jobs().unwrap().len(), 1);
}
