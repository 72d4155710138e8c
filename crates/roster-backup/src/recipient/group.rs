use std::ops::ControlFlow;

use roster_shared::protocol::{
    AccessControl, AccessRequired, Destination, Frame, Group, GroupMember, GroupMemberBanned,
    GroupMemberPendingAdminApproval, GroupMemberPendingProfileKey, GroupSnapshot, MemberRole,
    Recipient, StorySendMode,
};
use roster_shared::{Aci, ArchivingAddress, GroupMasterKey, RecipientId};
use roster_store::{
    BannedMemberRecord, GroupAccess, GroupMemberRecord, GroupRecord, InvitedMemberRecord,
    RequestingMemberRecord, StoreTx, ThreadKind,
};

use super::{mismatched, restore_result, ArchivePass, RecipientArchiver, RecipientCategory};
use crate::context::{ArchivingContext, RestoringContext, ThreadHandle};
use crate::error::{
    ArchiveCategory, ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, Cancelled,
    InvalidProtoData, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::followup::FollowUpTask;
use crate::frame_io::FrameSink;

/// Groups, archived as their master key plus a full state snapshot.
pub struct GroupArchiver;

impl RecipientArchiver for GroupArchiver {
    fn category(&self) -> RecipientCategory {
        RecipientCategory::Group
    }

    fn archive(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        let mut pass = ArchivePass::default();
        let enumeration = tx.enumerate_groups(|group| {
            if !pass.proceed(ctx) {
                return ControlFlow::Break(());
            }
            pass.record(archive_group(&group, sink, ctx));
            ControlFlow::Continue(())
        });
        pass.finish(ArchiveCategory::Recipient(self.category()), enumeration)
    }

    fn restore(&self, recipient: &Recipient, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        restore_result(recipient, restore_group(recipient, tx, ctx))
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

fn archive_group(group: &GroupRecord, sink: &mut dyn FrameSink, ctx: &mut ArchivingContext) -> Result<(), ArchiveFrameError> {
    let address = ArchivingAddress::Group(group.group_id);
    let fail = |kind| ArchiveFrameError::recipient(address.clone(), kind);

    let master_key = GroupMasterKey::from_bytes(&group.master_key).map_err(|e| fail(ArchiveFrameErrorKind::GroupMasterKey(e)))?;

    let mut invited = Vec::with_capacity(group.invited_members.len());
    for member in &group.invited_members {
        let added_by = member
            .added_by
            .ok_or_else(|| fail(ArchiveFrameErrorKind::MissingRequiredGroupMemberParams))?;
        invited.push(GroupMemberPendingProfileKey {
            member: Some(GroupMember {
                user_id: member.aci.to_bytes(),
                role: member.role.into(),
                joined_at_version: 0,
            }),
            added_by_user_id: Some(added_by.to_bytes()),
            timestamp: member.timestamp_ms,
        });
    }

    let snapshot = GroupSnapshot {
        title: group.title.clone(),
        description: group.description.clone(),
        avatar_url: group.avatar_url.clone(),
        disappearing_messages_timer_secs: group.disappearing_timer_secs,
        access_control: Some(AccessControl {
            attributes: group.access.attributes.into(),
            members: group.access.members.into(),
            add_from_invite_link: group.access.add_from_invite_link.into(),
        }),
        version: group.revision,
        members: group
            .members
            .iter()
            .map(|member| GroupMember {
                user_id: member.aci.to_bytes(),
                role: member.role.into(),
                joined_at_version: member.joined_at_revision,
            })
            .collect(),
        members_pending_profile_key: invited,
        members_pending_admin_approval: group
            .requesting_members
            .iter()
            .map(|member| GroupMemberPendingAdminApproval {
                user_id: member.aci.to_bytes(),
                timestamp: member.timestamp_ms,
            })
            .collect(),
        members_banned: group
            .banned_members
            .iter()
            .map(|member| GroupMemberBanned {
                user_id: member.aci.to_bytes(),
                timestamp: member.timestamp_ms,
            })
            .collect(),
        invite_link_password: group.invite_link_password.clone(),
        announcements_only: group.announcements_only,
    };

    let id = ctx.assign_recipient_id(&address);
    let frame = Frame::recipient(Recipient {
        id: id.0,
        destination: Some(Destination::Group(Group {
            master_key: Some(master_key.0.to_vec()),
            whitelisted: group.is_whitelisted,
            hide_story: group.hide_story,
            blocked: group.is_blocked,
            story_send_mode: group.story_send_mode.into(),
            snapshot: Some(snapshot),
        })),
    });
    sink.write_frame(&frame).map_err(|e| fail(ArchiveFrameErrorKind::Write(e)))
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

fn restore_group(
    recipient: &Recipient,
    tx: &StoreTx<'_>,
    ctx: &mut RestoringContext,
) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let Some(Destination::Group(group)) = &recipient.destination else {
        return Err(mismatched(RecipientCategory::Group));
    };

    let master_key = GroupMasterKey::from_bytes(group.master_key.as_deref().unwrap_or_default())
        .map_err(InvalidProtoData::InvalidGroupMasterKey)?;
    let snapshot = group.snapshot.as_ref().ok_or(InvalidProtoData::MissingGroupSnapshot)?;

    let members = snapshot
        .members
        .iter()
        .map(|member| -> Result<_, InvalidProtoData> {
            Ok(GroupMemberRecord {
                aci: member_aci(&member.user_id)?,
                role: member_role(member.role)?,
                joined_at_revision: member.joined_at_version,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let invited_members = snapshot
        .members_pending_profile_key
        .iter()
        .map(|invited| -> Result<_, InvalidProtoData> {
            let (Some(member), Some(added_by)) = (&invited.member, &invited.added_by_user_id) else {
                return Err(InvalidProtoData::MissingRequiredGroupMemberParams);
            };
            Ok(InvitedMemberRecord {
                aci: member_aci(&member.user_id)?,
                role: member_role(member.role)?,
                added_by: Some(member_aci(added_by)?),
                timestamp_ms: invited.timestamp,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let requesting_members = snapshot
        .members_pending_admin_approval
        .iter()
        .map(|member| -> Result<_, InvalidProtoData> {
            Ok(RequestingMemberRecord {
                aci: member_aci(&member.user_id)?,
                timestamp_ms: member.timestamp,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let banned_members = snapshot
        .members_banned
        .iter()
        .map(|member| -> Result<_, InvalidProtoData> {
            Ok(BannedMemberRecord {
                aci: member_aci(&member.user_id)?,
                timestamp_ms: member.timestamp,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let access = match snapshot.access_control {
        Some(access) => GroupAccess {
            attributes: AccessRequired::try_from(access.attributes)?,
            members: AccessRequired::try_from(access.members)?,
            add_from_invite_link: AccessRequired::try_from(access.add_from_invite_link)?,
        },
        None => GroupAccess::default(),
    };

    let group_id = master_key.group_id();
    let record = GroupRecord {
        group_id,
        master_key: master_key.0.to_vec(),
        title: snapshot.title.clone(),
        description: snapshot.description.clone(),
        avatar_url: snapshot.avatar_url.clone(),
        disappearing_timer_secs: snapshot.disappearing_messages_timer_secs,
        access,
        revision: snapshot.version,
        announcements_only: snapshot.announcements_only,
        invite_link_password: snapshot.invite_link_password.clone(),
        members,
        invited_members,
        requesting_members,
        banned_members,
        is_whitelisted: group.whitelisted,
        is_blocked: group.blocked,
        hide_story: group.hide_story,
        story_send_mode: StorySendMode::try_from(group.story_send_mode).unwrap_or(StorySendMode::Default),
    };
    tx.insert_group(&record)?;

    // Chats for this group look the thread up by id, so create it now.
    let thread = tx.get_or_create_thread(&ThreadKind::Group { group_id })?;
    ctx.bind(RecipientId(recipient.id), ArchivingAddress::Group(group_id))?;
    ctx.cache_group_thread(group_id, ThreadHandle(thread.id));

    if let Some(url) = record.avatar_url {
        ctx.schedule_follow_up(FollowUpTask::FetchGroupAvatar { group_id, url });
    }
    Ok(Vec::new())
}

fn member_aci(user_id: &[u8]) -> Result<Aci, InvalidProtoData> {
    Aci::from_bytes(user_id).map_err(InvalidProtoData::InvalidGroupMemberAci)
}

fn member_role(raw: i32) -> Result<MemberRole, InvalidProtoData> {
    match MemberRole::try_from(raw) {
        Ok(MemberRole::Unknown) | Err(_) => Err(InvalidProtoData::GroupMemberRoleUnknown),
        Ok(role) => Ok(role),
    }
}
