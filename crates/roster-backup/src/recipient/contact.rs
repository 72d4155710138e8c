use std::ops::ControlFlow;

use roster_shared::protocol::{
    AvatarColor, Contact, Destination, Frame, IdentityState, Name, Recipient, Registration, Visibility,
};
use roster_shared::{
    Aci, ArchivingAddress, ContactAddress, E164, IdentityKey, Pni, ProfileKey, RecipientId,
};
use roster_store::{ContactRecord, StoreTx, ThreadKind};

use super::{mismatched, restore_result, ArchivePass, RecipientArchiver, RecipientCategory};
use crate::context::{ArchivingContext, RestoringContext};
use crate::error::{
    ArchiveCategory, ArchiveFrameError, ArchiveFrameErrorKind, ArchiveMultiFrameResult, Cancelled,
    InvalidProtoData, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::followup::FollowUpTask;
use crate::frame_io::FrameSink;
use crate::post_restore::PostRestoreAction;

/// Individual contacts, with their profile, nickname, system-contact and
/// identity details.
pub struct ContactArchiver;

impl RecipientArchiver for ContactArchiver {
    fn category(&self) -> RecipientCategory {
        RecipientCategory::Contact
    }

    fn archive(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        let mut pass = ArchivePass::default();
        let enumeration = tx.enumerate_contacts(|contact| {
            if !pass.proceed(ctx) {
                return ControlFlow::Break(());
            }
            pass.record(archive_contact(tx, &contact, sink, ctx));
            ControlFlow::Continue(())
        });
        pass.finish(ArchiveCategory::Recipient(self.category()), enumeration)
    }

    fn restore(&self, recipient: &Recipient, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        restore_result(recipient, restore_contact(recipient, tx, ctx))
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

fn archive_contact(
    tx: &StoreTx<'_>,
    contact: &ContactRecord,
    sink: &mut dyn FrameSink,
    ctx: &mut ArchivingContext,
) -> Result<(), ArchiveFrameError> {
    // Rows without identifiers can't be addressed from the rest of the
    // backup, and our own row is covered by the self recipient.
    let Some(address) = contact.address() else {
        tracing::debug!(row_id = contact.row_id, "skipping contact without identifiers");
        return Ok(());
    };
    if ctx
        .local()
        .contains_any_of(address.aci(), address.e164(), address.pni())
    {
        return Ok(());
    }

    let fail = |kind| ArchiveFrameError::recipient(ArchivingAddress::Contact(address.clone()), kind);
    let visibility = visibility(tx, contact).map_err(|e| fail(ArchiveFrameErrorKind::Store(e)))?;

    let registration = if contact.is_registered {
        Registration::Registered
    } else {
        Registration::NotRegistered {
            unregistered_timestamp: contact.unregistered_at_ms.unwrap_or(0),
        }
    };

    let nickname = if contact.nickname_given.is_some() || contact.nickname_family.is_some() {
        Some(Name {
            given: contact.nickname_given.clone(),
            family: contact.nickname_family.clone(),
        })
    } else {
        None
    };

    let payload = Contact {
        aci: contact.aci.map(|aci| aci.to_bytes()),
        pni: contact.pni.map(|pni| pni.to_bytes()),
        e164: contact.e164.as_ref().map(E164::to_u64),
        username: contact.username.clone(),
        profile_key: contact.profile_key.map(|key| key.0.to_vec()),
        profile_sharing: contact.is_whitelisted,
        blocked: contact.is_blocked,
        hide_story: contact.hide_story,
        visibility: visibility.into(),
        registration: Some(registration),
        profile_given_name: contact.profile_given_name.clone(),
        profile_family_name: contact.profile_family_name.clone(),
        nickname,
        note: contact.note.clone(),
        system_given_name: contact.system_given_name.clone(),
        system_family_name: contact.system_family_name.clone(),
        system_nickname: contact.system_nickname.clone(),
        identity_key: contact.identity_key.map(|key| key.0.to_vec()),
        identity_state: contact.identity_state.into(),
        avatar_color: Some(contact.avatar_color_or_default().into()),
    };

    let id = ctx.assign_recipient_id(&ArchivingAddress::Contact(address.clone()));
    let frame = Frame::recipient(Recipient {
        id: id.0,
        destination: Some(Destination::Contact(payload)),
    });
    sink.write_frame(&frame)
        .map_err(|e| fail(ArchiveFrameErrorKind::Write(e)))
}

/// A hidden contact whose 1:1 chat is still a message request is archived
/// as such, so the request survives the restore.
fn visibility(tx: &StoreTx<'_>, contact: &ContactRecord) -> Result<Visibility, roster_store::StoreError> {
    let Some(hidden) = tx.get_hidden_recipient(contact.row_id)? else {
        return Ok(Visibility::Visible);
    };
    if hidden.in_known_message_request_state {
        return Ok(Visibility::HiddenMessageRequest);
    }
    let pending_request = tx
        .find_thread(&ThreadKind::Contact {
            contact_row_id: contact.row_id,
        })?
        .is_some_and(|thread| thread.has_pending_message_request);
    Ok(if pending_request {
        Visibility::HiddenMessageRequest
    } else {
        Visibility::Hidden
    })
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

fn restore_contact(
    recipient: &Recipient,
    tx: &StoreTx<'_>,
    ctx: &mut RestoringContext,
) -> Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind> {
    let Some(Destination::Contact(contact)) = &recipient.destination else {
        return Err(mismatched(RecipientCategory::Contact));
    };
    let recipient_id = RecipientId(recipient.id);

    let aci = contact
        .aci
        .as_deref()
        .map(Aci::from_bytes)
        .transpose()
        .map_err(InvalidProtoData::InvalidAci)?;
    let pni = contact
        .pni
        .as_deref()
        .map(Pni::from_bytes)
        .transpose()
        .map_err(InvalidProtoData::InvalidPni)?;
    let e164 = contact
        .e164
        .map(E164::from_u64)
        .transpose()
        .map_err(InvalidProtoData::InvalidE164)?;
    let profile_key = contact
        .profile_key
        .as_deref()
        .map(ProfileKey::from_bytes)
        .transpose()
        .map_err(InvalidProtoData::InvalidProfileKey)?;
    let identity_key = contact
        .identity_key
        .as_deref()
        .map(IdentityKey::from_bytes)
        .transpose()
        .map_err(|_| InvalidProtoData::InvalidIdentityKey)?;

    let address = ContactAddress::new(aci, pni, e164.clone()).ok_or(InvalidProtoData::ContactWithoutIdentifiers)?;
    if ctx
        .local()
        .contains_any_of(address.aci(), address.e164(), address.pni())
    {
        return Err(InvalidProtoData::OtherContactWithLocalIdentifiers.into());
    }

    // Values from newer clients fall back to the safest reading.
    let identity_state = IdentityState::try_from(contact.identity_state).unwrap_or(IdentityState::Default);
    let visibility = Visibility::try_from(contact.visibility).unwrap_or(Visibility::Visible);
    let (is_registered, unregistered_at_ms) = match &contact.registration {
        Some(Registration::NotRegistered { unregistered_timestamp }) => {
            (false, Some(*unregistered_timestamp).filter(|ts| *ts > 0))
        }
        Some(Registration::Registered) | None => (true, None),
    };
    let nickname = contact.nickname.clone().unwrap_or_default();
    let avatar_color = contact.avatar_color.and_then(|value| AvatarColor::try_from(value).ok());

    let record = ContactRecord {
        row_id: 0,
        aci,
        pni,
        e164,
        is_registered,
        unregistered_at_ms,
        username: contact.username.clone(),
        profile_key,
        profile_given_name: contact.profile_given_name.clone(),
        profile_family_name: contact.profile_family_name.clone(),
        nickname_given: nickname.given,
        nickname_family: nickname.family,
        note: contact.note.clone(),
        system_given_name: contact.system_given_name.clone(),
        system_family_name: contact.system_family_name.clone(),
        system_nickname: contact.system_nickname.clone(),
        identity_key,
        identity_state,
        is_blocked: contact.blocked,
        is_whitelisted: contact.profile_sharing,
        hide_story: contact.hide_story,
        avatar_color,
    };
    let row_id = tx.insert_contact(&record)?;

    ctx.bind(recipient_id, ArchivingAddress::Contact(address))?;
    ctx.set_contact_row(recipient_id, row_id);

    let mut partial = Vec::new();
    match visibility {
        Visibility::Visible => {}
        Visibility::Hidden | Visibility::HiddenMessageRequest => {
            let in_request = visibility == Visibility::HiddenMessageRequest;
            match tx.set_contact_hidden(row_id, in_request) {
                Ok(()) => ctx.add_post_restore_action(PostRestoreAction::InsertContactHiddenInfoMessage {
                    recipient_id,
                }),
                Err(err) => partial.push(RestoreFrameErrorKind::DatabaseInsertionFailed(err)),
            }
        }
    }

    if let Some(aci) = aci {
        ctx.schedule_follow_up(FollowUpTask::FetchProfile { aci });
    }
    Ok(partial)
}
