use std::collections::HashMap;

use roster_shared::constants::{FIRST_ASSIGNED_RECIPIENT_ID, FIRST_CHAT_ID};
use roster_shared::{
    Aci, ArchivingAddress, CallLinkRoomId, ChatId, ContactAddress, DistributionId, E164, GroupId,
    LocalIdentifiers, Pni, RecipientId,
};

use crate::cancel::CancellationToken;

/// Assigns recipient ids during one archive pass and answers
/// address-to-id lookups for frames that reference earlier recipients.
pub struct ArchivingContext {
    local: LocalIdentifiers,
    start_timestamp_ms: u64,
    cancellation: CancellationToken,

    next_recipient_id: u64,
    next_chat_id: u64,

    aci_ids: HashMap<Aci, RecipientId>,
    pni_ids: HashMap<Pni, RecipientId>,
    e164_ids: HashMap<E164, RecipientId>,
    group_ids: HashMap<GroupId, RecipientId>,
    distribution_ids: HashMap<DistributionId, RecipientId>,
    call_link_ids: HashMap<CallLinkRoomId, RecipientId>,
    release_notes_id: Option<RecipientId>,
}

impl ArchivingContext {
    /// The local user's identifiers resolve to [`RecipientId::LOCAL`] from
    /// the start, so contacts pointing at ourselves find the right id.
    pub fn new(local: LocalIdentifiers, start_timestamp_ms: u64, cancellation: CancellationToken) -> Self {
        let mut aci_ids = HashMap::new();
        let mut pni_ids = HashMap::new();
        let mut e164_ids = HashMap::new();
        aci_ids.insert(local.aci, RecipientId::LOCAL);
        if let Some(pni) = local.pni {
            pni_ids.insert(pni, RecipientId::LOCAL);
        }
        if let Some(e164) = &local.e164 {
            e164_ids.insert(e164.clone(), RecipientId::LOCAL);
        }

        Self {
            local,
            start_timestamp_ms,
            cancellation,
            next_recipient_id: FIRST_ASSIGNED_RECIPIENT_ID,
            next_chat_id: FIRST_CHAT_ID,
            aci_ids,
            pni_ids,
            e164_ids,
            group_ids: HashMap::new(),
            distribution_ids: HashMap::new(),
            call_link_ids: HashMap::new(),
            release_notes_id: None,
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

    /// Hand out the next id and record it under every natural key of
    /// `address`. Callers archive each model once, so this never checks for
    /// an existing id. `Local` always gets the reserved id.
    pub fn assign_recipient_id(&mut self, address: &ArchivingAddress) -> RecipientId {
        if matches!(address, ArchivingAddress::Local) {
            return RecipientId::LOCAL;
        }

        let id = RecipientId(self.next_recipient_id);
        self.next_recipient_id += 1;

        match address {
            ArchivingAddress::Contact(contact) => {
                if let Some(aci) = contact.aci() {
                    self.aci_ids.insert(*aci, id);
                }
                if let Some(pni) = contact.pni() {
                    self.pni_ids.insert(*pni, id);
                }
                if let Some(e164) = contact.e164() {
                    self.e164_ids.insert(e164.clone(), id);
                }
            }
            ArchivingAddress::Group(group_id) => {
                self.group_ids.insert(*group_id, id);
            }
            ArchivingAddress::DistributionList(distribution_id) => {
                self.distribution_ids.insert(*distribution_id, id);
            }
            ArchivingAddress::CallLink(room_id) => {
                self.call_link_ids.insert(*room_id, id);
            }
            ArchivingAddress::ReleaseNotes => self.release_notes_id = Some(id),
            ArchivingAddress::Local => {}
        }
        id
    }

    /// Id previously assigned to `address`, if any.
    pub fn recipient_id(&self, address: &ArchivingAddress) -> Option<RecipientId> {
        match address {
            ArchivingAddress::Contact(contact) => self.contact_recipient_id(contact),
            ArchivingAddress::Group(group_id) => self.group_ids.get(group_id).copied(),
            ArchivingAddress::DistributionList(id) => self.distribution_ids.get(id).copied(),
            ArchivingAddress::CallLink(room_id) => self.call_link_ids.get(room_id).copied(),
            ArchivingAddress::Local => Some(RecipientId::LOCAL),
            ArchivingAddress::ReleaseNotes => self.release_notes_id,
        }
    }

    /// ACI is the most durable identifier, then phone number, then PNI.
    fn contact_recipient_id(&self, contact: &ContactAddress) -> Option<RecipientId> {
        contact
            .aci()
            .and_then(|aci| self.aci_ids.get(aci))
            .or_else(|| contact.e164().and_then(|e164| self.e164_ids.get(e164)))
            .or_else(|| contact.pni().and_then(|pni| self.pni_ids.get(pni)))
            .copied()
    }

    pub fn assign_chat_id(&mut self) -> ChatId {
        let id = ChatId(self.next_chat_id);
        self.next_chat_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn local() -> LocalIdentifiers {
        LocalIdentifiers::new(
            Aci(Uuid::from_u128(1)),
            Some(Pni(Uuid::from_u128(2))),
            Some(E164::parse("+15550009999").unwrap()),
        )
    }

    fn context() -> ArchivingContext {
        ArchivingContext::new(local(), 0, CancellationToken::new())
    }

    #[test]
    fn ids_start_after_local_and_increase() {
        let mut ctx = context();
        assert_eq!(ctx.assign_recipient_id(&ArchivingAddress::Local), RecipientId::LOCAL);

        let ids: Vec<_> = (10..15u128)
            .map(|n| ctx.assign_recipient_id(&ArchivingAddress::Contact(ContactAddress::from_aci(Aci(Uuid::from_u128(n))))))
            .collect();
        assert_eq!(ids.first(), Some(&RecipientId(2)));
        assert!(ids.windows(2).all(|w| w[0].0 + 1 == w[1].0));
    }

    #[test]
    fn local_identifiers_resolve_to_local() {
        let ctx = context();
        let by_phone = ContactAddress::new(None, None, Some(E164::parse("+15550009999").unwrap())).unwrap();
        assert_eq!(ctx.recipient_id(&ArchivingAddress::Contact(by_phone)), Some(RecipientId::LOCAL));
    }

    #[test]
    fn contact_lookup_priority() {
        let mut ctx = context();
        let aci = Aci(Uuid::from_u128(20));
        let pni = Pni(Uuid::from_u128(21));
        let e164 = E164::parse("+15550000020").unwrap();

        let full = ContactAddress::new(Some(aci), Some(pni), Some(e164.clone())).unwrap();
        let id = ctx.assign_recipient_id(&ArchivingAddress::Contact(full));

        for partial in [
            ContactAddress::new(Some(aci), None, None),
            ContactAddress::new(None, Some(pni), None),
            ContactAddress::new(None, None, Some(e164.clone())),
        ] {
            let address = ArchivingAddress::Contact(partial.unwrap());
            assert_eq!(ctx.recipient_id(&address), Some(id));
        }

        // A second contact that owns only the phone number loses to the ACI match.
        let other = ctx.assign_recipient_id(&ArchivingAddress::Contact(
            ContactAddress::new(None, None, Some(E164::parse("+15550000021").unwrap())).unwrap(),
        ));
        let mixed = ContactAddress::new(Some(aci), None, Some(E164::parse("+15550000021").unwrap())).unwrap();
        assert_eq!(ctx.recipient_id(&ArchivingAddress::Contact(mixed)), Some(id));
        assert_ne!(id, other);
    }

    #[test]
    fn non_contact_addresses() {
        let mut ctx = context();
        let group = ArchivingAddress::Group(GroupId([4u8; 32]));
        assert_eq!(ctx.recipient_id(&group), None);
        let id = ctx.assign_recipient_id(&group);
        assert_eq!(ctx.recipient_id(&group), Some(id));

        assert_eq!(ctx.recipient_id(&ArchivingAddress::ReleaseNotes), None);
        let notes = ctx.assign_recipient_id(&ArchivingAddress::ReleaseNotes);
        assert_eq!(ctx.recipient_id(&ArchivingAddress::ReleaseNotes), Some(notes));
        assert_eq!(ctx.assign_chat_id(), ChatId(1));
        assert_eq!(ctx.assign_chat_id(), ChatId(2));
    }
}
