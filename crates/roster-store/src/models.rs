//! Domain model structs persisted in the local database.
//!
//! Every struct derives `Serialize` and `Deserialize`; the group membership
//! lists are stored as JSON columns.

use chrono::{DateTime, Utc};
use roster_shared::protocol::{
    AccessRequired, AvatarColor, CallLinkRestrictions, IdentityState, MemberRole, PrivacyMode,
    StorySendMode,
};
use roster_shared::{
    Aci, CallLinkRootKey, CallLinkRoomId, ContactAddress, DistributionId, E164, GroupId,
    IdentityKey, Pni, ProfileKey,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// A known contact together with its profile, nickname, system-contact and
/// identity-key details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactRecord {
    /// Local row id. Ignored on insert.
    pub row_id: i64,
    pub aci: Option<Aci>,
    pub pni: Option<Pni>,
    pub e164: Option<E164>,
    pub is_registered: bool,
    /// Set when the contact was last seen unregistered.
    pub unregistered_at_ms: Option<u64>,
    pub username: Option<String>,
    pub profile_key: Option<ProfileKey>,
    pub profile_given_name: Option<String>,
    pub profile_family_name: Option<String>,
    pub nickname_given: Option<String>,
    pub nickname_family: Option<String>,
    pub note: Option<String>,
    pub system_given_name: Option<String>,
    pub system_family_name: Option<String>,
    pub system_nickname: Option<String>,
    pub identity_key: Option<IdentityKey>,
    pub identity_state: IdentityState,
    pub is_blocked: bool,
    /// Profile sharing is enabled with this contact.
    pub is_whitelisted: bool,
    pub hide_story: bool,
    /// Default-avatar color, once one has been chosen or restored.
    pub avatar_color: Option<AvatarColor>,
}

impl ContactRecord {
    /// A registered contact with nothing but the given identifiers set.
    pub fn new(aci: Option<Aci>, pni: Option<Pni>, e164: Option<E164>) -> Self {
        Self {
            row_id: 0,
            aci,
            pni,
            e164,
            is_registered: true,
            unregistered_at_ms: None,
            username: None,
            profile_key: None,
            profile_given_name: None,
            profile_family_name: None,
            nickname_given: None,
            nickname_family: None,
            note: None,
            system_given_name: None,
            system_family_name: None,
            system_nickname: None,
            identity_key: None,
            identity_state: IdentityState::Default,
            is_blocked: false,
            is_whitelisted: false,
            hide_story: false,
            avatar_color: None,
        }
    }

    /// The stored avatar color, or the one derived from the contact's most
    /// durable identifier.
    pub fn avatar_color_or_default(&self) -> AvatarColor {
        if let Some(color) = self.avatar_color {
            return color;
        }
        let seed = match (&self.aci, &self.pni, &self.e164) {
            (Some(aci), _, _) => aci.0.to_string().to_uppercase(),
            (None, Some(pni), _) => pni.0.to_string().to_uppercase(),
            (None, None, Some(e164)) => e164.as_str().to_string(),
            (None, None, None) => String::new(),
        };
        AvatarColor::derived_from(seed.as_bytes())
    }

    /// The contact's address, or `None` if it has no identifier at all.
    pub fn address(&self) -> Option<ContactAddress> {
        ContactAddress::new(self.aci, self.pni, self.e164.clone())
    }
}

/// Hidden-recipient marker attached to a contact row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HiddenRecipient {
    pub contact_row_id: i64,
    /// The contact was hidden while its chat sat in a message request.
    pub in_known_message_request_state: bool,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupAccess {
    pub attributes: AccessRequired,
    pub members: AccessRequired,
    pub add_from_invite_link: AccessRequired,
}

impl Default for GroupAccess {
    fn default() -> Self {
        Self {
            attributes: AccessRequired::Member,
            members: AccessRequired::Member,
            add_from_invite_link: AccessRequired::Unsatisfiable,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMemberRecord {
    pub aci: Aci,
    pub role: MemberRole,
    pub joined_at_revision: u32,
}

/// A member invited by someone else who has not yet accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitedMemberRecord {
    pub aci: Aci,
    pub role: MemberRole,
    /// ACI of the member who sent the invite.
    pub added_by: Option<Aci>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestingMemberRecord {
    pub aci: Aci,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BannedMemberRecord {
    pub aci: Aci,
    pub timestamp_ms: u64,
}

/// A group thread's model: its master key plus the last known group state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRecord {
    pub group_id: GroupId,
    /// Raw master key bytes as received from the group service.
    pub master_key: Vec<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub disappearing_timer_secs: u32,
    pub access: GroupAccess,
    pub revision: u32,
    pub announcements_only: bool,
    pub invite_link_password: Option<Vec<u8>>,
    pub members: Vec<GroupMemberRecord>,
    pub invited_members: Vec<InvitedMemberRecord>,
    pub requesting_members: Vec<RequestingMemberRecord>,
    pub banned_members: Vec<BannedMemberRecord>,
    pub is_whitelisted: bool,
    pub is_blocked: bool,
    pub hide_story: bool,
    pub story_send_mode: StorySendMode,
}

// ---------------------------------------------------------------------------
// Story distribution lists
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryListRecord {
    pub distribution_id: DistributionId,
    pub name: String,
    pub allow_replies: bool,
    pub privacy_mode: PrivacyMode,
    /// Contact row ids, ascending.
    pub member_row_ids: Vec<i64>,
}

/// What remains of a deleted story list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryListTombstone {
    pub distribution_id: DistributionId,
    pub deleted_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Call links
// ---------------------------------------------------------------------------

/// Call-link state. All server-side fields stay `None` until fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallLinkRecord {
    pub row_id: i64,
    pub room_id: CallLinkRoomId,
    pub root_key: CallLinkRootKey,
    pub admin_passkey: Option<Vec<u8>>,
    pub admin_deleted_at_ms: Option<u64>,
    pub name: Option<String>,
    pub restrictions: Option<CallLinkRestrictions>,
    pub revoked: Option<bool>,
    pub expiration: Option<DateTime<Utc>>,
    pub is_upcoming: bool,
    pub pending_fetch_counter: u32,
}

impl CallLinkRecord {
    /// A link known only by its root key.
    pub fn new(root_key: CallLinkRootKey) -> Self {
        Self {
            row_id: 0,
            room_id: root_key.room_id(),
            root_key,
            admin_passkey: None,
            admin_deleted_at_ms: None,
            name: None,
            restrictions: None,
            revoked: None,
            expiration: None,
            is_upcoming: false,
            pending_fetch_counter: 0,
        }
    }

    /// Rebuild a link from a backup. Restored links are always upcoming
    /// until call history records a call on them.
    pub fn new_from_backup(
        root_key: CallLinkRootKey,
        admin_passkey: Option<Vec<u8>>,
        name: Option<String>,
        restrictions: Option<CallLinkRestrictions>,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            admin_passkey,
            name,
            restrictions,
            revoked: Some(false),
            expiration,
            is_upcoming: true,
            ..Self::new(root_key)
        }
    }

    /// Tombstone the link. Server-side state is cleared.
    pub fn mark_deleted(&mut self, at_ms: u64) {
        self.admin_deleted_at_ms = Some(at_ms);
        self.admin_passkey = None;
        self.name = None;
        self.restrictions = None;
        self.revoked = None;
        self.expiration = None;
        self.pending_fetch_counter = 0;
        self.is_upcoming = false;
    }

    pub fn is_deleted(&self) -> bool {
        self.admin_deleted_at_ms.is_some()
    }

    /// A call happened on this link, so it is no longer upcoming.
    pub fn mark_call_recorded(&mut self) {
        self.is_upcoming = false;
    }
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadKind {
    Contact { contact_row_id: i64 },
    Group { group_id: GroupId },
    NoteToSelf,
}

impl ThreadKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Contact { .. } => "contact",
            Self::Group { .. } => "group",
            Self::NoteToSelf => "note_to_self",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadRecord {
    pub id: i64,
    pub kind: ThreadKind,
    pub is_archived: bool,
    pub pinned_order: Option<u32>,
    pub mute_until_ms: u64,
    pub marked_unread: bool,
    pub has_pending_message_request: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InfoMessageKind {
    /// "You hid this contact" notice shown at the end of the thread.
    ContactHidden,
}

impl InfoMessageKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::ContactHidden => "contact_hidden",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "contact_hidden" => Some(Self::ContactHidden),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InfoMessage {
    pub id: i64,
    pub thread_id: i64,
    pub kind: InfoMessageKind,
    pub created_at_ms: u64,
}

// ---------------------------------------------------------------------------
// Fetch jobs
// ---------------------------------------------------------------------------

/// Work scheduled for after a restore commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FetchJobKind {
    GroupAvatar { group_id: GroupId, avatar_url: String },
    Profile { aci: Aci },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchJob {
    pub id: i64,
    pub kind: FetchJobKind,
    pub enqueued_at: DateTime<Utc>,
}
