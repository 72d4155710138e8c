use serde::{Deserialize, Serialize};

/// Declares a closed enum carried on the wire as a raw `i32`, so that values
/// written by a newer client still decode and can be rejected (or defaulted)
/// by the code that reads them.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl TryFrom<i32> for $name {
            type Error = UnrecognizedEnum;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(UnrecognizedEnum {
                        enum_name: stringify!($name),
                        value: other,
                    }),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                match value {
                    $($name::$variant => $value,)+
                }
            }
        }
    };
}

/// A raw enum value that no variant claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {enum_name} value {value}")]
pub struct UnrecognizedEnum {
    pub enum_name: &'static str,
    pub value: i32,
}

// ---------------------------------------------------------------------------
// Frame envelope
// ---------------------------------------------------------------------------

/// One self-contained unit of the backup stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub item: Option<FrameItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameItem {
    Header(BackupInfo),
    Recipient(Recipient),
    Chat(Chat),
}

impl Frame {
    pub fn header(info: BackupInfo) -> Self {
        Self {
            item: Some(FrameItem::Header(info)),
        }
    }

    pub fn recipient(recipient: Recipient) -> Self {
        Self {
            item: Some(FrameItem::Recipient(recipient)),
        }
    }

    pub fn chat(chat: Chat) -> Self {
        Self {
            item: Some(FrameItem::Chat(chat)),
        }
    }

    /// Serialize to binary (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub version: u64,
    pub backup_time_ms: u64,
}

// ---------------------------------------------------------------------------
// Recipients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Per-backup id other frames use to reference this recipient.
    pub id: u64,
    pub destination: Option<Destination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Destination {
    Contact(Contact),
    Group(Group),
    DistributionList(DistributionListItem),
    SelfRecipient(SelfRecipient),
    ReleaseNotes(ReleaseNotes),
    CallLink(CallLink),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub aci: Option<Vec<u8>>,
    pub pni: Option<Vec<u8>>,
    pub e164: Option<u64>,
    pub username: Option<String>,
    pub profile_key: Option<Vec<u8>>,
    pub profile_sharing: bool,
    pub blocked: bool,
    pub hide_story: bool,
    pub visibility: i32,
    pub registration: Option<Registration>,
    pub profile_given_name: Option<String>,
    pub profile_family_name: Option<String>,
    pub nickname: Option<Name>,
    pub note: Option<String>,
    pub system_given_name: Option<String>,
    pub system_family_name: Option<String>,
    pub system_nickname: Option<String>,
    pub identity_key: Option<Vec<u8>>,
    pub identity_state: i32,
    pub avatar_color: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Registration {
    Registered,
    NotRegistered { unregistered_timestamp: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub given: Option<String>,
    pub family: Option<String>,
}

wire_enum! {
    /// Background palette for a recipient's default avatar.
    pub enum AvatarColor {
        A100 = 0,
        A110 = 1,
        A120 = 2,
        A130 = 3,
        A140 = 4,
        A150 = 5,
        A160 = 6,
        A170 = 7,
        A180 = 8,
        A190 = 9,
        A200 = 10,
        A210 = 11,
    }
}

impl AvatarColor {
    const PALETTE: [AvatarColor; 12] = [
        Self::A100,
        Self::A110,
        Self::A120,
        Self::A130,
        Self::A140,
        Self::A150,
        Self::A160,
        Self::A170,
        Self::A180,
        Self::A190,
        Self::A200,
        Self::A210,
    ];

    /// The color a recipient gets when none was chosen for it. Stable for a
    /// given seed across installs.
    pub fn derived_from(seed: &[u8]) -> Self {
        let hash = seed
            .iter()
            .fold(0u64, |hash, byte| hash.rotate_left(3) ^ u64::from(*byte));
        Self::PALETTE[(hash % Self::PALETTE.len() as u64) as usize]
    }
}

wire_enum! {
    pub enum Visibility {
        Visible = 0,
        Hidden = 1,
        HiddenMessageRequest = 2,
    }
}

wire_enum! {
    pub enum IdentityState {
        Default = 0,
        Verified = 1,
        Unverified = 2,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub master_key: Option<Vec<u8>>,
    pub whitelisted: bool,
    pub hide_story: bool,
    pub blocked: bool,
    pub story_send_mode: i32,
    pub snapshot: Option<GroupSnapshot>,
}

wire_enum! {
    pub enum StorySendMode {
        Default = 0,
        Disabled = 1,
        Enabled = 2,
    }
}

/// Complete group state at the moment of archiving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub title: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub disappearing_messages_timer_secs: u32,
    pub access_control: Option<AccessControl>,
    pub version: u32,
    pub members: Vec<GroupMember>,
    pub members_pending_profile_key: Vec<GroupMemberPendingProfileKey>,
    pub members_pending_admin_approval: Vec<GroupMemberPendingAdminApproval>,
    pub members_banned: Vec<GroupMemberBanned>,
    pub invite_link_password: Option<Vec<u8>>,
    pub announcements_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: Vec<u8>,
    pub role: i32,
    pub joined_at_version: u32,
}

/// An invited member; `added_by_user_id` is the inviter's ACI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberPendingProfileKey {
    pub member: Option<GroupMember>,
    pub added_by_user_id: Option<Vec<u8>>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberPendingAdminApproval {
    pub user_id: Vec<u8>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberBanned {
    pub user_id: Vec<u8>,
    pub timestamp: u64,
}

wire_enum! {
    pub enum MemberRole {
        Unknown = 0,
        Default = 1,
        Administrator = 2,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub attributes: i32,
    pub members: i32,
    pub add_from_invite_link: i32,
}

wire_enum! {
    pub enum AccessRequired {
        Unknown = 0,
        Any = 1,
        Member = 2,
        Administrator = 3,
        Unsatisfiable = 4,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionListItem {
    pub distribution_id: Vec<u8>,
    pub item: Option<DistributionListKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionListKind {
    /// Tombstone for a deleted list.
    DeletionTimestamp(u64),
    DistributionList(DistributionList),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionList {
    pub name: String,
    pub allow_replies: bool,
    pub privacy_mode: i32,
    pub member_recipient_ids: Vec<u64>,
}

wire_enum! {
    pub enum PrivacyMode {
        Unknown = 0,
        OnlyWith = 1,
        AllExcept = 2,
        All = 3,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallLink {
    pub root_key: Vec<u8>,
    /// Present only when the local user administers the link.
    pub admin_key: Option<Vec<u8>>,
    pub name: String,
    pub restrictions: i32,
    pub expiration_ms: u64,
}

wire_enum! {
    pub enum CallLinkRestrictions {
        Unknown = 0,
        None = 1,
        AdminApproval = 2,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfRecipient {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotes {}

// ---------------------------------------------------------------------------
// Chats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: u64,
    pub recipient_id: u64,
    pub archived: bool,
    pub pinned_order: Option<u32>,
    pub mute_until_ms: u64,
    pub marked_unread: bool,
}
