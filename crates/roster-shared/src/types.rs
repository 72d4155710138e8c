use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    CALL_LINK_ROOT_KEY_SIZE, GROUP_MASTER_KEY_SIZE, LOCAL_RECIPIENT_ID, PROFILE_KEY_SIZE,
    UUID_SIZE,
};
use crate::error::IdentifierError;

fn uuid_from_slice(bytes: &[u8]) -> Result<Uuid, IdentifierError> {
    if bytes.len() != UUID_SIZE {
        return Err(IdentifierError::InvalidUuidLength(bytes.len()));
    }
    Uuid::from_slice(bytes).map_err(|_| IdentifierError::InvalidUuidLength(bytes.len()))
}

// Account identity; the most durable identifier a contact has.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Aci(pub Uuid);

impl Aci {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        uuid_from_slice(bytes).map(Self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl std::fmt::Display for Aci {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ACI:{}", self.0)
    }
}

// Phone-number identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pni(pub Uuid);

impl Pni {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        uuid_from_slice(bytes).map(Self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl std::fmt::Display for Pni {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PNI:{}", self.0)
    }
}

/// A phone number in E.164 form, e.g. `+15550000001`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct E164(String);

impl E164 {
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let digits = s
            .strip_prefix('+')
            .ok_or_else(|| IdentifierError::InvalidE164(s.to_string()))?;
        let valid = !digits.is_empty()
            && digits.len() <= 15
            && digits.bytes().all(|b| b.is_ascii_digit())
            && !digits.starts_with('0');
        if !valid {
            return Err(IdentifierError::InvalidE164(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Wire form: the digits without the leading `+`.
    pub fn from_u64(value: u64) -> Result<Self, IdentifierError> {
        Self::parse(&format!("+{value}"))
    }

    pub fn to_u64(&self) -> u64 {
        // Digits were validated on construction and 15 digits always fit.
        self.0[1..].parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for E164 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProfileKey(pub [u8; PROFILE_KEY_SIZE]);

impl ProfileKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let arr: [u8; PROFILE_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| IdentifierError::InvalidProfileKey(bytes.len()))?;
        Ok(Self(arr))
    }
}

/// Secret from which a group's id is derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupMasterKey(pub [u8; GROUP_MASTER_KEY_SIZE]);

impl GroupMasterKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let arr: [u8; GROUP_MASTER_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| IdentifierError::InvalidGroupMasterKey(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn group_id(&self) -> GroupId {
        crate::crypto::derive_group_id(self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub [u8; 32]);

impl GroupId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistributionId(pub Uuid);

impl DistributionId {
    /// The "My Story" list every account has; it always exists locally.
    pub const MY_STORY: DistributionId = DistributionId(Uuid::nil());

    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        uuid_from_slice(bytes).map(Self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    pub fn is_my_story(&self) -> bool {
        *self == Self::MY_STORY
    }
}

impl Default for DistributionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DistributionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CallLinkRootKey(pub [u8; CALL_LINK_ROOT_KEY_SIZE]);

impl CallLinkRootKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let arr: [u8; CALL_LINK_ROOT_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| IdentifierError::InvalidCallLinkRootKey(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn room_id(&self) -> CallLinkRoomId {
        crate::crypto::derive_call_link_room_id(self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallLinkRoomId(pub [u8; 32]);

impl CallLinkRoomId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for CallLinkRoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Per-backup numeric handle for a recipient. Not stable across exports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(pub u64);

impl RecipientId {
    pub const LOCAL: RecipientId = RecipientId(LOCAL_RECIPIENT_ID);
}

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "recipient#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub u64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chat#{}", self.0)
    }
}
