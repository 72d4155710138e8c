//! Addressable recipients.
//!
//! An [`ArchivingAddress`] names exactly one recipient in the social graph by
//! its natural key. Contact addresses may carry any subset of ACI, PNI and
//! phone number, but never none of them.

use serde::{Deserialize, Serialize};

use crate::types::{Aci, CallLinkRoomId, DistributionId, E164, GroupId, Pni};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContactAddress {
    aci: Option<Aci>,
    pni: Option<Pni>,
    e164: Option<E164>,
}

impl ContactAddress {
    /// Returns `None` if all identifiers are absent.
    pub fn new(aci: Option<Aci>, pni: Option<Pni>, e164: Option<E164>) -> Option<Self> {
        if aci.is_none() && pni.is_none() && e164.is_none() {
            return None;
        }
        Some(Self { aci, pni, e164 })
    }

    pub fn from_aci(aci: Aci) -> Self {
        Self {
            aci: Some(aci),
            pni: None,
            e164: None,
        }
    }

    pub fn aci(&self) -> Option<&Aci> {
        self.aci.as_ref()
    }

    pub fn pni(&self) -> Option<&Pni> {
        self.pni.as_ref()
    }

    pub fn e164(&self) -> Option<&E164> {
        self.e164.as_ref()
    }
}

impl std::fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Phone numbers stay out of logs.
        match (&self.aci, &self.pni) {
            (Some(aci), _) => write!(f, "{aci}"),
            (None, Some(pni)) => write!(f, "{pni}"),
            (None, None) => f.write_str("E164:<redacted>"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArchivingAddress {
    Contact(ContactAddress),
    Group(GroupId),
    DistributionList(DistributionId),
    CallLink(CallLinkRoomId),
    Local,
    ReleaseNotes,
}

impl ArchivingAddress {
    pub fn as_contact(&self) -> Option<&ContactAddress> {
        match self {
            Self::Contact(address) => Some(address),
            _ => None,
        }
    }

    /// Short name of the recipient category, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Contact(_) => "contact",
            Self::Group(_) => "group",
            Self::DistributionList(_) => "distribution_list",
            Self::CallLink(_) => "call_link",
            Self::Local => "local",
            Self::ReleaseNotes => "release_notes",
        }
    }
}

impl std::fmt::Display for ArchivingAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contact(address) => write!(f, "contact({address})"),
            Self::Group(group_id) => write!(f, "group({})", group_id.short()),
            Self::DistributionList(id) => write!(f, "distribution_list({id})"),
            Self::CallLink(room_id) => write!(f, "call_link({})", &room_id.to_hex()[..8]),
            Self::Local => f.write_str("local"),
            Self::ReleaseNotes => f.write_str("release_notes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_contact_address_requires_identifier() {
        assert!(ContactAddress::new(None, None, None).is_none());
        let address = ContactAddress::new(None, None, Some(E164::parse("+15550000001").unwrap()))
            .expect("e164 alone is enough");
        assert!(address.aci().is_none());
        assert_eq!(address.to_string(), "E164:<redacted>");
    }

    #[test]
    fn test_display_prefers_aci() {
        let aci = Aci(Uuid::from_u128(5));
        let address = ContactAddress::new(Some(aci), Some(Pni(Uuid::from_u128(6))), None).unwrap();
        assert_eq!(address.to_string(), aci.to_string());
    }
}
