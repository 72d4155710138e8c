use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;
use crate::types::{Aci, E164, Pni};

/// The identifiers of the account that owns this device.
/// Supplied by the account layer; never derived from backup contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalIdentifiers {
    pub aci: Aci,
    pub pni: Option<Pni>,
    pub e164: Option<E164>,
}

impl LocalIdentifiers {
    pub fn new(aci: Aci, pni: Option<Pni>, e164: Option<E164>) -> Self {
        Self { aci, pni, e164 }
    }

    /// True if any of the given identifiers belongs to the local user.
    pub fn contains_any_of(&self, aci: Option<&Aci>, e164: Option<&E164>, pni: Option<&Pni>) -> bool {
        aci.is_some_and(|aci| *aci == self.aci)
            || e164.is_some_and(|e164| self.e164.as_ref() == Some(e164))
            || pni.is_some_and(|pni| self.pni.as_ref() == Some(pni))
    }
}

/// A contact's long-term identity public key (Ed25519).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityKey(pub [u8; 32]);

impl IdentityKey {
    /// Parse and validate a public key; rejects byte strings that are not a
    /// valid curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdentifierError::InvalidIdentityKey)?;
        VerifyingKey::from_bytes(&arr).map_err(|_| IdentifierError::InvalidIdentityKey)?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use uuid::Uuid;

    fn local() -> LocalIdentifiers {
        LocalIdentifiers::new(
            Aci(Uuid::from_u128(1)),
            Some(Pni(Uuid::from_u128(2))),
            Some(E164::parse("+15550001111").unwrap()),
        )
    }

    #[test]
    fn test_contains_any_of() {
        let local = local();
        assert!(local.contains_any_of(Some(&Aci(Uuid::from_u128(1))), None, None));
        assert!(local.contains_any_of(None, None, Some(&Pni(Uuid::from_u128(2)))));
        assert!(local.contains_any_of(
            None,
            Some(&E164::parse("+15550001111").unwrap()),
            None
        ));
        assert!(!local.contains_any_of(Some(&Aci(Uuid::from_u128(9))), None, None));
        assert!(!local.contains_any_of(None, None, None));
    }

    #[test]
    fn test_identity_key_validation() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public = signing_key.verifying_key().to_bytes();
        assert!(IdentityKey::from_bytes(&public).is_ok());
        assert!(IdentityKey::from_bytes(&public[..31]).is_err());
    }
}
