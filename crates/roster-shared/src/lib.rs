//! # roster-shared
//!
//! Identifier types, recipient addresses, the backup frame vocabulary and the
//! key derivations every other roster crate builds on.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod types;

pub use address::{ArchivingAddress, ContactAddress};
pub use error::{CryptoError, IdentifierError, SharedError};
pub use identity::{IdentityKey, LocalIdentifiers};
pub use types::*;
