use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,
}

/// Errors produced when parsing raw identifier bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid UUID bytes: expected 16, got {0}")]
    InvalidUuidLength(usize),

    #[error("Invalid phone number: {0}")]
    InvalidE164(String),

    #[error("Invalid group master key: expected 32 bytes, got {0}")]
    InvalidGroupMasterKey(usize),

    #[error("Invalid call link root key: expected 16 bytes, got {0}")]
    InvalidCallLinkRootKey(usize),

    #[error("Invalid profile key: expected 32 bytes, got {0}")]
    InvalidProfileKey(usize),

    #[error("Invalid identity key")]
    InvalidIdentityKey,
}
