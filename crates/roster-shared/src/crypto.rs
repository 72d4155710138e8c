use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::constants::{
    KDF_CONTEXT_BACKUP_KEY, KDF_CONTEXT_CALL_LINK_ROOM_ID, KDF_CONTEXT_GROUP_ID, NONCE_SIZE,
};
use crate::error::CryptoError;
use crate::types::{CallLinkRoomId, CallLinkRootKey, GroupId, GroupMasterKey};

pub type SymmetricKey = [u8; 32];

pub fn generate_symmetric_key() -> SymmetricKey {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn derive(context: &str, material: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(material);
    *hasher.finalize().as_bytes()
}

/// Group ids are a one-way function of the master key, so two devices holding
/// the same key always agree on the id.
pub fn derive_group_id(master_key: &GroupMasterKey) -> GroupId {
    GroupId(derive(KDF_CONTEXT_GROUP_ID, &master_key.0))
}

pub fn derive_call_link_room_id(root_key: &CallLinkRootKey) -> CallLinkRoomId {
    CallLinkRoomId(derive(KDF_CONTEXT_CALL_LINK_ROOM_ID, &root_key.0))
}

pub fn derive_backup_key(passphrase: &[u8]) -> SymmetricKey {
    derive(KDF_CONTEXT_BACKUP_KEY, passphrase)
}
