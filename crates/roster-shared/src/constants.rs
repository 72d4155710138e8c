/// Application name
pub const APP_NAME: &str = "Roster";

/// Backup format version written into the header frame
pub const BACKUP_VERSION: u64 = 1;

/// Recipient id reserved for the local user
pub const LOCAL_RECIPIENT_ID: u64 = 1;

/// First recipient id handed out to anything that isn't the local user
pub const FIRST_ASSIGNED_RECIPIENT_ID: u64 = LOCAL_RECIPIENT_ID + 1;

/// First chat id handed out during an archive pass
pub const FIRST_CHAT_ID: u64 = 1;

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Raw UUID size used for ACIs, PNIs and distribution ids
pub const UUID_SIZE: usize = 16;

/// Group master key size in bytes
pub const GROUP_MASTER_KEY_SIZE: usize = 32;

/// Call link root key size in bytes
pub const CALL_LINK_ROOT_KEY_SIZE: usize = 16;

/// Profile key size in bytes
pub const PROFILE_KEY_SIZE: usize = 32;

/// Identity public key size in bytes (Ed25519)
pub const IDENTITY_KEY_SIZE: usize = 32;

/// Maximum encoded frame size in bytes (4 MiB)
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_GROUP_ID: &str = "roster-group-id-v1";
pub const KDF_CONTEXT_CALL_LINK_ROOM_ID: &str = "roster-call-link-room-v1";
pub const KDF_CONTEXT_BACKUP_KEY: &str = "roster-backup-key-v1";
