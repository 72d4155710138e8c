//! Archive and restore error taxonomy.
//!
//! Fatal errors stop a pass. Everything else is collected per frame and
//! surfaced to the caller as a list. Every error has a collapse key so a
//! backup with thousands of identical failures logs each kind once.

use std::collections::HashMap;
use std::fmt;

use roster_shared::protocol::{PrivacyMode, UnrecognizedEnum};
use roster_shared::{ArchivingAddress, ChatId, GroupId, IdentifierError, RecipientId};
use roster_store::StoreError;
use thiserror::Error;

use crate::frame_io::FrameIoError;
use crate::recipient::RecipientCategory;

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// An error that can be logged in collapsed form.
pub trait LoggableError: fmt::Display {
    /// Errors with equal keys are logged once, with a repeat count.
    fn collapse_key(&self) -> String;
}

/// Log `errors` as warnings, one line per distinct collapse key, in the order
/// each key was first seen.
pub fn log_collapsed<E: LoggableError>(errors: &[E]) {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (usize, &E)> = HashMap::new();

    for error in errors {
        let key = error.collapse_key();
        match groups.get_mut(&key) {
            Some((count, _)) => *count += 1,
            None => {
                groups.insert(key.clone(), (1, error));
                order.push(key);
            }
        }
    }

    for key in order {
        if let Some((count, first)) = groups.get(&key) {
            tracing::warn!(collapse_key = %key, count, "{first}");
        }
    }
}

// ---------------------------------------------------------------------------
// Archive errors
// ---------------------------------------------------------------------------

/// The whole archive pass failed.
#[derive(Debug, Error)]
pub enum FatalArchiveError {
    #[error("failed to enumerate {category} models: {source}")]
    Enumeration {
        category: ArchiveCategory,
        #[source]
        source: StoreError,
    },

    #[error("failed to open read transaction: {0}")]
    Transaction(#[source] StoreError),

    #[error("failed to write backup header: {0}")]
    HeaderWrite(#[source] FrameIoError),
}

/// Category whose enumeration failed. Chats are enumerated like recipients
/// but are not a recipient category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveCategory {
    Recipient(RecipientCategory),
    Chat,
}

impl fmt::Display for ArchiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipient(category) => write!(f, "{category}"),
            Self::Chat => f.write_str("chat"),
        }
    }
}

/// What a failed archive frame was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveTarget {
    Recipient(ArchivingAddress),
    /// A chat, by its local thread row id.
    Chat { thread_id: i64 },
}

impl fmt::Display for ArchiveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipient(address) => write!(f, "{address}"),
            Self::Chat { thread_id } => write!(f, "chat(thread#{thread_id})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveFrameErrorKind {
    #[error("stored group master key is invalid: {0}")]
    GroupMasterKey(#[source] IdentifierError),

    #[error("group member is missing required params")]
    MissingRequiredGroupMemberParams,

    #[error("referenced recipient has no id in this backup")]
    ReferencedRecipientIdMissing,

    #[error("distribution list member has no usable address")]
    InvalidDistributionListMemberAddress,

    #[error("deleted distribution list has no deletion timestamp")]
    DistributionListMissingDeletionTimestamp,

    #[error("privacy mode {mode:?} cannot have {count} members")]
    DistributionListInvalidPrivacyMode { mode: PrivacyMode, count: usize },

    #[error("failed to read related model: {0}")]
    Store(#[source] StoreError),

    #[error("failed to write frame: {0}")]
    Write(#[source] FrameIoError),
}

impl ArchiveFrameErrorKind {
    fn code(&self) -> &'static str {
        match self {
            Self::GroupMasterKey(_) => "group_master_key",
            Self::MissingRequiredGroupMemberParams => "missing_group_member_params",
            Self::ReferencedRecipientIdMissing => "referenced_recipient_id_missing",
            Self::InvalidDistributionListMemberAddress => "invalid_distribution_list_member_address",
            Self::DistributionListMissingDeletionTimestamp => "distribution_list_missing_deletion_timestamp",
            Self::DistributionListInvalidPrivacyMode { .. } => "distribution_list_invalid_privacy_mode",
            Self::Store(_) => "store",
            Self::Write(_) => "write",
        }
    }
}

/// Building or writing one frame failed; the rest of the category continues.
#[derive(Debug, Error)]
#[error("{target}: {kind}")]
pub struct ArchiveFrameError {
    pub target: ArchiveTarget,
    #[source]
    pub kind: ArchiveFrameErrorKind,
}

impl ArchiveFrameError {
    pub fn new(target: ArchiveTarget, kind: ArchiveFrameErrorKind) -> Self {
        Self { target, kind }
    }

    pub(crate) fn recipient(address: ArchivingAddress, kind: ArchiveFrameErrorKind) -> Self {
        Self::new(ArchiveTarget::Recipient(address), kind)
    }
}

impl LoggableError for ArchiveFrameError {
    fn collapse_key(&self) -> String {
        let target = match &self.target {
            ArchiveTarget::Recipient(address) => address.kind(),
            ArchiveTarget::Chat { .. } => "chat",
        };
        format!("{target}:{}", self.kind.code())
    }
}

/// Result of archiving every model of one category.
#[derive(Debug)]
pub enum ArchiveMultiFrameResult {
    Success,
    PartialSuccess(Vec<ArchiveFrameError>),
    CompleteFailure(FatalArchiveError),
}

/// The pass was cancelled between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("archive pass cancelled")]
pub struct Cancelled;

// ---------------------------------------------------------------------------
// Restore errors
// ---------------------------------------------------------------------------

/// A frame is structurally invalid for its category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidProtoData {
    #[error("contact has no ACI, PNI or phone number")]
    ContactWithoutIdentifiers,
    #[error("contact carries one of the local user's identifiers")]
    OtherContactWithLocalIdentifiers,
    #[error("invalid ACI: {0}")]
    InvalidAci(IdentifierError),
    #[error("invalid PNI: {0}")]
    InvalidPni(IdentifierError),
    #[error("invalid phone number: {0}")]
    InvalidE164(IdentifierError),
    #[error("invalid profile key: {0}")]
    InvalidProfileKey(IdentifierError),
    #[error("invalid identity key")]
    InvalidIdentityKey,

    #[error("invalid group master key: {0}")]
    InvalidGroupMasterKey(IdentifierError),
    #[error("group has no snapshot")]
    MissingGroupSnapshot,
    #[error("invalid group member id: {0}")]
    InvalidGroupMemberAci(IdentifierError),
    #[error("group member role is unknown")]
    GroupMemberRoleUnknown,
    #[error("group member is missing required params")]
    MissingRequiredGroupMemberParams,

    #[error("invalid distribution id: {0}")]
    InvalidDistributionId(IdentifierError),
    #[error("distribution list item has neither a list nor a deletion timestamp")]
    DistributionListItemMissing,
    #[error("deleted distribution list has no deletion timestamp")]
    DistributionListMissingDeletionTimestamp,
    #[error("distribution list privacy mode is unknown")]
    DistributionListUnknownPrivacyMode,
    #[error("privacy mode {mode:?} cannot have {count} members")]
    DistributionListInvalidPrivacyModeMembers { mode: PrivacyMode, count: usize },
    #[error("distribution list member {0} is not a contact")]
    InvalidDistributionListMember(RecipientId),

    #[error("invalid call link root key: {0}")]
    InvalidCallLinkRootKey(IdentifierError),
    #[error("call link expiration {0} is out of range")]
    InvalidCallLinkExpiration(u64),

    #[error("more than one self recipient")]
    DuplicateSelfRecipient,
    #[error("more than one release notes recipient")]
    DuplicateReleaseNotes,

    #[error("chat cannot belong to a {0}")]
    InvalidChatRecipient(&'static str),
    #[error("header frame after the start of the backup")]
    UnexpectedHeader,
    #[error("frame has no item")]
    EmptyFrame,

    #[error("{0}")]
    UnrecognizedEnum(#[from] UnrecognizedEnum),
}

impl InvalidProtoData {
    fn code(&self) -> &'static str {
        match self {
            Self::ContactWithoutIdentifiers => "contact_without_identifiers",
            Self::OtherContactWithLocalIdentifiers => "other_contact_with_local_identifiers",
            Self::InvalidAci(_) => "invalid_aci",
            Self::InvalidPni(_) => "invalid_pni",
            Self::InvalidE164(_) => "invalid_e164",
            Self::InvalidProfileKey(_) => "invalid_profile_key",
            Self::InvalidIdentityKey => "invalid_identity_key",
            Self::InvalidGroupMasterKey(_) => "invalid_group_master_key",
            Self::MissingGroupSnapshot => "missing_group_snapshot",
            Self::InvalidGroupMemberAci(_) => "invalid_group_member_aci",
            Self::GroupMemberRoleUnknown => "group_member_role_unknown",
            Self::MissingRequiredGroupMemberParams => "missing_group_member_params",
            Self::InvalidDistributionId(_) => "invalid_distribution_id",
            Self::DistributionListItemMissing => "distribution_list_item_missing",
            Self::DistributionListMissingDeletionTimestamp => "distribution_list_missing_deletion_timestamp",
            Self::DistributionListUnknownPrivacyMode => "distribution_list_unknown_privacy_mode",
            Self::DistributionListInvalidPrivacyModeMembers { .. } => "distribution_list_invalid_privacy_mode_members",
            Self::InvalidDistributionListMember(_) => "invalid_distribution_list_member",
            Self::InvalidCallLinkRootKey(_) => "invalid_call_link_root_key",
            Self::InvalidCallLinkExpiration(_) => "invalid_call_link_expiration",
            Self::DuplicateSelfRecipient => "duplicate_self_recipient",
            Self::DuplicateReleaseNotes => "duplicate_release_notes",
            Self::InvalidChatRecipient(_) => "invalid_chat_recipient",
            Self::UnexpectedHeader => "unexpected_header",
            Self::EmptyFrame => "empty_frame",
            Self::UnrecognizedEnum(_) => "unrecognized_enum",
        }
    }
}

/// An internal invariant was violated. Indicates a bug, not a bad backup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeveloperError {
    #[error("recipient id {0} bound twice")]
    DuplicateRecipientId(RecipientId),
    #[error("chat id {0} bound twice")]
    DuplicateChatId(ChatId),
    #[error("{0} archiver received a frame it cannot restore")]
    MismatchedArchiver(RecipientCategory),
    #[error("contact {0} has no stored row")]
    MissingContactRow(RecipientId),
}

#[derive(Debug, Error)]
pub enum RestoreFrameErrorKind {
    #[error("invalid frame: {0}")]
    InvalidProtoData(#[from] InvalidProtoData),

    #[error("referenced recipient {0} was never restored")]
    RecipientIdNotFound(RecipientId),

    #[error("no thread was restored for group {0}")]
    ReferencedGroupThreadNotFound(GroupId),

    #[error("recipient frame has no known destination")]
    UnrecognizedRecipientType,

    #[error("failed to decode frame: {0}")]
    FrameDecode(#[source] FrameIoError),

    #[error("database insertion failed: {0}")]
    DatabaseInsertionFailed(#[source] StoreError),

    #[error("developer error: {0}")]
    Developer(#[from] DeveloperError),
}

impl RestoreFrameErrorKind {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidProtoData(inner) => inner.code(),
            Self::RecipientIdNotFound(_) => "recipient_id_not_found",
            Self::ReferencedGroupThreadNotFound(_) => "referenced_group_thread_not_found",
            Self::UnrecognizedRecipientType => "unrecognized_recipient_type",
            Self::FrameDecode(_) => "frame_decode",
            Self::DatabaseInsertionFailed(_) => "database_insertion_failed",
            Self::Developer(_) => "developer",
        }
    }
}

impl From<StoreError> for RestoreFrameErrorKind {
    fn from(err: StoreError) -> Self {
        Self::DatabaseInsertionFailed(err)
    }
}

impl From<UnrecognizedEnum> for RestoreFrameErrorKind {
    fn from(err: UnrecognizedEnum) -> Self {
        Self::InvalidProtoData(err.into())
    }
}

/// The frame a restore error is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef {
    Recipient(RecipientId),
    Chat(ChatId),
    /// A frame that could not be decoded, by position in the stream.
    Stream { index: u64 },
    /// Work done after the last frame on behalf of a recipient.
    PostRestore(RecipientId),
}

impl FrameRef {
    fn kind(&self) -> &'static str {
        match self {
            Self::Recipient(_) => "recipient",
            Self::Chat(_) => "chat",
            Self::Stream { .. } => "stream",
            Self::PostRestore(_) => "post_restore",
        }
    }
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recipient(id) => write!(f, "{id}"),
            Self::Chat(id) => write!(f, "{id}"),
            Self::Stream { index } => write!(f, "frame#{index}"),
            Self::PostRestore(id) => write!(f, "post-restore({id})"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{frame}: {kind}")]
pub struct RestoreFrameError {
    pub frame: FrameRef,
    #[source]
    pub kind: RestoreFrameErrorKind,
}

impl RestoreFrameError {
    pub fn new(frame: FrameRef, kind: impl Into<RestoreFrameErrorKind>) -> Self {
        Self {
            frame,
            kind: kind.into(),
        }
    }
}

impl LoggableError for RestoreFrameError {
    fn collapse_key(&self) -> String {
        format!("{}:{}", self.frame.kind(), self.kind.code())
    }
}

/// Result of restoring one frame.
#[derive(Debug)]
pub enum RestoreFrameResult {
    Success,
    /// The frame was restored but some secondary state was not.
    PartialRestore(Vec<RestoreFrameError>),
    Failure(Vec<RestoreFrameError>),
}

impl RestoreFrameResult {
    /// Wrap the outcome of a category restore, attributing any errors to
    /// `frame`. `Ok` carries the non-fatal errors.
    pub(crate) fn from_outcome(
        frame: FrameRef,
        outcome: Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind>,
    ) -> Self {
        match outcome {
            Ok(partial) if partial.is_empty() => Self::Success,
            Ok(partial) => Self::PartialRestore(
                partial
                    .into_iter()
                    .map(|kind| RestoreFrameError::new(frame, kind))
                    .collect(),
            ),
            Err(kind) => Self::Failure(vec![RestoreFrameError::new(frame, kind)]),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_shared::DistributionId;

    #[test]
    fn collapse_key_ignores_ids() {
        let a = RestoreFrameError::new(
            FrameRef::Recipient(RecipientId(4)),
            RestoreFrameErrorKind::RecipientIdNotFound(RecipientId(9)),
        );
        let b = RestoreFrameError::new(
            FrameRef::Recipient(RecipientId(5)),
            RestoreFrameErrorKind::RecipientIdNotFound(RecipientId(10)),
        );
        assert_eq!(a.collapse_key(), b.collapse_key());
        assert_eq!(a.collapse_key(), "recipient:recipient_id_not_found");
    }

    #[test]
    fn invalid_proto_data_keys_are_specific() {
        let err = RestoreFrameError::new(
            FrameRef::Recipient(RecipientId(2)),
            InvalidProtoData::ContactWithoutIdentifiers,
        );
        assert_eq!(err.collapse_key(), "recipient:contact_without_identifiers");
        assert_eq!(err.to_string(), "recipient#2: invalid frame: contact has no ACI, PNI or phone number");
    }

    #[test]
    fn from_outcome_maps_variants() {
        let frame = FrameRef::Chat(ChatId(1));
        assert!(RestoreFrameResult::from_outcome(frame, Ok(Vec::new())).is_success());

        match RestoreFrameResult::from_outcome(frame, Ok(vec![RestoreFrameErrorKind::UnrecognizedRecipientType])) {
            RestoreFrameResult::PartialRestore(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected partial restore, got {other:?}"),
        }

        match RestoreFrameResult::from_outcome(frame, Err(InvalidProtoData::EmptyFrame.into())) {
            RestoreFrameResult::Failure(errors) => assert_eq!(errors[0].frame, frame),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn archive_error_display_names_target() {
        let err = ArchiveFrameError::recipient(
            ArchivingAddress::DistributionList(DistributionId::MY_STORY),
            ArchiveFrameErrorKind::ReferencedRecipientIdMissing,
        );
        assert!(err.to_string().starts_with("distribution_list("));
        assert_eq!(err.collapse_key(), "distribution_list:referenced_recipient_id_missing");
    }
}
