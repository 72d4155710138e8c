//! Recipient archivers and the registry that dispatches between them.
//!
//! Each archiver owns one recipient category: it enumerates that category's
//! models when archiving, and recognises and restores that category's frames.

mod call_link;
mod contact;
mod distribution_list;
mod group;
mod local;
mod release_notes;

use std::fmt;

use roster_shared::protocol::{Destination, Recipient};
use roster_shared::RecipientId;
use roster_store::{StoreError, StoreTx};

use crate::context::{ArchivingContext, RestoringContext};
use crate::error::{
    ArchiveCategory, ArchiveFrameError, ArchiveMultiFrameResult, Cancelled, DeveloperError,
    FatalArchiveError, FrameRef, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::frame_io::FrameSink;

pub use call_link::CallLinkArchiver;
pub use contact::ContactArchiver;
pub use distribution_list::DistributionListArchiver;
pub use group::GroupArchiver;
pub use local::LocalArchiver;
pub use release_notes::ReleaseNotesArchiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientCategory {
    Local,
    Contact,
    Group,
    DistributionList,
    CallLink,
    ReleaseNotes,
}

impl RecipientCategory {
    /// The category a destination belongs to.
    pub fn of(destination: &Destination) -> Self {
        match destination {
            Destination::Contact(_) => Self::Contact,
            Destination::Group(_) => Self::Group,
            Destination::DistributionList(_) => Self::DistributionList,
            Destination::SelfRecipient(_) => Self::Local,
            Destination::ReleaseNotes(_) => Self::ReleaseNotes,
            Destination::CallLink(_) => Self::CallLink,
        }
    }
}

impl fmt::Display for RecipientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Contact => "contact",
            Self::Group => "group",
            Self::DistributionList => "distribution_list",
            Self::CallLink => "call_link",
            Self::ReleaseNotes => "release_notes",
        })
    }
}

/// Archives and restores one recipient category.
pub trait RecipientArchiver {
    fn category(&self) -> RecipientCategory;

    /// Write one frame per model. Per-model failures are collected; a failure
    /// to enumerate the models at all is a complete failure.
    fn archive(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled>;

    fn can_restore(&self, recipient: &Recipient) -> bool {
        recipient
            .destination
            .as_ref()
            .is_some_and(|destination| RecipientCategory::of(destination) == self.category())
    }

    /// Validate, persist and bind one frame this archiver can restore.
    fn restore(&self, recipient: &Recipient, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult;
}

// ---------------------------------------------------------------------------
// Shared archive bookkeeping
// ---------------------------------------------------------------------------

/// Collects per-model errors while a category is enumerated.
#[derive(Default)]
pub(crate) struct ArchivePass {
    errors: Vec<ArchiveFrameError>,
    cancelled: bool,
}

impl ArchivePass {
    /// Call before each model. Returns `false` once the pass is cancelled.
    pub(crate) fn proceed(&mut self, ctx: &ArchivingContext) -> bool {
        if ctx.is_cancelled() {
            self.cancelled = true;
        }
        !self.cancelled
    }

    pub(crate) fn record(&mut self, result: Result<(), ArchiveFrameError>) {
        if let Err(err) = result {
            self.errors.push(err);
        }
    }

    pub(crate) fn finish(
        self,
        category: ArchiveCategory,
        enumeration: Result<(), StoreError>,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        if self.cancelled {
            return Err(Cancelled);
        }
        if let Err(source) = enumeration {
            return Ok(ArchiveMultiFrameResult::CompleteFailure(
                FatalArchiveError::Enumeration { category, source },
            ));
        }
        if self.errors.is_empty() {
            Ok(ArchiveMultiFrameResult::Success)
        } else {
            Ok(ArchiveMultiFrameResult::PartialSuccess(self.errors))
        }
    }
}

/// Wrap a restore body's outcome for the frame declaring `recipient`.
pub(crate) fn restore_result(
    recipient: &Recipient,
    outcome: Result<Vec<RestoreFrameErrorKind>, RestoreFrameErrorKind>,
) -> RestoreFrameResult {
    RestoreFrameResult::from_outcome(FrameRef::Recipient(RecipientId(recipient.id)), outcome)
}

pub(crate) fn mismatched(category: RecipientCategory) -> RestoreFrameErrorKind {
    DeveloperError::MismatchedArchiver(category).into()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered list of recipient archivers.
pub struct RecipientArchiverRegistry {
    archivers: Vec<Box<dyn RecipientArchiver + Send + Sync>>,
}

impl Default for RecipientArchiverRegistry {
    /// Release notes go last so the first contact gets the first free id.
    fn default() -> Self {
        Self {
            archivers: vec![
                Box::new(LocalArchiver),
                Box::new(ContactArchiver),
                Box::new(GroupArchiver),
                Box::new(DistributionListArchiver),
                Box::new(CallLinkArchiver),
                Box::new(ReleaseNotesArchiver),
            ],
        }
    }
}

impl RecipientArchiverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> Vec<RecipientCategory> {
        self.archivers.iter().map(|a| a.category()).collect()
    }

    /// Run every archiver in order. Stops at the first complete failure;
    /// otherwise partial errors from all categories are merged.
    pub fn archive_all(
        &self,
        tx: &StoreTx<'_>,
        sink: &mut dyn FrameSink,
        ctx: &mut ArchivingContext,
    ) -> Result<ArchiveMultiFrameResult, Cancelled> {
        let mut errors = Vec::new();
        for archiver in &self.archivers {
            let category = archiver.category();
            match archiver.archive(tx, sink, ctx)? {
                ArchiveMultiFrameResult::Success => {
                    tracing::debug!(%category, "archived recipients");
                }
                ArchiveMultiFrameResult::PartialSuccess(mut partial) => {
                    tracing::debug!(%category, failed = partial.len(), "archived recipients with errors");
                    errors.append(&mut partial);
                }
                failure @ ArchiveMultiFrameResult::CompleteFailure(_) => {
                    tracing::error!(%category, "recipient archiving failed");
                    return Ok(failure);
                }
            }
        }

        if errors.is_empty() {
            Ok(ArchiveMultiFrameResult::Success)
        } else {
            Ok(ArchiveMultiFrameResult::PartialSuccess(errors))
        }
    }

    /// Route a frame to the first archiver that claims it.
    pub fn restore(&self, recipient: &Recipient, tx: &StoreTx<'_>, ctx: &mut RestoringContext) -> RestoreFrameResult {
        let id = RecipientId(recipient.id);
        if ctx.is_bound(id) {
            return restore_result(recipient, Err(DeveloperError::DuplicateRecipientId(id).into()));
        }

        match self.archivers.iter().find(|a| a.can_restore(recipient)) {
            Some(archiver) => archiver.restore(recipient, tx, ctx),
            None => restore_result(recipient, Err(RestoreFrameErrorKind::UnrecognizedRecipientType)),
        }
    }
}
