//! Export pass: header, then every recipient category in order, then chats.

use roster_shared::constants::BACKUP_VERSION;
use roster_shared::protocol::{BackupInfo, Frame};
use roster_shared::LocalIdentifiers;
use roster_store::Database;

use crate::chat::ChatArchiver;
use crate::context::ArchivingContext;
use crate::error::{log_collapsed, ArchiveFrameError, ArchiveMultiFrameResult, FatalArchiveError};
use crate::frame_io::FrameSink;
use crate::options::{now_ms, ArchiveOptions};
use crate::recipient::RecipientArchiverRegistry;

/// How an export pass ended.
#[derive(Debug)]
pub enum ArchiveOutcome {
    Success,
    /// Every category was enumerated but some models could not be written.
    PartialSuccess(Vec<ArchiveFrameError>),
    CompleteFailure(FatalArchiveError),
    /// Frames already written stay in the sink; the caller decides whether
    /// to keep them.
    Cancelled,
}

impl ArchiveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Default)]
pub struct BackupExporter {
    registry: RecipientArchiverRegistry,
    chats: ChatArchiver,
}

impl BackupExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the whole social graph to `sink` from one read transaction, so
    /// the frames describe a single consistent snapshot.
    pub fn export(
        &self,
        db: &mut Database,
        sink: &mut dyn FrameSink,
        local: &LocalIdentifiers,
        options: &ArchiveOptions,
    ) -> ArchiveOutcome {
        let start_ms = now_ms();
        let tx = match db.read_tx() {
            Ok(tx) => tx,
            Err(err) => return ArchiveOutcome::CompleteFailure(FatalArchiveError::Transaction(err)),
        };

        let header = Frame::header(BackupInfo {
            version: BACKUP_VERSION,
            backup_time_ms: options.backup_time_ms.unwrap_or(start_ms),
        });
        if let Err(err) = sink.write_frame(&header) {
            return ArchiveOutcome::CompleteFailure(FatalArchiveError::HeaderWrite(err));
        }

        let mut ctx = ArchivingContext::new(local.clone(), start_ms, options.cancellation.clone());
        let mut errors = Vec::new();

        let recipients = self.registry.archive_all(&tx, sink, &mut ctx);
        match recipients {
            Err(_) => return cancelled(),
            Ok(ArchiveMultiFrameResult::CompleteFailure(err)) => return complete_failure(err),
            Ok(ArchiveMultiFrameResult::PartialSuccess(mut partial)) => errors.append(&mut partial),
            Ok(ArchiveMultiFrameResult::Success) => {}
        }

        match self.chats.archive(&tx, sink, &mut ctx) {
            Err(_) => return cancelled(),
            Ok(ArchiveMultiFrameResult::CompleteFailure(err)) => return complete_failure(err),
            Ok(ArchiveMultiFrameResult::PartialSuccess(mut partial)) => errors.append(&mut partial),
            Ok(ArchiveMultiFrameResult::Success) => {}
        }

        if errors.is_empty() {
            tracing::info!(elapsed_ms = now_ms().saturating_sub(start_ms), "backup export complete");
            ArchiveOutcome::Success
        } else {
            log_collapsed(&errors);
            tracing::info!(
                failed = errors.len(),
                elapsed_ms = now_ms().saturating_sub(start_ms),
                "backup export complete with errors"
            );
            ArchiveOutcome::PartialSuccess(errors)
        }
    }
}

fn cancelled() -> ArchiveOutcome {
    tracing::info!("backup export cancelled");
    ArchiveOutcome::Cancelled
}

fn complete_failure(err: FatalArchiveError) -> ArchiveOutcome {
    tracing::error!(error = %err, "backup export failed");
    ArchiveOutcome::CompleteFailure(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_shared::protocol::FrameItem;
    use roster_shared::Aci;
    use uuid::Uuid;

    #[test]
    fn header_comes_first() {
        let mut db = Database::open_in_memory().unwrap();
        let local = LocalIdentifiers::new(Aci(Uuid::from_u128(1)), None, None);
        let options = ArchiveOptions {
            backup_time_ms: Some(42),
            ..Default::default()
        };

        let mut sink: Vec<Frame> = Vec::new();
        let outcome = BackupExporter::new().export(&mut db, &mut sink, &local, &options);
        assert!(outcome.is_success());

        assert_eq!(
            sink[0].item,
            Some(FrameItem::Header(BackupInfo {
                version: BACKUP_VERSION,
                backup_time_ms: 42
            }))
        );
        // Self recipient, My Story, release notes.
        assert_eq!(sink.len(), 4);
    }
}
