//! Import pass: validate the header, restore every frame inside one write
//! transaction, run post-restore actions, commit, then hand off follow-ups.

use roster_shared::constants::BACKUP_VERSION;
use roster_shared::protocol::FrameItem;
use roster_shared::LocalIdentifiers;
use roster_store::{Database, StoreError, StoreTx};
use thiserror::Error;

use crate::chat::ChatArchiver;
use crate::context::RestoringContext;
use crate::error::{
    log_collapsed, FrameRef, InvalidProtoData, RestoreFrameError, RestoreFrameErrorKind, RestoreFrameResult,
};
use crate::followup::FetchQueue;
use crate::frame_io::{FrameIoError, FrameSource};
use crate::options::{now_ms, RestoreOptions};
use crate::post_restore::run_post_restore_actions;
use crate::recipient::RecipientArchiverRegistry;

const FRAME_SAVEPOINT: &str = "restore_frame";

/// Failures that stop an import. Nothing is committed when one of these is
/// returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("write transaction failed: {0}")]
    Transaction(#[source] StoreError),

    #[error("backup stream is unreadable: {0}")]
    Stream(#[source] FrameIoError),

    #[error("backup does not start with a header frame")]
    MissingHeader,

    #[error("unsupported backup version {0}")]
    UnsupportedVersion(u64),

    #[error("import aborted after {} frame error(s)", .0.len())]
    Aborted(Vec<RestoreFrameError>),

    #[error("import cancelled")]
    Cancelled,

    #[error("failed to commit restored data: {0}")]
    Commit(#[source] StoreError),
}

/// Summary of a committed import.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub backup_time_ms: u64,
    /// Frames read from the stream, header included.
    pub frames_read: u64,
    pub recipients_restored: u64,
    pub chats_restored: u64,
    /// Frames that were skipped or only partly restored.
    pub errors: Vec<RestoreFrameError>,
    pub follow_ups_enqueued: usize,
}

#[derive(Default)]
pub struct BackupImporter {
    registry: RecipientArchiverRegistry,
    chats: ChatArchiver,
}

impl BackupImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(
        &self,
        db: &mut Database,
        source: &mut dyn FrameSource,
        local: &LocalIdentifiers,
        queue: &mut dyn FetchQueue,
        options: &RestoreOptions,
    ) -> Result<RestoreReport, ImportError> {
        let start_ms = now_ms();
        let mut report = RestoreReport {
            backup_time_ms: read_header(source)?,
            frames_read: 1,
            ..Default::default()
        };

        let tx = db.write_tx().map_err(ImportError::Transaction)?;
        let mut ctx = RestoringContext::new(local.clone(), start_ms, options.cancellation.clone());

        if let Err(err) = self.restore_frames(source, &tx, &mut ctx, options, &mut report) {
            if let Err(rollback_err) = tx.rollback() {
                tracing::warn!(error = %rollback_err, "failed to roll back import");
            }
            return Err(err);
        }

        tx.commit().map_err(ImportError::Commit)?;

        // The restore is already durable; a queue failure only loses the
        // background fetches.
        let follow_ups = ctx.take_follow_ups();
        let count = follow_ups.len();
        match queue.enqueue_all(follow_ups) {
            Ok(()) => report.follow_ups_enqueued = count,
            Err(err) => tracing::warn!(error = %err, count, "failed to enqueue restore follow-ups"),
        }

        log_collapsed(&report.errors);
        tracing::info!(
            frames = report.frames_read,
            recipients = report.recipients_restored,
            chats = report.chats_restored,
            failed = report.errors.len(),
            elapsed_ms = now_ms().saturating_sub(start_ms),
            "backup import complete"
        );
        Ok(report)
    }

    /// Restore every frame after the header, then run post-restore actions.
    /// Each frame restores inside its own savepoint, so a failed frame
    /// leaves no rows behind.
    fn restore_frames(
        &self,
        source: &mut dyn FrameSource,
        tx: &StoreTx<'_>,
        ctx: &mut RestoringContext,
        options: &RestoreOptions,
        report: &mut RestoreReport,
    ) -> Result<(), ImportError> {
        loop {
            if ctx.is_cancelled() {
                tracing::info!(frames_read = report.frames_read, "backup import cancelled");
                return Err(ImportError::Cancelled);
            }

            let index = report.frames_read;
            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) if err.is_fatal() => {
                    tracing::error!(error = %err, index, "backup stream failed");
                    return Err(ImportError::Stream(err));
                }
                Err(err) => {
                    report.frames_read += 1;
                    report.errors.push(RestoreFrameError::new(
                        FrameRef::Stream { index },
                        RestoreFrameErrorKind::FrameDecode(err),
                    ));
                    abort_if_strict(options, report)?;
                    continue;
                }
            };
            report.frames_read += 1;

            tx.savepoint(FRAME_SAVEPOINT).map_err(ImportError::Transaction)?;
            let result = match frame.item {
                Some(FrameItem::Recipient(recipient)) => {
                    let result = self.registry.restore(&recipient, tx, ctx);
                    if !matches!(result, RestoreFrameResult::Failure(_)) {
                        report.recipients_restored += 1;
                    }
                    result
                }
                Some(FrameItem::Chat(chat)) => {
                    let result = self.chats.restore(&chat, tx, ctx);
                    if !matches!(result, RestoreFrameResult::Failure(_)) {
                        report.chats_restored += 1;
                    }
                    result
                }
                Some(FrameItem::Header(_)) => stream_failure(index, InvalidProtoData::UnexpectedHeader),
                None => stream_failure(index, InvalidProtoData::EmptyFrame),
            };
            match result {
                RestoreFrameResult::Failure(_) => tx.rollback_to_savepoint(FRAME_SAVEPOINT),
                _ => tx.release_savepoint(FRAME_SAVEPOINT),
            }
            .map_err(ImportError::Transaction)?;

            match result {
                RestoreFrameResult::Success => {}
                RestoreFrameResult::PartialRestore(mut errors) | RestoreFrameResult::Failure(mut errors) => {
                    report.errors.append(&mut errors);
                    abort_if_strict(options, report)?;
                }
            }
        }

        let mut post_errors = run_post_restore_actions(tx, ctx);
        if !post_errors.is_empty() {
            report.errors.append(&mut post_errors);
            abort_if_strict(options, report)?;
        }
        Ok(())
    }
}

/// The first frame must be a header with a version this build understands.
fn read_header(source: &mut dyn FrameSource) -> Result<u64, ImportError> {
    let frame = match source.read_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => return Err(ImportError::MissingHeader),
        Err(err) if err.is_fatal() => return Err(ImportError::Stream(err)),
        Err(_) => return Err(ImportError::MissingHeader),
    };
    let Some(FrameItem::Header(info)) = frame.item else {
        return Err(ImportError::MissingHeader);
    };
    if info.version == 0 || info.version > BACKUP_VERSION {
        return Err(ImportError::UnsupportedVersion(info.version));
    }
    Ok(info.backup_time_ms)
}

fn stream_failure(index: u64, data: InvalidProtoData) -> RestoreFrameResult {
    RestoreFrameResult::Failure(vec![RestoreFrameError::new(FrameRef::Stream { index }, data)])
}

fn abort_if_strict(options: &RestoreOptions, report: &mut RestoreReport) -> Result<(), ImportError> {
    if !options.fail_on_any_error || report.errors.is_empty() {
        return Ok(());
    }
    let errors = std::mem::take(&mut report.errors);
    log_collapsed(&errors);
    tracing::error!(failed = errors.len(), "backup import aborted");
    Err(ImportError::Aborted(errors))
}
