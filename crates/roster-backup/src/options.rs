use crate::cancel::CancellationToken;

/// Knobs for an export pass.
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Timestamp written into the header. Defaults to now.
    pub backup_time_ms: Option<u64>,
    pub cancellation: CancellationToken,
}

/// Knobs for an import pass.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Abort (and roll back) on the first frame error instead of skipping
    /// the frame.
    pub fail_on_any_error: bool,
    pub cancellation: CancellationToken,
}

pub(crate) fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
