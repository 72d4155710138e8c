//! # roster-backup
//!
//! Archives the local social graph (contacts, groups, story distribution
//! lists, call links and their chats) into a stream of self-contained
//! frames, and restores such a stream into an empty store.
//!
//! Every recipient gets a per-backup numeric id on export; later frames refer
//! to recipients only through those ids. [`BackupExporter`] and
//! [`BackupImporter`] drive the two passes; the per-category work lives in
//! [`recipient`] and [`chat`].

pub mod cancel;
pub mod chat;
pub mod context;
pub mod error;
pub mod exporter;
pub mod followup;
pub mod frame_io;
pub mod importer;
pub mod options;
pub mod post_restore;
pub mod recipient;

#[cfg(test)]
mod tests;

pub use cancel::CancellationToken;
pub use exporter::{ArchiveOutcome, BackupExporter};
pub use followup::{FetchQueue, FollowUpTask};
pub use frame_io::{FrameIoError, FrameReader, FrameSink, FrameSource, FrameWriter};
pub use importer::{BackupImporter, ImportError, RestoreReport};
pub use options::{ArchiveOptions, RestoreOptions};
