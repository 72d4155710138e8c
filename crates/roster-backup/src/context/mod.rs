//! Per-pass registries mapping recipient ids to addresses.

mod archiving;
mod restoring;

pub use archiving::ArchivingContext;
pub use restoring::{RestoringContext, ThreadHandle};
