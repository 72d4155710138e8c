//! # roster
//!
//! Command-line front end for the recipient backup engine.
//!
//! - **export** writes the local database's social graph to a backup file
//! - **import** restores a backup file into an empty database and queues
//!   the avatar and profile fetches it implies
//!
//! Ctrl+C stops either pass between frames. A cancelled import commits
//! nothing.

mod config;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use roster_backup::{
    ArchiveOptions, ArchiveOutcome, BackupExporter, BackupImporter, CancellationToken, FollowUpTask,
    FrameReader, FrameWriter, RestoreOptions, RestoreReport,
};
use roster_shared::crypto::derive_backup_key;
use roster_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::RosterConfig;

#[derive(Debug, Parser)]
#[command(name = "roster", version, about = "Back up and restore the recipient graph")]
struct Cli {
    /// Database file, overriding `ROSTER_DB_PATH`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write every recipient and chat to a backup file.
    Export {
        /// Destination file. Overwritten if it exists.
        file: PathBuf,
    },
    /// Restore a backup file into the configured database.
    Import {
        file: PathBuf,
        /// Restore into a throwaway in-memory database and only report.
        #[arg(long)]
        dry_run: bool,
        /// Roll back on the first frame error.
        #[arg(long)]
        fail_on_any_error: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,roster=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = RosterConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    info!(
        db = ?config.db_path,
        sealed = config.passphrase.is_some(),
        strict = config.fail_on_any_error,
        "Loaded configuration"
    );

    let cancellation = CancellationToken::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling");
            on_signal.cancel();
        }
    });

    // Both passes are synchronous SQLite work.
    match cli.command {
        Command::Export { file } => {
            tokio::task::spawn_blocking(move || run_export(&config, &file, cancellation)).await?
        }
        Command::Import {
            file,
            dry_run,
            fail_on_any_error,
        } => {
            config.fail_on_any_error |= fail_on_any_error;
            tokio::task::spawn_blocking(move || run_import(&config, &file, dry_run, cancellation)).await?
        }
    }
}

fn open_database(config: &RosterConfig) -> anyhow::Result<Database> {
    let db = match &config.db_path {
        Some(path) => Database::open_at(path),
        None => Database::new(),
    }
    .context("failed to open database")?;
    if let Some(path) = db.path() {
        tracing::debug!(path = %path.display(), "database ready");
    }
    Ok(db)
}

fn run_export(config: &RosterConfig, path: &Path, cancellation: CancellationToken) -> anyhow::Result<()> {
    let local = config.local_identifiers()?;
    let mut db = open_database(config)?;

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = FrameWriter::new(BufWriter::new(file));
    if let Some(passphrase) = &config.passphrase {
        writer = writer.with_key(derive_backup_key(passphrase.as_bytes()));
    }

    let options = ArchiveOptions {
        cancellation,
        ..Default::default()
    };
    let outcome = BackupExporter::new().export(&mut db, &mut writer, &local, &options);
    let frames = writer.frames_written();

    match outcome {
        ArchiveOutcome::Success => {}
        ArchiveOutcome::PartialSuccess(errors) => {
            tracing::warn!(skipped = errors.len(), "some models were left out of the backup");
        }
        ArchiveOutcome::CompleteFailure(err) => {
            drop(writer);
            discard(path);
            return Err(err).context("backup export failed");
        }
        ArchiveOutcome::Cancelled => {
            drop(writer);
            discard(path);
            bail!("backup export cancelled");
        }
    }

    writer.flush().context("failed to flush backup file")?;
    info!(frames, path = %path.display(), "backup written");
    Ok(())
}

fn run_import(
    config: &RosterConfig,
    path: &Path,
    dry_run: bool,
    cancellation: CancellationToken,
) -> anyhow::Result<()> {
    let local = config.local_identifiers()?;

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = FrameReader::new(BufReader::new(file)).with_max_frame_size(config.max_frame_size);
    if let Some(passphrase) = &config.passphrase {
        reader = reader.with_key(derive_backup_key(passphrase.as_bytes()));
    }

    let options = RestoreOptions {
        fail_on_any_error: config.fail_on_any_error,
        cancellation,
    };
    let importer = BackupImporter::new();

    let report = if dry_run {
        let mut db = Database::open_in_memory().context("failed to open scratch database")?;
        let mut queue: Vec<FollowUpTask> = Vec::new();
        importer.import(&mut db, &mut reader, &local, &mut queue, &options)?
    } else {
        // The fetch queue lives in the same database on its own connection,
        // written after the restore commits.
        let mut db = open_database(config)?;
        let mut queue = open_database(config)?;
        importer.import(&mut db, &mut reader, &local, &mut queue, &options)?
    };

    print_report(&report, dry_run);
    Ok(())
}

fn print_report(report: &RestoreReport, dry_run: bool) {
    info!(
        dry_run,
        backup_time_ms = report.backup_time_ms,
        frames = report.frames_read,
        recipients = report.recipients_restored,
        chats = report.chats_restored,
        skipped = report.errors.len(),
        follow_ups = report.follow_ups_enqueued,
        "backup restored"
    );
    for error in &report.errors {
        tracing::debug!(%error, "frame not fully restored");
    }
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(error = %e, path = %path.display(), "failed to remove incomplete backup");
    }
}
