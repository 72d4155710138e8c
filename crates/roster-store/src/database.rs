//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. All typed CRUD helpers live
//! on [`StoreTx`], so every read or write happens inside a transaction the
//! caller controls.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::{Connection, Params, Row, Transaction, TransactionBehavior};

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/roster/roster.db`
    /// - macOS:   `~/Library/Application Support/com.roster.roster/roster.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\roster\roster\data\roster.db`
    pub fn new() -> Result<Self> {
        let db_path = Self::default_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Platform default location of the database file.
    pub fn default_path() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("com", "roster", "roster").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join("roster.db"))
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::prepare(conn)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Run schema migrations.
        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }

    /// Begin a deferred (read) transaction.
    pub fn read_tx(&mut self) -> Result<StoreTx<'_>> {
        let tx = Transaction::new(&mut self.conn, TransactionBehavior::Deferred)?;
        Ok(StoreTx { tx })
    }

    /// Begin an immediate (write) transaction.
    pub fn write_tx(&mut self) -> Result<StoreTx<'_>> {
        let tx = Transaction::new(&mut self.conn, TransactionBehavior::Immediate)?;
        Ok(StoreTx { tx })
    }
}

/// A transaction over the store. Dropping it without calling
/// [`StoreTx::commit`] rolls back.
pub struct StoreTx<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> StoreTx<'conn> {
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }

    /// Open a named savepoint nested in this transaction.
    ///
    /// Every savepoint must be closed with [`StoreTx::release_savepoint`] or
    /// [`StoreTx::rollback_to_savepoint`] before the transaction ends.
    pub fn savepoint(&self, name: &str) -> Result<()> {
        self.tx.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(())
    }

    /// Keep the writes made since `name` was opened.
    pub fn release_savepoint(&self, name: &str) -> Result<()> {
        self.tx.execute_batch(&format!("RELEASE {name}"))?;
        Ok(())
    }

    /// Undo the writes made since `name` was opened and close it.
    pub fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.tx.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
        Ok(())
    }

    /// Run `sql` and hand each mapped row to `visit` until it breaks.
    ///
    /// A row that fails to map aborts the enumeration with an error.
    pub(crate) fn for_each_row<T, P, M, F>(&self, sql: &str, params: P, map: M, mut visit: F) -> Result<()>
    where
        P: Params,
        M: FnMut(&Row<'_>) -> rusqlite::Result<T>,
        F: FnMut(T) -> ControlFlow<()>,
    {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        for row in rows {
            if visit(row?).is_break() {
                break;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Wrap a decoding failure for column `idx` as a rusqlite conversion error.
pub(crate) fn bad_column<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

/// Map `QueryReturnedNoRows` to [`StoreError::NotFound`].
pub(crate) fn not_found(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}
