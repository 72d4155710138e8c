//! # roster-store
//!
//! Local storage for the roster, backed by SQLite (or SQLCipher with the
//! `sqlcipher` feature).
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`.  Typed CRUD helpers for every domain model live on
//! [`StoreTx`], a transaction opened with [`Database::read_tx`] or
//! [`Database::write_tx`].

pub mod call_links;
pub mod contacts;
pub mod database;
pub mod fetch_jobs;
pub mod groups;
pub mod migrations;
pub mod models;
pub mod story_lists;
pub mod threads;

mod error;

pub use database::{Database, StoreTx};
pub use error::StoreError;
pub use models::*;
