//! Command line and environment configuration for picking a store at startup.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::{
    Error, Store,
    stores::{MemoryStore, SqliteStore},
};

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Keep everything in memory. Data is lost when the process exits.
    Memory,
    /// Use a SQLite database file.
    Sqlite,
}

/// Store options, meant to be flattened into a binary's arguments.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Args {
///     #[command(flatten)]
///     store: StoreArgs,
/// }
/// ```
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreArgs {
    /// The storage backend. Defaults to `sqlite` if a database path is
    /// given, otherwise `memory`.
    #[arg(long, env = "LEDGER_BACKEND", value_enum)]
    pub backend: Option<StoreBackend>,

    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    /// The backend that [StoreArgs::open_store] will use.
    pub fn backend(&self) -> StoreBackend {
        match (self.backend, &self.db_path) {
            (Some(backend), _) => backend,
            (None, Some(_)) => StoreBackend::Sqlite,
            (None, None) => StoreBackend::Memory,
        }
    }

    /// Open the configured store, creating the SQLite tables if needed.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if `sqlite` is selected without a
    /// database path, or an error if the database cannot be opened.
    pub fn open_store(&self) -> Result<Store, Error> {
        match (self.backend(), &self.db_path) {
            (StoreBackend::Memory, path) => {
                if let Some(path) = path {
                    tracing::warn!("ignoring database path {path:?} for the memory backend");
                }

                tracing::info!("using the in-memory store");
                Ok(MemoryStore::new().into())
            }
            (StoreBackend::Sqlite, Some(path)) => {
                Ok(SqliteStore::open(path)?.into())
            }
            (StoreBackend::Sqlite, None) => Err(Error::InvalidConfig(
                "the sqlite backend requires a database path (--db-path or DB_PATH)".to_owned(),
            )),
        }
    }
}
