//! Helpers for running the same test against every store backend.

use crate::{
    Store,
    stores::{MemoryStore, SqliteStore},
};

pub(crate) fn memory_store() -> Store {
    MemoryStore::new().into()
}

pub(crate) fn sqlite_store() -> Store {
    SqliteStore::open_in_memory()
        .expect("could not open in-memory SQLite database")
        .into()
}

/// Run `test` once with a fresh in-memory store and once with a fresh SQLite store.
pub(crate) fn for_each_store(test: impl Fn(Store)) {
    test(memory_store());
    test(sqlite_store());
}
