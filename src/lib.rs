//! Expense tracker is the backend for a personal finance tracker.
//!
//! Users record transactions against wallets (where money is held) and,
//! optionally, budgets (spending envelopes). Both wallets and budgets carry a
//! running balance that is kept equal to the signed sum of their linked
//! transactions every time a transaction is created, updated, deleted or
//! transferred.
//!
//! The services in this crate are the single entry point for those
//! mutations. They are backed by a [Store] that is either an in-memory map
//! store or a SQLite database, chosen at startup via [StoreArgs].

#![warn(missing_docs)]

mod balance;
mod budget;
pub mod config;
mod database_id;
mod deletion_guard;
mod depot;
pub mod logging;
mod pagination;
mod password;
pub mod stores;
mod template;
mod transaction;
mod user;
mod wallet;

#[cfg(test)]
mod test_utils;

pub use balance::{BalanceDrift, DriftKind, find_drift, reconcile};
pub use budget::{Budget, BudgetService};
pub use config::{StoreArgs, StoreBackend};
pub use database_id::{BudgetId, DatabaseId, DepotId, StockId, TemplateId, TransactionId, WalletId};
pub use deletion_guard::DeletionHint;
pub use depot::{Depot, DepotService, NewStock, Stock, StockService};
pub use pagination::{Page, PageRequest, PaginationConfig};
pub use password::{PasswordHash, ValidatedPassword};
pub use stores::{LedgerRead, LedgerStore, LedgerWrite, Store};
pub use template::{TemplateBuilder, TemplateService, TransactionTemplate};
pub use transaction::{
    SearchCriteria, SearchResults, Transaction, TransactionBuilder, TransactionFilter,
    TransactionRow, TransactionService, TransactionType, Window,
};
pub use user::{User, UserID, UserService};
pub use wallet::{Wallet, WalletService};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A monetary amount was zero or negative where a positive amount is
    /// required, e.g. a transaction amount or a budget limit.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// A transaction or template was given an empty description.
    #[error("description is required")]
    MissingDescription,

    /// A budget was given an empty name.
    #[error("budget name is required")]
    MissingBudgetName,

    /// A wallet was given an empty name.
    #[error("wallet name is required")]
    MissingWalletName,

    /// A depot was given an empty name.
    #[error("depot name is required")]
    MissingDepotName,

    /// A stock was given an empty WKN (securities identification number).
    #[error("WKN is required")]
    MissingWkn,

    /// A user was registered with an empty username.
    #[error("username is required")]
    MissingUsername,

    /// A recurring transaction template was given a day outside of 1-31.
    #[error("day {0} is not a valid day of the month")]
    InvalidDay(u8),

    /// A date could not be built, e.g. a year outside of the supported range.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// The budget does not exist or belongs to another user.
    ///
    /// The two cases are deliberately indistinguishable so that the
    /// existence of other users' budgets is not leaked.
    #[error("budget not found")]
    BudgetNotFound,

    /// The wallet does not exist or belongs to another user.
    #[error("wallet not found")]
    WalletNotFound,

    /// The depot does not exist or belongs to another user.
    #[error("depot not found")]
    DepotNotFound,

    /// The user ID does not refer to a registered user.
    #[error("user not found")]
    UserNotFound,

    /// The entity targeted by an operation does not exist or belongs to
    /// another user.
    #[error("user not authorized")]
    Unauthorized,

    /// The username and password combination did not match a user.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The username is already taken.
    #[error("the username \"{0}\" already exists")]
    DuplicateUsername(String),

    /// The budget, wallet or depot still has a non-zero balance or linked
    /// entries and cannot be deleted.
    ///
    /// The caller has to remove the linked entries first.
    #[error("cannot delete: still contains transactions or a non-zero balance")]
    NotEmpty,

    /// A transfer named the same wallet as source and destination.
    #[error("cannot transfer to the same wallet")]
    SameWalletTransfer,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An error occurred while serializing or deserializing JSON, e.g. the
    /// tags column.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the store lock because another thread panicked
    /// while holding it.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// The store configuration is incomplete or contradictory.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

impl From<time::error::ComponentRange> for Error {
    fn from(value: time::error::ComponentRange) -> Self {
        Error::InvalidDate(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}
