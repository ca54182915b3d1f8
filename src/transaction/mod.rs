//! Transactions: the model, how they are queried, and the service that
//! creates, updates, deletes and transfers them while keeping wallet and
//! budget balances consistent.

mod core;
mod query;
mod service;

pub use core::{Transaction, TransactionBuilder, TransactionType};
pub use query::{
    SearchCriteria, SearchResults, TransactionFilter, TransactionRow, Window, newest_first,
};
pub use service::TransactionService;

pub(crate) use service::create_in_ledger;
