//! Database ID type definitions.
//!
//! IDs are assigned by the store, increase monotonically and are never
//! reused, so a deleted entity's ID never comes back to refer to a new one.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a [Transaction](crate::Transaction).
pub type TransactionId = DatabaseId;

/// The ID of a [Budget](crate::Budget).
pub type BudgetId = DatabaseId;

/// The ID of a [Wallet](crate::Wallet).
pub type WalletId = DatabaseId;

/// The ID of a [TransactionTemplate](crate::TransactionTemplate).
pub type TemplateId = DatabaseId;

/// The ID of a [Depot](crate::Depot).
pub type DepotId = DatabaseId;

/// The ID of a [Stock](crate::Stock).
pub type StockId = DatabaseId;
