//! The Ledger Store: keyed storage for every entity of the ledger and the
//! all-or-nothing write primitive the services build on.
//!
//! Services never touch the maps or tables directly. They open a read or a
//! write through [LedgerStore] and call the [LedgerRead]/[LedgerWrite]
//! methods inside the closure. Everything that happens inside one
//! [LedgerStore::write] commits together or not at all.

mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{
    Budget, Depot, Error, NewStock, PasswordHash, Stock, Transaction, TransactionBuilder,
    TransactionTemplate, User, UserID, Wallet,
    database_id::{BudgetId, DepotId, StockId, TemplateId, TransactionId, WalletId},
    template::TemplateBuilder,
    transaction::{TransactionFilter, TransactionRow, Window},
};

/// The number of rows/entries changed by a write.
pub type RowsAffected = usize;

/// Read access to the ledger.
///
/// `get_*` methods return `None` when there is no entity with the ID. They do
/// not check ownership, that is the job of the services.
pub trait LedgerRead {
    /// Get a transaction by its ID.
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error>;

    /// Get the transactions of `user_id` that match `filter`, most recent
    /// first, cut down to `window`, along with their wallet and budget names.
    fn query_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
        window: Window,
    ) -> Result<Vec<TransactionRow>, Error>;

    /// Count the transactions of `user_id` that match `filter`.
    fn count_transactions(&self, user_id: UserID, filter: &TransactionFilter)
    -> Result<u64, Error>;

    /// Count the transactions linked to the budget.
    fn count_transactions_for_budget(&self, id: BudgetId) -> Result<u64, Error>;

    /// Count the transactions linked to the wallet.
    fn count_transactions_for_wallet(&self, id: WalletId) -> Result<u64, Error>;

    /// Sum the signed amounts of the transactions linked to the budget.
    fn signed_total_for_budget(&self, id: BudgetId) -> Result<i64, Error>;

    /// Sum the signed amounts of the transactions linked to the wallet.
    fn signed_total_for_wallet(&self, id: WalletId) -> Result<i64, Error>;

    /// Get a budget by its ID.
    fn get_budget(&self, id: BudgetId) -> Result<Option<Budget>, Error>;

    /// Get the budgets of `user_id`, ordered by ID.
    fn list_budgets(&self, user_id: UserID) -> Result<Vec<Budget>, Error>;

    /// Get a wallet by its ID.
    fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, Error>;

    /// Get the wallets of `user_id`, ordered by ID.
    fn list_wallets(&self, user_id: UserID) -> Result<Vec<Wallet>, Error>;

    /// Get a transaction template by its ID.
    fn get_template(&self, id: TemplateId) -> Result<Option<TransactionTemplate>, Error>;

    /// Get the transaction templates of `user_id`, ordered by ID.
    fn list_templates(&self, user_id: UserID) -> Result<Vec<TransactionTemplate>, Error>;

    /// Get a depot by its ID.
    fn get_depot(&self, id: DepotId) -> Result<Option<Depot>, Error>;

    /// Get the depots of `user_id`, ordered by ID.
    fn list_depots(&self, user_id: UserID) -> Result<Vec<Depot>, Error>;

    /// Count the stocks held in the depot.
    fn count_stocks_for_depot(&self, id: DepotId) -> Result<u64, Error>;

    /// Get a stock by its ID.
    fn get_stock(&self, id: StockId) -> Result<Option<Stock>, Error>;

    /// Get the stocks of `user_id`, ordered by ID.
    fn list_stocks(&self, user_id: UserID) -> Result<Vec<Stock>, Error>;

    /// Get a user by their ID.
    fn get_user(&self, id: UserID) -> Result<Option<User>, Error>;

    /// Get a user by their username.
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error>;
}

/// Write access to the ledger.
///
/// `insert_*` assigns a new ID that is larger than every ID handed out
/// before. `update_*` overwrites the entity with the same ID. Both return
/// nothing special for unknown IDs, callers check existence first.
pub trait LedgerWrite: LedgerRead {
    /// Store a new transaction owned by `user_id`.
    fn insert_transaction(
        &mut self,
        user_id: UserID,
        builder: TransactionBuilder,
    ) -> Result<Transaction, Error>;

    /// Overwrite a stored transaction.
    fn update_transaction(&mut self, transaction: &Transaction) -> Result<RowsAffected, Error>;

    /// Remove a transaction.
    fn delete_transaction(&mut self, id: TransactionId) -> Result<RowsAffected, Error>;

    /// Store a new budget with a balance of zero.
    fn insert_budget(
        &mut self,
        user_id: UserID,
        name: &str,
        limit_in_cents: i64,
    ) -> Result<Budget, Error>;

    /// Overwrite a stored budget, including its balance.
    fn update_budget(&mut self, budget: &Budget) -> Result<RowsAffected, Error>;

    /// Remove a budget.
    fn delete_budget(&mut self, id: BudgetId) -> Result<RowsAffected, Error>;

    /// Store a new wallet with a balance of zero.
    fn insert_wallet(&mut self, user_id: UserID, name: &str) -> Result<Wallet, Error>;

    /// Overwrite a stored wallet, including its balance.
    fn update_wallet(&mut self, wallet: &Wallet) -> Result<RowsAffected, Error>;

    /// Remove a wallet.
    fn delete_wallet(&mut self, id: WalletId) -> Result<RowsAffected, Error>;

    /// Store a new transaction template owned by `user_id`.
    fn insert_template(
        &mut self,
        user_id: UserID,
        builder: TemplateBuilder,
    ) -> Result<TransactionTemplate, Error>;

    /// Overwrite a stored transaction template.
    fn update_template(&mut self, template: &TransactionTemplate) -> Result<RowsAffected, Error>;

    /// Remove a transaction template.
    fn delete_template(&mut self, id: TemplateId) -> Result<RowsAffected, Error>;

    /// Store a new depot.
    fn insert_depot(
        &mut self,
        user_id: UserID,
        name: &str,
        wallet_id: WalletId,
    ) -> Result<Depot, Error>;

    /// Overwrite a stored depot.
    fn update_depot(&mut self, depot: &Depot) -> Result<RowsAffected, Error>;

    /// Remove a depot.
    fn delete_depot(&mut self, id: DepotId) -> Result<RowsAffected, Error>;

    /// Store a new stock position.
    fn insert_stock(&mut self, user_id: UserID, stock: NewStock) -> Result<Stock, Error>;

    /// Overwrite a stored stock position.
    fn update_stock(&mut self, stock: &Stock) -> Result<RowsAffected, Error>;

    /// Remove a stock position.
    fn delete_stock(&mut self, id: StockId) -> Result<RowsAffected, Error>;

    /// Store a new user with a salary of zero.
    fn insert_user(&mut self, username: &str, password_hash: &PasswordHash)
    -> Result<User, Error>;

    /// Overwrite a stored user.
    fn update_user(&mut self, user: &User) -> Result<RowsAffected, Error>;
}

/// A handle to a ledger that can be shared between threads.
///
/// Reads see the latest committed state. Writes are serialized and atomic:
/// if `f` returns an error, none of its changes are kept.
pub trait LedgerStore: Clone + Send + Sync {
    /// Run `f` with read access to the ledger.
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerRead) -> Result<T, Error>) -> Result<T, Error>;

    /// Run `f` with exclusive write access to the ledger, committing its
    /// changes only if it returns `Ok`.
    fn write<T>(&self, f: impl FnOnce(&mut dyn LedgerWrite) -> Result<T, Error>)
    -> Result<T, Error>;
}

/// A ledger backend chosen at startup.
#[derive(Debug, Clone)]
pub enum Store {
    /// Keeps everything in memory, nothing survives a restart.
    Memory(MemoryStore),
    /// Keeps everything in a SQLite database.
    Sqlite(SqliteStore),
}

impl LedgerStore for Store {
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerRead) -> Result<T, Error>) -> Result<T, Error> {
        match self {
            Store::Memory(store) => store.read(f),
            Store::Sqlite(store) => store.read(f),
        }
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn LedgerWrite) -> Result<T, Error>,
    ) -> Result<T, Error> {
        match self {
            Store::Memory(store) => store.write(f),
            Store::Sqlite(store) => store.write(f),
        }
    }
}

impl From<MemoryStore> for Store {
    fn from(store: MemoryStore) -> Self {
        Store::Memory(store)
    }
}

impl From<SqliteStore> for Store {
    fn from(store: SqliteStore) -> Self {
        Store::Sqlite(store)
    }
}
