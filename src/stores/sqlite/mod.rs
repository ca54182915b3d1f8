//! A SQLite backed ledger store.

mod budget;
mod depot;
mod template;
mod transaction;
mod user;
mod wallet;

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use rusqlite::{
    Connection, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{
    Budget, Depot, Error, NewStock, PasswordHash, Stock, Transaction, TransactionBuilder,
    TransactionTemplate, User, UserID, Wallet,
    database_id::{BudgetId, DepotId, StockId, TemplateId, TransactionId, WalletId},
    stores::{LedgerRead, LedgerStore, LedgerWrite, RowsAffected},
    template::TemplateBuilder,
    transaction::{TransactionFilter, TransactionRow, Window},
};

/// Stores the ledger in a SQLite database.
///
/// Clones share the same connection. Every [LedgerStore::write] runs inside
/// one SQL transaction.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap `connection`, creating the ledger tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the tables could not be created.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::info!("opening SQLite database at {}", path.display());

        Self::new(Connection::open(path)?)
    }

    /// Create a store backed by a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::new(Connection::open_in_memory()?)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl LedgerStore for SqliteStore {
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerRead) -> Result<T, Error>) -> Result<T, Error> {
        let connection = self.lock()?;

        f(&SqliteLedger {
            connection: &connection,
        })
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn LedgerWrite) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut connection = self.lock()?;
        let sql_transaction = connection.transaction()?;

        let result = f(&mut SqliteLedger {
            connection: &sql_transaction,
        });

        match result {
            Ok(value) => {
                sql_transaction.commit()?;
                Ok(value)
            }
            Err(error) => {
                match sql_transaction.rollback() {
                    Ok(()) => tracing::debug!("rolled back SQL transaction after error: {error}"),
                    Err(rollback_error) => tracing::error!(
                        "could not roll back SQL transaction after error {error}: {rollback_error}"
                    ),
                }

                Err(error)
            }
        }
    }
}

/// Create the tables for every ledger entity.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    transaction::register_functions(connection)?;
    user::create_user_table(connection)?;
    budget::create_budget_table(connection)?;
    wallet::create_wallet_table(connection)?;
    transaction::create_transaction_table(connection)?;
    template::create_template_table(connection)?;
    depot::create_depot_table(connection)?;
    depot::create_stock_table(connection)?;

    Ok(())
}

const STORED_DATE_TIME_FORMAT: &[BorrowedFormatItem] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:9]"
);

/// A UTC timestamp stored as fixed-width text, so that comparing and
/// sorting the column as text is the same as comparing the timestamps.
pub(crate) struct StoredDateTime(pub OffsetDateTime);

impl ToSql for StoredDateTime {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let utc = self.0.to_offset(UtcOffset::UTC);
        let text = PrimitiveDateTime::new(utc.date(), utc.time())
            .format(STORED_DATE_TIME_FORMAT)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;

        Ok(ToSqlOutput::from(text))
    }
}

impl FromSql for StoredDateTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        PrimitiveDateTime::parse(value.as_str()?, STORED_DATE_TIME_FORMAT)
            .map(|date_time| StoredDateTime(date_time.assume_utc()))
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Read access to the database for the duration of one
/// [LedgerStore::read] or [LedgerStore::write].
struct SqliteLedger<'a> {
    connection: &'a Connection,
}

impl LedgerRead for SqliteLedger<'_> {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error> {
        transaction::get_transaction(id, self.connection)
    }

    fn query_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
        window: Window,
    ) -> Result<Vec<TransactionRow>, Error> {
        transaction::query_transactions(user_id, filter, window, self.connection)
    }

    fn count_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
    ) -> Result<u64, Error> {
        transaction::count_transactions(user_id, filter, self.connection)
    }

    fn count_transactions_for_budget(&self, id: BudgetId) -> Result<u64, Error> {
        transaction::count_linked(transaction::Link::Budget(id), self.connection)
    }

    fn count_transactions_for_wallet(&self, id: WalletId) -> Result<u64, Error> {
        transaction::count_linked(transaction::Link::Wallet(id), self.connection)
    }

    fn signed_total_for_budget(&self, id: BudgetId) -> Result<i64, Error> {
        transaction::signed_total(transaction::Link::Budget(id), self.connection)
    }

    fn signed_total_for_wallet(&self, id: WalletId) -> Result<i64, Error> {
        transaction::signed_total(transaction::Link::Wallet(id), self.connection)
    }

    fn get_budget(&self, id: BudgetId) -> Result<Option<Budget>, Error> {
        budget::get_budget(id, self.connection)
    }

    fn list_budgets(&self, user_id: UserID) -> Result<Vec<Budget>, Error> {
        budget::list_budgets(user_id, self.connection)
    }

    fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, Error> {
        wallet::get_wallet(id, self.connection)
    }

    fn list_wallets(&self, user_id: UserID) -> Result<Vec<Wallet>, Error> {
        wallet::list_wallets(user_id, self.connection)
    }

    fn get_template(&self, id: TemplateId) -> Result<Option<TransactionTemplate>, Error> {
        template::get_template(id, self.connection)
    }

    fn list_templates(&self, user_id: UserID) -> Result<Vec<TransactionTemplate>, Error> {
        template::list_templates(user_id, self.connection)
    }

    fn get_depot(&self, id: DepotId) -> Result<Option<Depot>, Error> {
        depot::get_depot(id, self.connection)
    }

    fn list_depots(&self, user_id: UserID) -> Result<Vec<Depot>, Error> {
        depot::list_depots(user_id, self.connection)
    }

    fn count_stocks_for_depot(&self, id: DepotId) -> Result<u64, Error> {
        depot::count_stocks_for_depot(id, self.connection)
    }

    fn get_stock(&self, id: StockId) -> Result<Option<Stock>, Error> {
        depot::get_stock(id, self.connection)
    }

    fn list_stocks(&self, user_id: UserID) -> Result<Vec<Stock>, Error> {
        depot::list_stocks(user_id, self.connection)
    }

    fn get_user(&self, id: UserID) -> Result<Option<User>, Error> {
        user::get_user(id, self.connection)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        user::get_user_by_username(username, self.connection)
    }
}

impl LedgerWrite for SqliteLedger<'_> {
    fn insert_transaction(
        &mut self,
        user_id: UserID,
        builder: TransactionBuilder,
    ) -> Result<Transaction, Error> {
        transaction::create_transaction(user_id, builder, self.connection)
    }

    fn update_transaction(&mut self, transaction: &Transaction) -> Result<RowsAffected, Error> {
        transaction::update_transaction(transaction, self.connection)
    }

    fn delete_transaction(&mut self, id: TransactionId) -> Result<RowsAffected, Error> {
        transaction::delete_transaction(id, self.connection)
    }

    fn insert_budget(
        &mut self,
        user_id: UserID,
        name: &str,
        limit_in_cents: i64,
    ) -> Result<Budget, Error> {
        budget::create_budget(user_id, name, limit_in_cents, self.connection)
    }

    fn update_budget(&mut self, budget: &Budget) -> Result<RowsAffected, Error> {
        budget::update_budget(budget, self.connection)
    }

    fn delete_budget(&mut self, id: BudgetId) -> Result<RowsAffected, Error> {
        budget::delete_budget(id, self.connection)
    }

    fn insert_wallet(&mut self, user_id: UserID, name: &str) -> Result<Wallet, Error> {
        wallet::create_wallet(user_id, name, self.connection)
    }

    fn update_wallet(&mut self, wallet: &Wallet) -> Result<RowsAffected, Error> {
        wallet::update_wallet(wallet, self.connection)
    }

    fn delete_wallet(&mut self, id: WalletId) -> Result<RowsAffected, Error> {
        wallet::delete_wallet(id, self.connection)
    }

    fn insert_template(
        &mut self,
        user_id: UserID,
        builder: TemplateBuilder,
    ) -> Result<TransactionTemplate, Error> {
        template::create_template(user_id, builder, self.connection)
    }

    fn update_template(&mut self, template: &TransactionTemplate) -> Result<RowsAffected, Error> {
        template::update_template(template, self.connection)
    }

    fn delete_template(&mut self, id: TemplateId) -> Result<RowsAffected, Error> {
        template::delete_template(id, self.connection)
    }

    fn insert_depot(
        &mut self,
        user_id: UserID,
        name: &str,
        wallet_id: WalletId,
    ) -> Result<Depot, Error> {
        depot::create_depot(user_id, name, wallet_id, self.connection)
    }

    fn update_depot(&mut self, depot: &Depot) -> Result<RowsAffected, Error> {
        depot::update_depot(depot, self.connection)
    }

    fn delete_depot(&mut self, id: DepotId) -> Result<RowsAffected, Error> {
        depot::delete_depot(id, self.connection)
    }

    fn insert_stock(&mut self, user_id: UserID, stock: NewStock) -> Result<Stock, Error> {
        depot::create_stock(user_id, stock, self.connection)
    }

    fn update_stock(&mut self, stock: &Stock) -> Result<RowsAffected, Error> {
        depot::update_stock(stock, self.connection)
    }

    fn delete_stock(&mut self, id: StockId) -> Result<RowsAffected, Error> {
        depot::delete_stock(id, self.connection)
    }

    fn insert_user(
        &mut self,
        username: &str,
        password_hash: &PasswordHash,
    ) -> Result<User, Error> {
        user::create_user(username, password_hash, self.connection)
    }

    fn update_user(&mut self, user: &User) -> Result<RowsAffected, Error> {
        user::update_user(user, self.connection)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error, LedgerStore, Transaction, TransactionType, UserID,
        stores::{LedgerRead, LedgerWrite, SqliteStore, sqlite::StoredDateTime},
    };

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        super::initialize(&connection).unwrap();
        super::initialize(&connection).unwrap();
    }

    #[test]
    fn stored_date_time_sorts_as_text() {
        let connection = Connection::open_in_memory().unwrap();
        let earlier = datetime!(2025-01-01 09:00:00.5 UTC);
        let later = datetime!(2025-01-01 09:00:00.25 +00:00) + time::Duration::seconds(1);

        let is_ordered: bool = connection
            .query_row(
                "SELECT ?1 < ?2",
                (StoredDateTime(earlier), StoredDateTime(later)),
                |row| row.get(0),
            )
            .unwrap();

        assert!(is_ordered);
    }

    #[test]
    fn stored_date_time_keeps_value() {
        let connection = Connection::open_in_memory().unwrap();
        let want = datetime!(2025-01-01 09:00:00.123456789 +05:00);

        let got: StoredDateTime = connection
            .query_row("SELECT ?1", (StoredDateTime(want),), |row| row.get(0))
            .unwrap();

        assert_eq!(got.0, want);
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user_id = UserID::new(1);

        let result: Result<(), Error> = store.write(|ledger| {
            ledger.insert_wallet(user_id, "Cash")?;
            Err(Error::NotEmpty)
        });

        assert_eq!(result, Err(Error::NotEmpty));
        let wallets = store
            .read(|ledger| ledger.list_wallets(user_id))
            .unwrap();
        assert!(wallets.is_empty());
    }

    #[test]
    fn failed_write_rolls_back_every_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user_id = UserID::new(1);
        let (wallet, budget) = store
            .write(|ledger| {
                Ok((
                    ledger.insert_wallet(user_id, "Cash")?,
                    ledger.insert_budget(user_id, "Food", 500)?,
                ))
            })
            .unwrap();

        let result: Result<(), Error> = store.write(|ledger| {
            ledger.insert_transaction(
                user_id,
                Transaction::build(100, TransactionType::Expense, wallet.id, "Lunch")
                    .budget_id(Some(budget.id)),
            )?;
            let mut changed_wallet = ledger.get_wallet(wallet.id)?.unwrap();
            changed_wallet.balance_in_cents = -100;
            ledger.update_wallet(&changed_wallet)?;
            let mut changed_budget = ledger.get_budget(budget.id)?.unwrap();
            changed_budget.balance_in_cents = -100;
            ledger.update_budget(&changed_budget)?;
            ledger.delete_wallet(wallet.id)?;

            Err(Error::NotEmpty)
        });

        assert_eq!(result, Err(Error::NotEmpty));
        let (stored_wallet, stored_budget, count) = store
            .read(|ledger| {
                Ok((
                    ledger.get_wallet(wallet.id)?,
                    ledger.get_budget(budget.id)?,
                    ledger.count_transactions_for_wallet(wallet.id)?,
                ))
            })
            .unwrap();
        assert_eq!(stored_wallet, Some(wallet));
        assert_eq!(stored_budget, Some(budget));
        assert_eq!(count, 0);
    }
}
