//! An in-memory ledger store.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use crate::{
    Budget, Depot, Error, NewStock, PasswordHash, Stock, Transaction, TransactionBuilder,
    TransactionTemplate, User, UserID, Wallet,
    database_id::{BudgetId, DatabaseId, DepotId, StockId, TemplateId, TransactionId, WalletId},
    stores::{LedgerRead, LedgerStore, LedgerWrite, RowsAffected},
    template::TemplateBuilder,
    transaction::{TransactionFilter, TransactionRow, Window, newest_first},
};

/// Stores the ledger in maps guarded by a single reader-writer lock.
///
/// Clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&dyn LedgerRead) -> Result<T, Error>) -> Result<T, Error> {
        let tables = self.tables.read().map_err(|error| {
            tracing::error!("could not acquire read lock on memory store: {error}");
            Error::DatabaseLockError
        })?;

        f(&*tables)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut dyn LedgerWrite) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut tables = self.tables.write().map_err(|error| {
            tracing::error!("could not acquire write lock on memory store: {error}");
            Error::DatabaseLockError
        })?;

        let mut ledger = MemoryLedger {
            tables: &mut *tables,
            undo: Vec::new(),
        };

        let result = f(&mut ledger);

        if result.is_err() {
            ledger.rollback();
        }

        result
    }
}

#[derive(Debug, Default)]
struct Tables {
    transactions: BTreeMap<TransactionId, Transaction>,
    budgets: BTreeMap<BudgetId, Budget>,
    wallets: BTreeMap<WalletId, Wallet>,
    templates: BTreeMap<TemplateId, TransactionTemplate>,
    depots: BTreeMap<DepotId, Depot>,
    stocks: BTreeMap<StockId, Stock>,
    users: BTreeMap<DatabaseId, User>,
    sequences: Sequences,
}

/// The last ID handed out per table. Never rolled back, so IDs are never reused.
#[derive(Debug, Default)]
struct Sequences {
    transaction: DatabaseId,
    budget: DatabaseId,
    wallet: DatabaseId,
    template: DatabaseId,
    depot: DatabaseId,
    stock: DatabaseId,
    user: DatabaseId,
}

fn next_id(sequence: &mut DatabaseId) -> DatabaseId {
    *sequence += 1;
    *sequence
}

fn list_owned<T: Clone>(
    table: &BTreeMap<DatabaseId, T>,
    user_id: UserID,
    owner: impl Fn(&T) -> UserID,
) -> Vec<T> {
    table
        .values()
        .filter(|entity| owner(entity) == user_id)
        .cloned()
        .collect()
}

impl LedgerRead for Tables {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error> {
        Ok(self.transactions.get(&id).cloned())
    }

    fn query_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
        window: Window,
    ) -> Result<Vec<TransactionRow>, Error> {
        let mut matches: Vec<&Transaction> = self
            .transactions
            .values()
            .filter(|transaction| transaction.user_id == user_id && filter.matches(transaction))
            .collect();

        matches.sort_by(|a, b| newest_first(a, b));

        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = window
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|transaction| TransactionRow {
                wallet_name: self
                    .wallets
                    .get(&transaction.wallet_id)
                    .map(|wallet| wallet.name.clone())
                    .unwrap_or_default(),
                budget_name: transaction
                    .budget_id
                    .and_then(|budget_id| self.budgets.get(&budget_id))
                    .map(|budget| budget.name.clone()),
                transaction: transaction.clone(),
            })
            .collect())
    }

    fn count_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
    ) -> Result<u64, Error> {
        Ok(self
            .transactions
            .values()
            .filter(|transaction| transaction.user_id == user_id && filter.matches(transaction))
            .count() as u64)
    }

    fn count_transactions_for_budget(&self, id: BudgetId) -> Result<u64, Error> {
        Ok(self
            .transactions
            .values()
            .filter(|transaction| transaction.budget_id == Some(id))
            .count() as u64)
    }

    fn count_transactions_for_wallet(&self, id: WalletId) -> Result<u64, Error> {
        Ok(self
            .transactions
            .values()
            .filter(|transaction| transaction.wallet_id == id)
            .count() as u64)
    }

    fn signed_total_for_budget(&self, id: BudgetId) -> Result<i64, Error> {
        Ok(self
            .transactions
            .values()
            .filter(|transaction| transaction.budget_id == Some(id))
            .map(Transaction::signed_amount)
            .sum())
    }

    fn signed_total_for_wallet(&self, id: WalletId) -> Result<i64, Error> {
        Ok(self
            .transactions
            .values()
            .filter(|transaction| transaction.wallet_id == id)
            .map(Transaction::signed_amount)
            .sum())
    }

    fn get_budget(&self, id: BudgetId) -> Result<Option<Budget>, Error> {
        Ok(self.budgets.get(&id).cloned())
    }

    fn list_budgets(&self, user_id: UserID) -> Result<Vec<Budget>, Error> {
        Ok(list_owned(&self.budgets, user_id, |budget| budget.user_id))
    }

    fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, Error> {
        Ok(self.wallets.get(&id).cloned())
    }

    fn list_wallets(&self, user_id: UserID) -> Result<Vec<Wallet>, Error> {
        Ok(list_owned(&self.wallets, user_id, |wallet| wallet.user_id))
    }

    fn get_template(&self, id: TemplateId) -> Result<Option<TransactionTemplate>, Error> {
        Ok(self.templates.get(&id).cloned())
    }

    fn list_templates(&self, user_id: UserID) -> Result<Vec<TransactionTemplate>, Error> {
        Ok(list_owned(&self.templates, user_id, |template| {
            template.user_id
        }))
    }

    fn get_depot(&self, id: DepotId) -> Result<Option<Depot>, Error> {
        Ok(self.depots.get(&id).cloned())
    }

    fn list_depots(&self, user_id: UserID) -> Result<Vec<Depot>, Error> {
        Ok(list_owned(&self.depots, user_id, |depot| depot.user_id))
    }

    fn count_stocks_for_depot(&self, id: DepotId) -> Result<u64, Error> {
        Ok(self
            .stocks
            .values()
            .filter(|stock| stock.depot_id == id)
            .count() as u64)
    }

    fn get_stock(&self, id: StockId) -> Result<Option<Stock>, Error> {
        Ok(self.stocks.get(&id).cloned())
    }

    fn list_stocks(&self, user_id: UserID) -> Result<Vec<Stock>, Error> {
        Ok(list_owned(&self.stocks, user_id, |stock| stock.user_id))
    }

    fn get_user(&self, id: UserID) -> Result<Option<User>, Error> {
        Ok(self.users.get(&id.as_i64()).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }
}

type UndoStep = Box<dyn FnOnce(&mut Tables)>;

/// Write access to the tables for the duration of one [LedgerStore::write].
///
/// Every change records how to undo it so that a failed write leaves the
/// tables as they were.
struct MemoryLedger<'a> {
    tables: &'a mut Tables,
    undo: Vec<UndoStep>,
}

impl MemoryLedger<'_> {
    /// Put `value` under `id` (or remove the entry if `value` is `None`) and
    /// return the previous entry.
    fn replace<T: Clone + 'static>(
        &mut self,
        table: fn(&mut Tables) -> &mut BTreeMap<DatabaseId, T>,
        id: DatabaseId,
        value: Option<T>,
    ) -> Option<T> {
        let entries = table(self.tables);

        let previous = match value {
            Some(value) => entries.insert(id, value),
            None => entries.remove(&id),
        };

        let restore = previous.clone();
        self.undo.push(Box::new(move |tables| {
            let entries = table(tables);
            match restore {
                Some(value) => entries.insert(id, value),
                None => entries.remove(&id),
            };
        }));

        previous
    }

    /// Overwrite an existing entry, ignoring unknown IDs.
    fn overwrite<T: Clone + 'static>(
        &mut self,
        table: fn(&mut Tables) -> &mut BTreeMap<DatabaseId, T>,
        id: DatabaseId,
        value: &T,
    ) -> RowsAffected {
        if !table(self.tables).contains_key(&id) {
            return 0;
        }

        self.replace(table, id, Some(value.clone()));
        1
    }

    fn remove<T: Clone + 'static>(
        &mut self,
        table: fn(&mut Tables) -> &mut BTreeMap<DatabaseId, T>,
        id: DatabaseId,
    ) -> RowsAffected {
        self.replace(table, id, None).map_or(0, |_| 1)
    }

    fn rollback(&mut self) {
        let steps = self.undo.len();

        while let Some(step) = self.undo.pop() {
            step(self.tables);
        }

        tracing::debug!("rolled back {steps} change(s) to the memory store");
    }
}

fn transactions(tables: &mut Tables) -> &mut BTreeMap<TransactionId, Transaction> {
    &mut tables.transactions
}

fn budgets(tables: &mut Tables) -> &mut BTreeMap<BudgetId, Budget> {
    &mut tables.budgets
}

fn wallets(tables: &mut Tables) -> &mut BTreeMap<WalletId, Wallet> {
    &mut tables.wallets
}

fn templates(tables: &mut Tables) -> &mut BTreeMap<TemplateId, TransactionTemplate> {
    &mut tables.templates
}

fn depots(tables: &mut Tables) -> &mut BTreeMap<DepotId, Depot> {
    &mut tables.depots
}

fn stocks(tables: &mut Tables) -> &mut BTreeMap<StockId, Stock> {
    &mut tables.stocks
}

fn users(tables: &mut Tables) -> &mut BTreeMap<DatabaseId, User> {
    &mut tables.users
}

impl LedgerRead for MemoryLedger<'_> {
    fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, Error> {
        self.tables.get_transaction(id)
    }

    fn query_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
        window: Window,
    ) -> Result<Vec<TransactionRow>, Error> {
        self.tables.query_transactions(user_id, filter, window)
    }

    fn count_transactions(
        &self,
        user_id: UserID,
        filter: &TransactionFilter,
    ) -> Result<u64, Error> {
        self.tables.count_transactions(user_id, filter)
    }

    fn count_transactions_for_budget(&self, id: BudgetId) -> Result<u64, Error> {
        self.tables.count_transactions_for_budget(id)
    }

    fn count_transactions_for_wallet(&self, id: WalletId) -> Result<u64, Error> {
        self.tables.count_transactions_for_wallet(id)
    }

    fn signed_total_for_budget(&self, id: BudgetId) -> Result<i64, Error> {
        self.tables.signed_total_for_budget(id)
    }

    fn signed_total_for_wallet(&self, id: WalletId) -> Result<i64, Error> {
        self.tables.signed_total_for_wallet(id)
    }

    fn get_budget(&self, id: BudgetId) -> Result<Option<Budget>, Error> {
        self.tables.get_budget(id)
    }

    fn list_budgets(&self, user_id: UserID) -> Result<Vec<Budget>, Error> {
        self.tables.list_budgets(user_id)
    }

    fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, Error> {
        self.tables.get_wallet(id)
    }

    fn list_wallets(&self, user_id: UserID) -> Result<Vec<Wallet>, Error> {
        self.tables.list_wallets(user_id)
    }

    fn get_template(&self, id: TemplateId) -> Result<Option<TransactionTemplate>, Error> {
        self.tables.get_template(id)
    }

    fn list_templates(&self, user_id: UserID) -> Result<Vec<TransactionTemplate>, Error> {
        self.tables.list_templates(user_id)
    }

    fn get_depot(&self, id: DepotId) -> Result<Option<Depot>, Error> {
        self.tables.get_depot(id)
    }

    fn list_depots(&self, user_id: UserID) -> Result<Vec<Depot>, Error> {
        self.tables.list_depots(user_id)
    }

    fn count_stocks_for_depot(&self, id: DepotId) -> Result<u64, Error> {
        self.tables.count_stocks_for_depot(id)
    }

    fn get_stock(&self, id: StockId) -> Result<Option<Stock>, Error> {
        self.tables.get_stock(id)
    }

    fn list_stocks(&self, user_id: UserID) -> Result<Vec<Stock>, Error> {
        self.tables.list_stocks(user_id)
    }

    fn get_user(&self, id: UserID) -> Result<Option<User>, Error> {
        self.tables.get_user(id)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        self.tables.get_user_by_username(username)
    }
}

impl LedgerWrite for MemoryLedger<'_> {
    fn insert_transaction(
        &mut self,
        user_id: UserID,
        builder: TransactionBuilder,
    ) -> Result<Transaction, Error> {
        let id = next_id(&mut self.tables.sequences.transaction);
        let transaction = builder.finalize(id, user_id);
        self.replace(transactions, id, Some(transaction.clone()));

        Ok(transaction)
    }

    fn update_transaction(&mut self, transaction: &Transaction) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(transactions, transaction.id, transaction))
    }

    fn delete_transaction(&mut self, id: TransactionId) -> Result<RowsAffected, Error> {
        Ok(self.remove(transactions, id))
    }

    fn insert_budget(
        &mut self,
        user_id: UserID,
        name: &str,
        limit_in_cents: i64,
    ) -> Result<Budget, Error> {
        let budget = Budget {
            id: next_id(&mut self.tables.sequences.budget),
            user_id,
            name: name.to_owned(),
            limit_in_cents,
            balance_in_cents: 0,
        };
        self.replace(budgets, budget.id, Some(budget.clone()));

        Ok(budget)
    }

    fn update_budget(&mut self, budget: &Budget) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(budgets, budget.id, budget))
    }

    fn delete_budget(&mut self, id: BudgetId) -> Result<RowsAffected, Error> {
        Ok(self.remove(budgets, id))
    }

    fn insert_wallet(&mut self, user_id: UserID, name: &str) -> Result<Wallet, Error> {
        let wallet = Wallet {
            id: next_id(&mut self.tables.sequences.wallet),
            user_id,
            name: name.to_owned(),
            balance_in_cents: 0,
        };
        self.replace(wallets, wallet.id, Some(wallet.clone()));

        Ok(wallet)
    }

    fn update_wallet(&mut self, wallet: &Wallet) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(wallets, wallet.id, wallet))
    }

    fn delete_wallet(&mut self, id: WalletId) -> Result<RowsAffected, Error> {
        Ok(self.remove(wallets, id))
    }

    fn insert_template(
        &mut self,
        user_id: UserID,
        builder: TemplateBuilder,
    ) -> Result<TransactionTemplate, Error> {
        let id = next_id(&mut self.tables.sequences.template);
        let template = builder.finalize(id, user_id);
        self.replace(templates, id, Some(template.clone()));

        Ok(template)
    }

    fn update_template(&mut self, template: &TransactionTemplate) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(templates, template.id, template))
    }

    fn delete_template(&mut self, id: TemplateId) -> Result<RowsAffected, Error> {
        Ok(self.remove(templates, id))
    }

    fn insert_depot(
        &mut self,
        user_id: UserID,
        name: &str,
        wallet_id: WalletId,
    ) -> Result<Depot, Error> {
        let depot = Depot {
            id: next_id(&mut self.tables.sequences.depot),
            user_id,
            name: name.to_owned(),
            wallet_id,
        };
        self.replace(depots, depot.id, Some(depot.clone()));

        Ok(depot)
    }

    fn update_depot(&mut self, depot: &Depot) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(depots, depot.id, depot))
    }

    fn delete_depot(&mut self, id: DepotId) -> Result<RowsAffected, Error> {
        Ok(self.remove(depots, id))
    }

    fn insert_stock(&mut self, user_id: UserID, stock: NewStock) -> Result<Stock, Error> {
        let id = next_id(&mut self.tables.sequences.stock);
        let stock = stock.finalize(id, user_id);
        self.replace(stocks, id, Some(stock.clone()));

        Ok(stock)
    }

    fn update_stock(&mut self, stock: &Stock) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(stocks, stock.id, stock))
    }

    fn delete_stock(&mut self, id: StockId) -> Result<RowsAffected, Error> {
        Ok(self.remove(stocks, id))
    }

    fn insert_user(
        &mut self,
        username: &str,
        password_hash: &PasswordHash,
    ) -> Result<User, Error> {
        let user = User {
            id: UserID::new(next_id(&mut self.tables.sequences.user)),
            username: username.to_owned(),
            password_hash: password_hash.clone(),
            salary_cents: 0,
        };
        self.replace(users, user.id.as_i64(), Some(user.clone()));

        Ok(user)
    }

    fn update_user(&mut self, user: &User) -> Result<RowsAffected, Error> {
        Ok(self.overwrite(users, user.id.as_i64(), user))
    }
}
