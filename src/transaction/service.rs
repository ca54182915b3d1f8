//! The single entry point for transaction writes.
//!
//! Every operation validates its input, checks that the caller owns what it
//! touches and adjusts wallet and budget balances in the same store write as
//! the transaction itself.

use time::OffsetDateTime;

use crate::{
    Error, UserID,
    balance::{on_create, on_delete, on_update},
    budget::owned_budget,
    database_id::{TransactionId, WalletId},
    pagination::PaginationConfig,
    stores::{LedgerRead, LedgerStore, LedgerWrite},
    transaction::{
        SearchCriteria, SearchResults, Transaction, TransactionBuilder, TransactionFilter,
        TransactionRow, TransactionType, Window,
    },
    wallet::owned_wallet,
};

/// Check the fields a caller controls on a new or edited transaction.
///
/// The budget is checked first, then the amount, the description and
/// finally the wallet.
fn validate<L>(
    ledger: &L,
    user_id: UserID,
    builder: &TransactionBuilder,
) -> Result<(), Error>
where
    L: LedgerRead + ?Sized,
{
    if let Some(budget_id) = builder.budget_id {
        owned_budget(ledger, user_id, budget_id)?;
    }

    if builder.amount_in_cents <= 0 {
        return Err(Error::InvalidAmount);
    }

    if builder.description.trim().is_empty() {
        return Err(Error::MissingDescription);
    }

    owned_wallet(ledger, user_id, builder.wallet_id)?;

    Ok(())
}

/// Validate, store and account for a new transaction inside an open write.
pub(crate) fn create_in_ledger<L>(
    ledger: &mut L,
    user_id: UserID,
    builder: TransactionBuilder,
) -> Result<Transaction, Error>
where
    L: LedgerWrite + ?Sized,
{
    validate(ledger, user_id, &builder)?;

    let transaction = ledger.insert_transaction(user_id, builder)?;
    on_create(ledger, &transaction)?;

    Ok(transaction)
}

/// Get the transaction with `id` if `user_id` owns it.
///
/// Missing transactions and those of other users are both reported as
/// [Error::Unauthorized].
fn owned_transaction<L>(
    ledger: &L,
    user_id: UserID,
    id: TransactionId,
) -> Result<Transaction, Error>
where
    L: LedgerRead + ?Sized,
{
    match ledger.get_transaction(id)? {
        Some(transaction) if transaction.user_id == user_id => Ok(transaction),
        _ => {
            tracing::debug!("user {user_id} may not access transaction {id}");
            Err(Error::Unauthorized)
        }
    }
}

/// Creates, edits, deletes, transfers and lists the transactions of a user.
#[derive(Debug, Clone)]
pub struct TransactionService<S: LedgerStore> {
    store: S,
    pagination: PaginationConfig,
}

impl<S: LedgerStore> TransactionService<S> {
    /// Create a service with the default page sizes.
    pub fn new(store: S) -> Self {
        Self::with_pagination(store, PaginationConfig::default())
    }

    /// Create a service with custom page sizes for [TransactionService::search_transactions].
    pub fn with_pagination(store: S, pagination: PaginationConfig) -> Self {
        Self { store, pagination }
    }

    /// Record a new transaction for `user_id` and add it to its wallet's and
    /// budget's balance.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::BudgetNotFound] if the budget does not exist or is not owned by `user_id`,
    /// - [Error::InvalidAmount] if the amount is not positive,
    /// - [Error::MissingDescription] if the description is blank,
    /// - [Error::WalletNotFound] if the wallet does not exist or is not owned by `user_id`,
    /// - or a storage error, in which case nothing was written.
    pub fn create_transaction(
        &self,
        user_id: UserID,
        builder: TransactionBuilder,
    ) -> Result<Transaction, Error> {
        let transaction = self
            .store
            .write(|ledger| create_in_ledger(ledger, user_id, builder))?;

        tracing::info!(
            "user {user_id} created transaction {} of {} cents in wallet {}",
            transaction.id,
            transaction.signed_amount(),
            transaction.wallet_id
        );

        Ok(transaction)
    }

    /// Get a transaction of `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the transaction does not exist or
    /// belongs to someone else.
    pub fn get_transaction(&self, user_id: UserID, id: TransactionId) -> Result<Transaction, Error> {
        self.store
            .read(|ledger| owned_transaction(ledger, user_id, id))
    }

    /// Replace the transaction with the same ID as `transaction`.
    ///
    /// The old transaction is taken off its wallet's and budget's balance and
    /// the new one is added, so changing the amount, type, wallet or budget
    /// all keep balances correct.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::Unauthorized] if the transaction does not exist or belongs to someone else,
    /// - any of the validation errors of [TransactionService::create_transaction],
    /// - or a storage error, in which case nothing was written.
    pub fn update_transaction(
        &self,
        user_id: UserID,
        transaction: Transaction,
    ) -> Result<Transaction, Error> {
        let updated = self.store.write(|ledger| {
            let existing = owned_transaction(ledger, user_id, transaction.id)?;

            let builder = TransactionBuilder {
                amount_in_cents: transaction.amount_in_cents,
                transaction_type: transaction.transaction_type,
                wallet_id: transaction.wallet_id,
                description: transaction.description,
                date: transaction.date,
                budget_id: transaction.budget_id,
                is_pending: transaction.is_pending,
                is_debt: transaction.is_debt,
                tags: transaction.tags,
            };
            validate(ledger, user_id, &builder)?;

            let updated = builder.finalize(existing.id, user_id);
            ledger.update_transaction(&updated)?;
            on_update(ledger, &existing, &updated)?;

            Ok(updated)
        })?;

        tracing::info!("user {user_id} updated transaction {}", updated.id);

        Ok(updated)
    }

    /// Delete a transaction and take it off its wallet's and budget's balance.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the transaction does not exist or
    /// belongs to someone else, or a storage error.
    pub fn delete_transaction(&self, user_id: UserID, id: TransactionId) -> Result<(), Error> {
        self.store.write(|ledger| {
            let existing = owned_transaction(ledger, user_id, id)?;

            on_delete(ledger, &existing)?;
            ledger.delete_transaction(existing.id)?;

            Ok(())
        })?;

        tracing::info!("user {user_id} deleted transaction {id}");

        Ok(())
    }

    /// Move `amount_in_cents` from one of the user's wallets to another.
    ///
    /// Creates an expense in `from_wallet_id` and an income in
    /// `to_wallet_id`, both dated now. Returns `(expense, income)`. Either
    /// both are stored and both balances change, or nothing happens.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::SameWalletTransfer] if both wallets are the same,
    /// - [Error::WalletNotFound] if either wallet does not exist or is not owned by `user_id`,
    /// - [Error::InvalidAmount] if the amount is not positive,
    /// - or a storage error.
    pub fn create_transfer(
        &self,
        user_id: UserID,
        from_wallet_id: WalletId,
        to_wallet_id: WalletId,
        amount_in_cents: i64,
    ) -> Result<(Transaction, Transaction), Error> {
        if from_wallet_id == to_wallet_id {
            return Err(Error::SameWalletTransfer);
        }

        let (expense, income) = self.store.write(|ledger| {
            let from = owned_wallet(ledger, user_id, from_wallet_id)?;
            let to = owned_wallet(ledger, user_id, to_wallet_id)?;

            if amount_in_cents <= 0 {
                return Err(Error::InvalidAmount);
            }

            let now = OffsetDateTime::now_utc();

            let expense = ledger.insert_transaction(
                user_id,
                Transaction::build(
                    amount_in_cents,
                    TransactionType::Expense,
                    from.id,
                    &format!("Transfer to {}", to.name),
                )
                .date(now),
            )?;
            on_create(ledger, &expense)?;

            let income = ledger.insert_transaction(
                user_id,
                Transaction::build(
                    amount_in_cents,
                    TransactionType::Income,
                    to.id,
                    &format!("Transfer from {}", from.name),
                )
                .date(now),
            )?;
            on_create(ledger, &income)?;

            Ok((expense, income))
        })?;

        tracing::info!(
            "user {user_id} transferred {amount_in_cents} cents from wallet {from_wallet_id} to wallet {to_wallet_id}"
        );

        Ok((expense, income))
    }

    /// List the transactions of `user_id`, most recent first, together with
    /// how many transactions the user has in total. Each row carries the
    /// names of its wallet and budget.
    ///
    /// `limit` of `None` or zero returns everything after `offset`.
    pub fn list_transactions(
        &self,
        user_id: UserID,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<(Vec<TransactionRow>, u64), Error> {
        let window = Window {
            offset,
            limit: limit.filter(|limit| *limit > 0),
        };
        let filter = TransactionFilter::default();

        self.store.read(|ledger| {
            Ok((
                ledger.query_transactions(user_id, &filter, window)?,
                ledger.count_transactions(user_id, &filter)?,
            ))
        })
    }

    /// Find one page of the transactions of `user_id` that match `criteria`.
    ///
    /// Page numbers start at 1. Missing or zero page numbers and sizes fall
    /// back to the first page and the default page size, and page sizes are
    /// capped at the configured maximum.
    pub fn search_transactions(
        &self,
        user_id: UserID,
        criteria: &SearchCriteria,
    ) -> Result<SearchResults, Error> {
        let page = criteria.page_request().resolve(&self.pagination);

        let (transactions, total) = self.store.read(|ledger| {
            Ok((
                ledger.query_transactions(user_id, &criteria.filter, page.window())?,
                ledger.count_transactions(user_id, &criteria.filter)?,
            ))
        })?;

        Ok(SearchResults {
            transactions,
            total,
            page: page.number,
            page_size: page.size,
        })
    }

    /// Count all transactions of `user_id`.
    pub fn count_transactions(&self, user_id: UserID) -> Result<u64, Error> {
        self.store
            .read(|ledger| ledger.count_transactions(user_id, &TransactionFilter::default()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
