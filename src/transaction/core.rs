//! Defines the core data models for transactions.

use std::collections::BTreeSet;

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    UserID,
    database_id::{BudgetId, TransactionId, WalletId},
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether a transaction adds money to or removes money from its wallet and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// The name the type is stored under.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }

    /// `amount_in_cents` with the sign this type contributes to a balance.
    pub fn signed(&self, amount_in_cents: i64) -> i64 {
        match self {
            TransactionType::Income => amount_in_cents,
            TransactionType::Expense => -amount_in_cents,
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "INCOME" => Ok(TransactionType::Income),
            "EXPENSE" => Ok(TransactionType::Expense),
            other => Err(FromSqlError::Other(
                format!("unknown transaction type {other:?}").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// The amount is always positive, [Transaction::transaction_type] carries the sign.
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// When the transaction happened, in UTC.
    pub date: OffsetDateTime,
    /// The budget the transaction counts against, if any.
    pub budget_id: Option<BudgetId>,
    /// The wallet the money moved in or out of.
    pub wallet_id: WalletId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money in cents, always greater than zero.
    pub amount_in_cents: i64,
    /// Whether the money was earned or spent.
    pub transaction_type: TransactionType,
    /// Whether the transaction has not cleared yet.
    pub is_pending: bool,
    /// Whether the transaction is money owed to or by someone.
    pub is_debt: Option<bool>,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        amount_in_cents: i64,
        transaction_type: TransactionType,
        wallet_id: WalletId,
        description: &str,
    ) -> TransactionBuilder {
        TransactionBuilder {
            amount_in_cents,
            transaction_type,
            wallet_id,
            description: description.to_owned(),
            date: OffsetDateTime::now_utc(),
            budget_id: None,
            is_pending: false,
            is_debt: None,
            tags: BTreeSet::new(),
        }
    }

    /// The amount this transaction contributes to its wallet's and budget's balance.
    pub fn signed_amount(&self) -> i64 {
        self.transaction_type.signed(self.amount_in_cents)
    }
}

/// A builder for creating [Transaction] instances.
///
/// The date defaults to now. The builder is not validated; the
/// [TransactionService](crate::TransactionService) checks it before it is stored.
///
/// # Examples
///
/// ```ignore
/// use time::macros::datetime;
///
/// let builder = Transaction::build(4599, TransactionType::Expense, wallet.id, "Coffee")
///     .date(datetime!(2025-01-15 08:30 UTC))
///     .budget_id(Some(budget.id));
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The amount of money in cents.
    pub amount_in_cents: i64,
    /// Whether the money was earned or spent.
    pub transaction_type: TransactionType,
    /// The wallet the money moved in or out of.
    pub wallet_id: WalletId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// When the transaction happened.
    pub date: OffsetDateTime,
    /// The budget the transaction counts against, if any.
    pub budget_id: Option<BudgetId>,
    /// Whether the transaction has not cleared yet.
    pub is_pending: bool,
    /// Whether the transaction is money owed to or by someone.
    pub is_debt: Option<bool>,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
}

impl TransactionBuilder {
    /// Set the date of the transaction. Dates are stored in UTC.
    pub fn date(mut self, date: OffsetDateTime) -> Self {
        self.date = date;
        self
    }

    /// Set the budget the transaction counts against.
    pub fn budget_id(mut self, budget_id: Option<BudgetId>) -> Self {
        self.budget_id = budget_id;
        self
    }

    /// Mark the transaction as pending.
    pub fn pending(mut self, is_pending: bool) -> Self {
        self.is_pending = is_pending;
        self
    }

    /// Mark the transaction as debt.
    pub fn debt(mut self, is_debt: Option<bool>) -> Self {
        self.is_debt = is_debt;
        self
    }

    /// Set the tags of the transaction.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Turn the builder into a stored transaction with the given IDs.
    pub(crate) fn finalize(self, id: TransactionId, user_id: UserID) -> Transaction {
        Transaction {
            id,
            user_id,
            date: self.date.to_offset(UtcOffset::UTC),
            budget_id: self.budget_id,
            wallet_id: self.wallet_id,
            description: self.description,
            amount_in_cents: self.amount_in_cents,
            transaction_type: self.transaction_type,
            is_pending: self.is_pending,
            is_debt: self.is_debt,
            tags: self.tags,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use time::{UtcOffset, macros::datetime};

    use crate::{
        UserID,
        transaction::{Transaction, TransactionType},
    };

    #[test]
    fn signed_amount_follows_type() {
        let income = Transaction::build(500, TransactionType::Income, 1, "Pay")
            .finalize(1, UserID::new(1));
        let expense = Transaction::build(500, TransactionType::Expense, 1, "Rent")
            .finalize(2, UserID::new(1));

        assert_eq!(income.signed_amount(), 500);
        assert_eq!(expense.signed_amount(), -500);
    }

    #[test]
    fn finalize_normalizes_date_to_utc() {
        let local = datetime!(2025-03-01 01:30 +02:00);

        let transaction = Transaction::build(1, TransactionType::Income, 1, "x")
            .date(local)
            .finalize(1, UserID::new(1));

        assert_eq!(transaction.date.offset(), UtcOffset::UTC);
        assert_eq!(transaction.date, local);
        assert_eq!(transaction.date, datetime!(2025-02-28 23:30 UTC));
    }

    #[test]
    fn tags_are_deduplicated() {
        let builder =
            Transaction::build(1, TransactionType::Income, 1, "x").tags(["food", "fun", "food"]);

        assert_eq!(builder.tags.len(), 2);
    }

    #[test]
    fn type_serializes_in_upper_case() {
        let json = serde_json::to_string(&TransactionType::Expense).unwrap();

        assert_eq!(json, "\"EXPENSE\"");
    }
}
