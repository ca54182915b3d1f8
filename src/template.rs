//! Recurring transaction templates, e.g. rent on the first of every month.
//!
//! A template is turned into a real transaction for a given month with
//! [TemplateService::instantiate_template]. The transaction goes through the
//! same validation and balance bookkeeping as any other transaction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::{
    Error, Transaction, TransactionType, UserID,
    budget::owned_budget,
    database_id::{BudgetId, TemplateId, WalletId},
    stores::{LedgerRead, LedgerStore},
    transaction::create_in_ledger,
    wallet::owned_wallet,
};

// ============================================================================
// MODELS
// ============================================================================

/// A transaction that repeats on the same day every month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTemplate {
    /// The ID of the template.
    pub id: TemplateId,
    /// The user that owns the template.
    pub user_id: UserID,
    /// The day of the month, 1 to 31. Short months use their last day instead.
    pub day: u8,
    /// The budget the transactions count against, if any.
    pub budget_id: Option<BudgetId>,
    /// The wallet the money moves in or out of.
    pub wallet_id: WalletId,
    /// The description copied to every transaction.
    pub description: String,
    /// The amount in cents, always greater than zero.
    pub amount_in_cents: i64,
    /// Whether the money is earned or spent.
    pub transaction_type: TransactionType,
    /// Tags copied to every transaction.
    pub tags: BTreeSet<String>,
}

impl TransactionTemplate {
    /// Create a new template.
    ///
    /// Shortcut for [TemplateBuilder] for discoverability.
    pub fn build(
        day: u8,
        wallet_id: WalletId,
        description: &str,
        amount_in_cents: i64,
        transaction_type: TransactionType,
    ) -> TemplateBuilder {
        TemplateBuilder {
            day,
            wallet_id,
            description: description.to_owned(),
            amount_in_cents,
            transaction_type,
            budget_id: None,
            tags: BTreeSet::new(),
        }
    }
}

/// A builder for creating [TransactionTemplate] instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBuilder {
    /// The day of the month, 1 to 31.
    pub day: u8,
    /// The wallet the money moves in or out of.
    pub wallet_id: WalletId,
    /// The description copied to every transaction.
    pub description: String,
    /// The amount in cents.
    pub amount_in_cents: i64,
    /// Whether the money is earned or spent.
    pub transaction_type: TransactionType,
    /// The budget the transactions count against, if any.
    pub budget_id: Option<BudgetId>,
    /// Tags copied to every transaction.
    pub tags: BTreeSet<String>,
}

impl TemplateBuilder {
    /// Set the budget the transactions count against.
    pub fn budget_id(mut self, budget_id: Option<BudgetId>) -> Self {
        self.budget_id = budget_id;
        self
    }

    /// Set the tags copied to every transaction.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn finalize(self, id: TemplateId, user_id: UserID) -> TransactionTemplate {
        TransactionTemplate {
            id,
            user_id,
            day: self.day,
            budget_id: self.budget_id,
            wallet_id: self.wallet_id,
            description: self.description,
            amount_in_cents: self.amount_in_cents,
            transaction_type: self.transaction_type,
            tags: self.tags,
        }
    }
}

fn validate<L>(ledger: &L, user_id: UserID, builder: &TemplateBuilder) -> Result<(), Error>
where
    L: LedgerRead + ?Sized,
{
    if !(1..=31).contains(&builder.day) {
        return Err(Error::InvalidDay(builder.day));
    }

    if builder.description.trim().is_empty() {
        return Err(Error::MissingDescription);
    }

    if builder.amount_in_cents <= 0 {
        return Err(Error::InvalidAmount);
    }

    if let Some(budget_id) = builder.budget_id {
        owned_budget(ledger, user_id, budget_id)?;
    }

    owned_wallet(ledger, user_id, builder.wallet_id)?;

    Ok(())
}

fn target_template<L>(
    ledger: &L,
    user_id: UserID,
    template_id: TemplateId,
) -> Result<TransactionTemplate, Error>
where
    L: LedgerRead + ?Sized,
{
    match ledger.get_template(template_id)? {
        Some(template) if template.user_id == user_id => Ok(template),
        _ => {
            tracing::debug!("user {user_id} may not access template {template_id}");
            Err(Error::Unauthorized)
        }
    }
}

/// The date `day` falls on in `month`, moved back to the last day of the
/// month if the month is too short.
fn clamped_date(year: i32, month: Month, day: u8) -> Result<Date, Error> {
    let first_of_next_month = match month {
        Month::December => {
            let next_year = year
                .checked_add(1)
                .ok_or_else(|| Error::InvalidDate(format!("year {year} is out of range")))?;
            Date::from_calendar_date(next_year, Month::January, 1)?
        }
        _ => Date::from_calendar_date(year, month.next(), 1)?,
    };
    let last_day = first_of_next_month
        .previous_day()
        .ok_or_else(|| Error::InvalidDate(format!("{month} {year} has no last day")))?
        .day();

    Ok(Date::from_calendar_date(year, month, day.min(last_day))?)
}

// ============================================================================
// SERVICE
// ============================================================================

/// Creates, edits, deletes and instantiates the transaction templates of a user.
#[derive(Debug, Clone)]
pub struct TemplateService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> TemplateService<S> {
    /// Create a new template service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Store a new template.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::InvalidDay] if the day is not between 1 and 31,
    /// - [Error::MissingDescription] if the description is blank,
    /// - [Error::InvalidAmount] if the amount is not positive,
    /// - [Error::BudgetNotFound] or [Error::WalletNotFound] if they are not owned by `user_id`,
    /// - or a storage error.
    pub fn create_template(
        &self,
        user_id: UserID,
        builder: TemplateBuilder,
    ) -> Result<TransactionTemplate, Error> {
        let template = self.store.write(|ledger| {
            validate(ledger, user_id, &builder)?;
            ledger.insert_template(user_id, builder)
        })?;

        tracing::info!("user {user_id} created template {}", template.id);

        Ok(template)
    }

    /// Get a template of `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the template does not exist or
    /// belongs to someone else.
    pub fn get_template(
        &self,
        user_id: UserID,
        template_id: TemplateId,
    ) -> Result<TransactionTemplate, Error> {
        self.store
            .read(|ledger| target_template(ledger, user_id, template_id))
    }

    /// List the templates of `user_id` by ID.
    pub fn list_templates(&self, user_id: UserID) -> Result<Vec<TransactionTemplate>, Error> {
        self.store.read(|ledger| ledger.list_templates(user_id))
    }

    /// Replace the template with the same ID as `template`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the template does not exist or
    /// belongs to someone else, or an error as for [TemplateService::create_template].
    pub fn update_template(
        &self,
        user_id: UserID,
        template: TransactionTemplate,
    ) -> Result<TransactionTemplate, Error> {
        let updated = self.store.write(|ledger| {
            let existing = target_template(ledger, user_id, template.id)?;

            let builder = TemplateBuilder {
                day: template.day,
                wallet_id: template.wallet_id,
                description: template.description,
                amount_in_cents: template.amount_in_cents,
                transaction_type: template.transaction_type,
                budget_id: template.budget_id,
                tags: template.tags,
            };
            validate(ledger, user_id, &builder)?;

            let updated = builder.finalize(existing.id, user_id);
            ledger.update_template(&updated)?;

            Ok(updated)
        })?;

        tracing::info!("user {user_id} updated template {}", updated.id);

        Ok(updated)
    }

    /// Delete a template. Transactions created from it are kept.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the template does not exist or
    /// belongs to someone else, or a storage error.
    pub fn delete_template(&self, user_id: UserID, template_id: TemplateId) -> Result<(), Error> {
        self.store.write(|ledger| {
            let template = target_template(ledger, user_id, template_id)?;
            ledger.delete_template(template.id)?;

            Ok(())
        })?;

        tracing::info!("user {user_id} deleted template {template_id}");

        Ok(())
    }

    /// Create the transaction a template describes for `month` of `year`.
    ///
    /// The transaction is dated at midnight UTC on the template's day, or on
    /// the last day of the month if the month is shorter. The wallet and
    /// budget of the template must still exist and belong to `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the template does not exist or
    /// belongs to someone else, [Error::InvalidDate] if the year is out of
    /// range, or an error as for [TransactionService::create_transaction](crate::TransactionService::create_transaction).
    pub fn instantiate_template(
        &self,
        user_id: UserID,
        template_id: TemplateId,
        year: i32,
        month: Month,
    ) -> Result<Transaction, Error> {
        let transaction = self.store.write(|ledger| {
            let template = target_template(ledger, user_id, template_id)?;
            let date = clamped_date(year, month, template.day)?;

            let builder = Transaction::build(
                template.amount_in_cents,
                template.transaction_type,
                template.wallet_id,
                &template.description,
            )
            .date(date.midnight().assume_utc())
            .budget_id(template.budget_id)
            .tags(template.tags);

            create_in_ledger(ledger, user_id, builder)
        })?;

        tracing::info!(
            "user {user_id} created transaction {} from template {template_id} for {month} {year}",
            transaction.id
        );

        Ok(transaction)
    }
}

// ============================================================================
// TESTS
// ============================================================================
