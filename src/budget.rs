//! Budgets: spending envelopes with a limit and a running balance.

use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    database_id::BudgetId,
    deletion_guard::{DeletionCheck, DeletionHint},
    stores::{LedgerRead, LedgerStore},
};

// ============================================================================
// MODELS
// ============================================================================

/// A spending envelope that transactions can optionally count against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// The ID of the budget.
    pub id: BudgetId,
    /// The user that owns the budget.
    pub user_id: UserID,
    /// The display name, never blank.
    pub name: String,
    /// How much may be spent, in cents. Always greater than zero.
    pub limit_in_cents: i64,
    /// The signed sum of the budget's transactions.
    ///
    /// Only changed as a side effect of transaction writes.
    pub balance_in_cents: i64,
}

/// Get the budget with `budget_id` if `user_id` owns it.
///
/// # Errors
/// Returns [Error::BudgetNotFound] if the budget does not exist or belongs to
/// someone else.
pub(crate) fn owned_budget<L>(
    ledger: &L,
    user_id: UserID,
    budget_id: BudgetId,
) -> Result<Budget, Error>
where
    L: LedgerRead + ?Sized,
{
    match ledger.get_budget(budget_id)? {
        Some(budget) if budget.user_id == user_id => Ok(budget),
        _ => Err(Error::BudgetNotFound),
    }
}

fn target_budget<L>(ledger: &L, user_id: UserID, budget_id: BudgetId) -> Result<Budget, Error>
where
    L: LedgerRead + ?Sized,
{
    owned_budget(ledger, user_id, budget_id).map_err(|_| {
        tracing::debug!("user {user_id} may not access budget {budget_id}");
        Error::Unauthorized
    })
}

fn validate(name: &str, limit_in_cents: i64) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::MissingBudgetName);
    }

    if limit_in_cents <= 0 {
        return Err(Error::InvalidAmount);
    }

    Ok(())
}

// ============================================================================
// SERVICE
// ============================================================================

/// Creates, renames and deletes the budgets of a user.
#[derive(Debug, Clone)]
pub struct BudgetService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> BudgetService<S> {
    /// Create a new budget service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a budget with a balance of zero.
    ///
    /// # Errors
    /// Returns [Error::MissingBudgetName] if `name` is blank,
    /// [Error::InvalidAmount] if the limit is not positive, or a storage error.
    pub fn create_budget(
        &self,
        user_id: UserID,
        name: &str,
        limit_in_cents: i64,
    ) -> Result<Budget, Error> {
        validate(name, limit_in_cents)?;

        let budget = self
            .store
            .write(|ledger| ledger.insert_budget(user_id, name.trim(), limit_in_cents))?;

        tracing::info!("user {user_id} created budget {} ({})", budget.id, budget.name);

        Ok(budget)
    }

    /// Get a budget of `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the budget does not exist or belongs
    /// to someone else.
    pub fn get_budget(&self, user_id: UserID, budget_id: BudgetId) -> Result<Budget, Error> {
        self.store
            .read(|ledger| target_budget(ledger, user_id, budget_id))
    }

    /// List the budgets of `user_id` by ID, each with whether it could be deleted.
    pub fn list_budgets(&self, user_id: UserID) -> Result<Vec<DeletionHint<Budget>>, Error> {
        self.store.read(|ledger| {
            ledger
                .list_budgets(user_id)?
                .into_iter()
                .map(|budget| -> Result<_, Error> {
                    let can_delete = DeletionCheck::for_budget(ledger, &budget)?.can_delete();
                    Ok(DeletionHint {
                        entity: budget,
                        can_delete,
                    })
                })
                .collect()
        })
    }

    /// Change the name and limit of a budget.
    ///
    /// The balance of `budget` is ignored, the stored balance is kept.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the budget does not exist or belongs
    /// to someone else, a validation error as for [BudgetService::create_budget],
    /// or a storage error.
    pub fn update_budget(&self, user_id: UserID, budget: Budget) -> Result<Budget, Error> {
        let updated = self.store.write(|ledger| {
            let existing = target_budget(ledger, user_id, budget.id)?;
            validate(&budget.name, budget.limit_in_cents)?;

            let updated = Budget {
                name: budget.name.trim().to_owned(),
                limit_in_cents: budget.limit_in_cents,
                ..existing
            };
            ledger.update_budget(&updated)?;

            Ok(updated)
        })?;

        tracing::info!("user {user_id} updated budget {}", updated.id);

        Ok(updated)
    }

    /// Delete an empty budget.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the budget does not exist or belongs
    /// to someone else, [Error::NotEmpty] if it still has transactions or a
    /// non-zero balance, or a storage error.
    pub fn delete_budget(&self, user_id: UserID, budget_id: BudgetId) -> Result<(), Error> {
        self.store.write(|ledger| {
            let budget = target_budget(ledger, user_id, budget_id)?;
            DeletionCheck::for_budget(ledger, &budget)?.ensure()?;
            ledger.delete_budget(budget.id)?;

            Ok(())
        })?;

        tracing::info!("user {user_id} deleted budget {budget_id}");

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
