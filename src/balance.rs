//! Keeps the cached balances of wallets and budgets equal to the signed sum
//! of their linked transactions.
//!
//! Balances are adjusted incrementally on every transaction write. The
//! functions here must be called inside the same [LedgerStore::write] as the
//! transaction write so both commit together. [reconcile] recomputes
//! balances from scratch to find and repair drift.

use serde::{Deserialize, Serialize};

use crate::{
    Error, Transaction, UserID,
    database_id::DatabaseId,
    stores::{LedgerRead, LedgerStore, LedgerWrite},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Apply,
    Revert,
}

/// Add the signed amount of `transaction` to its wallet and budget, or take
/// it away again when reverting.
///
/// A wallet or budget that no longer exists is skipped with a warning under
/// the `balance_skip` target instead of failing the write.
fn apply_delta<L>(
    ledger: &mut L,
    transaction: &Transaction,
    direction: Direction,
) -> Result<(), Error>
where
    L: LedgerWrite + ?Sized,
{
    let delta = match direction {
        Direction::Apply => transaction.signed_amount(),
        Direction::Revert => -transaction.signed_amount(),
    };

    match ledger.get_wallet(transaction.wallet_id)? {
        Some(mut wallet) => {
            wallet.balance_in_cents += delta;
            ledger.update_wallet(&wallet)?;
        }
        None => tracing::warn!(
            target: "balance_skip",
            transaction_id = transaction.id,
            wallet_id = transaction.wallet_id,
            delta,
            "linked wallet is missing, skipping balance update"
        ),
    }

    let Some(budget_id) = transaction.budget_id else {
        return Ok(());
    };

    match ledger.get_budget(budget_id)? {
        Some(mut budget) => {
            budget.balance_in_cents += delta;
            ledger.update_budget(&budget)?;
        }
        None => tracing::warn!(
            target: "balance_skip",
            transaction_id = transaction.id,
            budget_id,
            delta,
            "linked budget is missing, skipping balance update"
        ),
    }

    Ok(())
}

/// Account for a newly stored transaction.
pub(crate) fn on_create<L>(ledger: &mut L, transaction: &Transaction) -> Result<(), Error>
where
    L: LedgerWrite + ?Sized,
{
    apply_delta(ledger, transaction, Direction::Apply)
}

/// Remove a deleted transaction from its balances.
pub(crate) fn on_delete<L>(ledger: &mut L, transaction: &Transaction) -> Result<(), Error>
where
    L: LedgerWrite + ?Sized,
{
    apply_delta(ledger, transaction, Direction::Revert)
}

/// Fully revert `old` before applying `new`, so that changes of amount,
/// type, wallet or budget all end up on the right balances.
pub(crate) fn on_update<L>(ledger: &mut L, old: &Transaction, new: &Transaction) -> Result<(), Error>
where
    L: LedgerWrite + ?Sized,
{
    apply_delta(ledger, old, Direction::Revert)?;
    apply_delta(ledger, new, Direction::Apply)
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Whether a drift was found on a wallet or a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftKind {
    /// A wallet balance.
    Wallet,
    /// A budget balance.
    Budget,
}

/// A cached balance that does not match the sum of its linked transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    /// Whether `id` is a wallet or a budget.
    pub kind: DriftKind,
    /// The wallet or budget ID.
    pub id: DatabaseId,
    /// The balance that was stored.
    pub cached_in_cents: i64,
    /// The signed sum of the linked transactions.
    pub actual_in_cents: i64,
}

fn collect_drift<L>(ledger: &L, user_id: UserID) -> Result<Vec<BalanceDrift>, Error>
where
    L: LedgerRead + ?Sized,
{
    let mut drift = Vec::new();

    for wallet in ledger.list_wallets(user_id)? {
        let actual_in_cents = ledger.signed_total_for_wallet(wallet.id)?;

        if actual_in_cents != wallet.balance_in_cents {
            drift.push(BalanceDrift {
                kind: DriftKind::Wallet,
                id: wallet.id,
                cached_in_cents: wallet.balance_in_cents,
                actual_in_cents,
            });
        }
    }

    for budget in ledger.list_budgets(user_id)? {
        let actual_in_cents = ledger.signed_total_for_budget(budget.id)?;

        if actual_in_cents != budget.balance_in_cents {
            drift.push(BalanceDrift {
                kind: DriftKind::Budget,
                id: budget.id,
                cached_in_cents: budget.balance_in_cents,
                actual_in_cents,
            });
        }
    }

    Ok(drift)
}

/// Recompute every wallet and budget balance of `user_id` and report the
/// ones that do not match, without changing anything.
pub fn find_drift<S: LedgerStore>(store: &S, user_id: UserID) -> Result<Vec<BalanceDrift>, Error> {
    store.read(|ledger| collect_drift(ledger, user_id))
}

/// Recompute every wallet and budget balance of `user_id`, overwrite the
/// ones that drifted in a single write and report what was changed.
pub fn reconcile<S: LedgerStore>(store: &S, user_id: UserID) -> Result<Vec<BalanceDrift>, Error> {
    store.write(|ledger| {
        let drift = collect_drift(ledger, user_id)?;

        for entry in &drift {
            tracing::warn!(
                "repairing {:?} {} of user {}: cached balance {} but transactions sum to {}",
                entry.kind,
                entry.id,
                user_id,
                entry.cached_in_cents,
                entry.actual_in_cents
            );

            match entry.kind {
                DriftKind::Wallet => {
                    if let Some(mut wallet) = ledger.get_wallet(entry.id)? {
                        wallet.balance_in_cents = entry.actual_in_cents;
                        ledger.update_wallet(&wallet)?;
                    }
                }
                DriftKind::Budget => {
                    if let Some(mut budget) = ledger.get_budget(entry.id)? {
                        budget.balance_in_cents = entry.actual_in_cents;
                        ledger.update_budget(&budget)?;
                    }
                }
            }
        }

        Ok(drift)
    })
}
