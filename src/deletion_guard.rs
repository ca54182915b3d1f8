//! Refuses to delete budgets, wallets and depots that still have something in them.

use serde::{Deserialize, Serialize};

use crate::{
    Budget, Depot, Error, Wallet,
    stores::LedgerRead,
};

/// What is still linked to a budget, wallet or depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeletionCheck {
    balance_in_cents: i64,
    linked_entries: u64,
}

impl DeletionCheck {
    pub(crate) fn for_budget<L>(ledger: &L, budget: &Budget) -> Result<Self, Error>
    where
        L: LedgerRead + ?Sized,
    {
        Ok(Self {
            balance_in_cents: budget.balance_in_cents,
            linked_entries: ledger.count_transactions_for_budget(budget.id)?,
        })
    }

    pub(crate) fn for_wallet<L>(ledger: &L, wallet: &Wallet) -> Result<Self, Error>
    where
        L: LedgerRead + ?Sized,
    {
        Ok(Self {
            balance_in_cents: wallet.balance_in_cents,
            linked_entries: ledger.count_transactions_for_wallet(wallet.id)?,
        })
    }

    /// Depots have no balance, only the stocks held in them count.
    pub(crate) fn for_depot<L>(ledger: &L, depot: &Depot) -> Result<Self, Error>
    where
        L: LedgerRead + ?Sized,
    {
        Ok(Self {
            balance_in_cents: 0,
            linked_entries: ledger.count_stocks_for_depot(depot.id)?,
        })
    }

    /// Only empty entities with a zero balance may be deleted.
    pub(crate) fn can_delete(&self) -> bool {
        self.balance_in_cents == 0 && self.linked_entries == 0
    }

    /// # Errors
    ///
    /// Returns [Error::NotEmpty] if the entity cannot be deleted.
    pub(crate) fn ensure(&self) -> Result<(), Error> {
        if self.can_delete() {
            Ok(())
        } else {
            tracing::debug!(
                "refusing to delete entity with balance {} and {} linked entries",
                self.balance_in_cents,
                self.linked_entries
            );
            Err(Error::NotEmpty)
        }
    }
}

/// An entity together with whether it could be deleted right now.
///
/// The flag is a hint for display. Deletes check again when they run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionHint<T> {
    /// The budget, wallet or depot.
    #[serde(flatten)]
    pub entity: T,
    /// Whether the entity is empty and has a zero balance.
    pub can_delete: bool,
}

#[cfg(test)]
mod tests {
    use super::DeletionCheck;
    use crate::Error;

    #[test]
    fn empty_entity_can_be_deleted() {
        let check = DeletionCheck {
            balance_in_cents: 0,
            linked_entries: 0,
        };

        assert!(check.can_delete());
        assert_eq!(check.ensure(), Ok(()));
    }

    #[test]
    fn linked_entries_block_deletion_even_with_zero_balance() {
        let check = DeletionCheck {
            balance_in_cents: 0,
            linked_entries: 2,
        };

        assert_eq!(check.ensure(), Err(Error::NotEmpty));
    }

    #[test]
    fn non_zero_balance_blocks_deletion() {
        let check = DeletionCheck {
            balance_in_cents: -1,
            linked_entries: 0,
        };

        assert_eq!(check.ensure(), Err(Error::NotEmpty));
    }
}
