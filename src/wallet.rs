//! Wallets: the accounts money is held in.

use serde::{Deserialize, Serialize};

use crate::{
    Error, UserID,
    database_id::WalletId,
    deletion_guard::{DeletionCheck, DeletionHint},
    stores::{LedgerRead, LedgerStore},
};

/// An account that holds money, e.g. a bank account or a cash jar.
///
/// Every transaction moves money in or out of exactly one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// The ID of the wallet.
    pub id: WalletId,
    /// The user that owns the wallet.
    pub user_id: UserID,
    /// The display name, never blank.
    pub name: String,
    /// The signed sum of the wallet's transactions, including transfers.
    pub balance_in_cents: i64,
}

/// Get the wallet with `wallet_id` if `user_id` owns it.
///
/// # Errors
/// Returns [Error::WalletNotFound] if the wallet does not exist or belongs to
/// someone else.
pub(crate) fn owned_wallet<L>(
    ledger: &L,
    user_id: UserID,
    wallet_id: WalletId,
) -> Result<Wallet, Error>
where
    L: LedgerRead + ?Sized,
{
    match ledger.get_wallet(wallet_id)? {
        Some(wallet) if wallet.user_id == user_id => Ok(wallet),
        _ => Err(Error::WalletNotFound),
    }
}

fn target_wallet<L>(ledger: &L, user_id: UserID, wallet_id: WalletId) -> Result<Wallet, Error>
where
    L: LedgerRead + ?Sized,
{
    owned_wallet(ledger, user_id, wallet_id).map_err(|_| {
        tracing::debug!("user {user_id} may not access wallet {wallet_id}");
        Error::Unauthorized
    })
}

/// Creates, renames, totals and deletes the wallets of a user.
#[derive(Debug, Clone)]
pub struct WalletService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> WalletService<S> {
    /// Create a new wallet service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a wallet with a balance of zero.
    ///
    /// # Errors
    /// Returns [Error::MissingWalletName] if `name` is blank, or a storage error.
    pub fn create_wallet(&self, user_id: UserID, name: &str) -> Result<Wallet, Error> {
        let name = name.trim();

        if name.is_empty() {
            return Err(Error::MissingWalletName);
        }

        let wallet = self
            .store
            .write(|ledger| ledger.insert_wallet(user_id, name))?;

        tracing::info!("user {user_id} created wallet {} ({})", wallet.id, wallet.name);

        Ok(wallet)
    }

    /// Get a wallet of `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the wallet does not exist or belongs
    /// to someone else.
    pub fn get_wallet(&self, user_id: UserID, wallet_id: WalletId) -> Result<Wallet, Error> {
        self.store
            .read(|ledger| target_wallet(ledger, user_id, wallet_id))
    }

    /// List the wallets of `user_id` by ID, each with whether it could be deleted.
    pub fn list_wallets(&self, user_id: UserID) -> Result<Vec<DeletionHint<Wallet>>, Error> {
        self.store.read(|ledger| {
            ledger
                .list_wallets(user_id)?
                .into_iter()
                .map(|wallet| -> Result<_, Error> {
                    let can_delete = DeletionCheck::for_wallet(ledger, &wallet)?.can_delete();
                    Ok(DeletionHint {
                        entity: wallet,
                        can_delete,
                    })
                })
                .collect()
        })
    }

    /// The sum of the balances of all wallets of `user_id`, zero if there are none.
    pub fn total_balance(&self, user_id: UserID) -> Result<i64, Error> {
        self.store.read(|ledger| {
            Ok(ledger
                .list_wallets(user_id)?
                .iter()
                .map(|wallet| wallet.balance_in_cents)
                .sum())
        })
    }

    /// Rename a wallet. The balance of `wallet` is ignored.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the wallet does not exist or belongs
    /// to someone else, [Error::MissingWalletName] if the new name is blank,
    /// or a storage error.
    pub fn update_wallet(&self, user_id: UserID, wallet: Wallet) -> Result<Wallet, Error> {
        let updated = self.store.write(|ledger| {
            let existing = target_wallet(ledger, user_id, wallet.id)?;

            let name = wallet.name.trim();
            if name.is_empty() {
                return Err(Error::MissingWalletName);
            }

            let updated = Wallet {
                name: name.to_owned(),
                ..existing
            };
            ledger.update_wallet(&updated)?;

            Ok(updated)
        })?;

        tracing::info!("user {user_id} renamed wallet {} to {}", updated.id, updated.name);

        Ok(updated)
    }

    /// Delete an empty wallet.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the wallet does not exist or belongs
    /// to someone else, [Error::NotEmpty] if it still has transactions or a
    /// non-zero balance, or a storage error.
    pub fn delete_wallet(&self, user_id: UserID, wallet_id: WalletId) -> Result<(), Error> {
        self.store.write(|ledger| {
            let wallet = target_wallet(ledger, user_id, wallet_id)?;
            DeletionCheck::for_wallet(ledger, &wallet)?.ensure()?;
            ledger.delete_wallet(wallet.id)?;

            Ok(())
        })?;

        tracing::info!("user {user_id} deleted wallet {wallet_id}");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Error, Transaction, TransactionService, TransactionType, UserID, Wallet, WalletService,
        test_utils::for_each_store,
    };

    const USER: UserID = UserID::new(1);
    const OTHER_USER: UserID = UserID::new(2);

    #[test]
    fn create_wallet_requires_name() {
        for_each_store(|store| {
            let service = WalletService::new(store);

            assert_eq!(service.create_wallet(USER, " "), Err(Error::MissingWalletName));
            assert!(service.list_wallets(USER).unwrap().is_empty());
        });
    }

    #[test]
    fn wallets_are_private() {
        for_each_store(|store| {
            let service = WalletService::new(store);
            let wallet = service.create_wallet(USER, "Mine").unwrap();

            assert_eq!(
                service.get_wallet(OTHER_USER, wallet.id),
                Err(Error::Unauthorized)
            );
            assert_eq!(
                service.update_wallet(
                    OTHER_USER,
                    Wallet {
                        name: "Stolen".to_owned(),
                        ..wallet.clone()
                    }
                ),
                Err(Error::Unauthorized)
            );
            assert_eq!(
                service.delete_wallet(OTHER_USER, wallet.id),
                Err(Error::Unauthorized)
            );
            assert_eq!(service.get_wallet(USER, wallet.id), Ok(wallet));
        });
    }

    #[test]
    fn rename_keeps_balance() {
        for_each_store(|store| {
            let service = WalletService::new(store.clone());
            let wallet = service.create_wallet(USER, "Cash").unwrap();
            TransactionService::new(store.clone())
                .create_transaction(
                    USER,
                    Transaction::build(900, TransactionType::Income, wallet.id, "Pocket money"),
                )
                .unwrap();

            let renamed = service
                .update_wallet(
                    USER,
                    Wallet {
                        name: "Piggy bank".to_owned(),
                        balance_in_cents: 0,
                        ..wallet
                    },
                )
                .unwrap();

            assert_eq!(renamed.name, "Piggy bank");
            assert_eq!(renamed.balance_in_cents, 900);
            assert_eq!(
                service.update_wallet(USER, Wallet {
                    name: String::new(),
                    ..renamed
                }),
                Err(Error::MissingWalletName)
            );
        });
    }

    #[test]
    fn total_balance_sums_wallets_of_user() {
        for_each_store(|store| {
            let service = WalletService::new(store.clone());
            let transactions = TransactionService::new(store.clone());
            assert_eq!(service.total_balance(USER), Ok(0));

            let cash = service.create_wallet(USER, "Cash").unwrap();
            let bank = service.create_wallet(USER, "Bank").unwrap();
            let theirs = service.create_wallet(OTHER_USER, "Theirs").unwrap();
            transactions
                .create_transaction(
                    USER,
                    Transaction::build(1_000, TransactionType::Income, bank.id, "Pay"),
                )
                .unwrap();
            transactions
                .create_transaction(
                    USER,
                    Transaction::build(250, TransactionType::Expense, cash.id, "Taxi"),
                )
                .unwrap();
            transactions
                .create_transaction(
                    OTHER_USER,
                    Transaction::build(5_000, TransactionType::Income, theirs.id, "Pay"),
                )
                .unwrap();

            assert_eq!(service.total_balance(USER), Ok(750));
        });
    }

    #[test]
    fn delete_wallet_guarded_by_balance_and_transactions() {
        for_each_store(|store| {
            let service = WalletService::new(store.clone());
            let transactions = TransactionService::new(store.clone());
            let wallet = service.create_wallet(USER, "Cash").unwrap();
            let created = transactions
                .create_transaction(
                    USER,
                    Transaction::build(100, TransactionType::Expense, wallet.id, "Snacks"),
                )
                .unwrap();

            assert_eq!(service.delete_wallet(USER, wallet.id), Err(Error::NotEmpty));
            assert!(!service.list_wallets(USER).unwrap()[0].can_delete);
            assert_eq!(
                service.get_wallet(USER, wallet.id).unwrap().balance_in_cents,
                -100
            );

            transactions.delete_transaction(USER, created.id).unwrap();

            assert!(service.list_wallets(USER).unwrap()[0].can_delete);
            assert_eq!(service.delete_wallet(USER, wallet.id), Ok(()));
            assert_eq!(
                service.get_wallet(USER, wallet.id),
                Err(Error::Unauthorized)
            );
        });
    }
}
