//! Depots (securities accounts) and the stock positions held in them.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, UserID,
    database_id::{DepotId, StockId, WalletId},
    deletion_guard::{DeletionCheck, DeletionHint},
    stores::{LedgerRead, LedgerStore},
    wallet::owned_wallet,
};

// ============================================================================
// MODELS
// ============================================================================

/// A securities account, paid for from a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depot {
    /// The ID of the depot.
    pub id: DepotId,
    /// The user that owns the depot.
    pub user_id: UserID,
    /// The display name, never blank.
    pub name: String,
    /// The wallet purchases are paid from.
    pub wallet_id: WalletId,
}

/// A position of a single security bought on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    /// The ID of the position.
    pub id: StockId,
    /// The user that owns the position.
    pub user_id: UserID,
    /// The depot the position is held in.
    pub depot_id: DepotId,
    /// The German securities identification number (Wertpapierkennnummer).
    pub wkn: String,
    /// How many shares were bought, fractional shares allowed.
    pub quantity: f64,
    /// The price per share in cents.
    pub price_in_cents: i64,
    /// The day the shares were bought.
    pub date_of_purchase: Date,
}

/// The fields of a [Stock] that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStock {
    /// The depot the position is held in.
    pub depot_id: DepotId,
    /// The German securities identification number (Wertpapierkennnummer).
    pub wkn: String,
    /// How many shares were bought. Must be greater than zero.
    pub quantity: f64,
    /// The price per share in cents. Must be greater than zero.
    pub price_in_cents: i64,
    /// The day the shares were bought.
    pub date_of_purchase: Date,
}

impl NewStock {
    pub(crate) fn finalize(self, id: StockId, user_id: UserID) -> Stock {
        Stock {
            id,
            user_id,
            depot_id: self.depot_id,
            wkn: self.wkn,
            quantity: self.quantity,
            price_in_cents: self.price_in_cents,
            date_of_purchase: self.date_of_purchase,
        }
    }
}

fn owned_depot<L>(ledger: &L, user_id: UserID, depot_id: DepotId) -> Result<Depot, Error>
where
    L: LedgerRead + ?Sized,
{
    match ledger.get_depot(depot_id)? {
        Some(depot) if depot.user_id == user_id => Ok(depot),
        _ => Err(Error::DepotNotFound),
    }
}

fn target_depot<L>(ledger: &L, user_id: UserID, depot_id: DepotId) -> Result<Depot, Error>
where
    L: LedgerRead + ?Sized,
{
    owned_depot(ledger, user_id, depot_id).map_err(|_| {
        tracing::debug!("user {user_id} may not access depot {depot_id}");
        Error::Unauthorized
    })
}

fn target_stock<L>(ledger: &L, user_id: UserID, stock_id: StockId) -> Result<Stock, Error>
where
    L: LedgerRead + ?Sized,
{
    match ledger.get_stock(stock_id)? {
        Some(stock) if stock.user_id == user_id => Ok(stock),
        _ => {
            tracing::debug!("user {user_id} may not access stock {stock_id}");
            Err(Error::Unauthorized)
        }
    }
}

fn validate_depot<L>(ledger: &L, user_id: UserID, name: &str, wallet_id: WalletId) -> Result<(), Error>
where
    L: LedgerRead + ?Sized,
{
    if name.trim().is_empty() {
        return Err(Error::MissingDepotName);
    }

    owned_wallet(ledger, user_id, wallet_id)?;

    Ok(())
}

fn validate_stock<L>(ledger: &L, user_id: UserID, stock: &NewStock) -> Result<(), Error>
where
    L: LedgerRead + ?Sized,
{
    if stock.wkn.trim().is_empty() {
        return Err(Error::MissingWkn);
    }

    // Also rejects NaN.
    if !(stock.quantity > 0.0) || stock.price_in_cents <= 0 {
        return Err(Error::InvalidAmount);
    }

    owned_depot(ledger, user_id, stock.depot_id)?;

    Ok(())
}

// ============================================================================
// SERVICES
// ============================================================================

/// Creates, renames and deletes the depots of a user.
#[derive(Debug, Clone)]
pub struct DepotService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> DepotService<S> {
    /// Create a new depot service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a depot paid from `wallet_id`.
    ///
    /// # Errors
    /// Returns [Error::MissingDepotName] if `name` is blank,
    /// [Error::WalletNotFound] if the wallet is not owned by `user_id`, or a
    /// storage error.
    pub fn create_depot(
        &self,
        user_id: UserID,
        name: &str,
        wallet_id: WalletId,
    ) -> Result<Depot, Error> {
        let depot = self.store.write(|ledger| {
            validate_depot(ledger, user_id, name, wallet_id)?;
            ledger.insert_depot(user_id, name.trim(), wallet_id)
        })?;

        tracing::info!("user {user_id} created depot {} ({})", depot.id, depot.name);

        Ok(depot)
    }

    /// Get a depot of `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the depot does not exist or belongs
    /// to someone else.
    pub fn get_depot(&self, user_id: UserID, depot_id: DepotId) -> Result<Depot, Error> {
        self.store
            .read(|ledger| target_depot(ledger, user_id, depot_id))
    }

    /// List the depots of `user_id` by ID, each with whether it is empty.
    pub fn list_depots(&self, user_id: UserID) -> Result<Vec<DeletionHint<Depot>>, Error> {
        self.store.read(|ledger| {
            let mut hints = Vec::new();

            for depot in ledger.list_depots(user_id)? {
                let can_delete = DeletionCheck::for_depot(ledger, &depot)?.can_delete();
                hints.push(DeletionHint {
                    entity: depot,
                    can_delete,
                });
            }

            Ok(hints)
        })
    }

    /// Change the name and wallet of a depot.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the depot does not exist or belongs
    /// to someone else, or an error as for [DepotService::create_depot].
    pub fn update_depot(&self, user_id: UserID, depot: Depot) -> Result<Depot, Error> {
        let updated = self.store.write(|ledger| {
            let existing = target_depot(ledger, user_id, depot.id)?;
            validate_depot(ledger, user_id, &depot.name, depot.wallet_id)?;

            let updated = Depot {
                name: depot.name.trim().to_owned(),
                wallet_id: depot.wallet_id,
                ..existing
            };
            ledger.update_depot(&updated)?;

            Ok(updated)
        })?;

        tracing::info!("user {user_id} updated depot {}", updated.id);

        Ok(updated)
    }

    /// Delete a depot that holds no stocks.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the depot does not exist or belongs
    /// to someone else, [Error::NotEmpty] if it still holds stocks, or a
    /// storage error.
    pub fn delete_depot(&self, user_id: UserID, depot_id: DepotId) -> Result<(), Error> {
        self.store.write(|ledger| {
            let depot = target_depot(ledger, user_id, depot_id)?;
            DeletionCheck::for_depot(ledger, &depot)?.ensure()?;
            ledger.delete_depot(depot.id)?;

            Ok(())
        })?;

        tracing::info!("user {user_id} deleted depot {depot_id}");

        Ok(())
    }
}

/// Records, edits and removes the stock positions of a user.
#[derive(Debug, Clone)]
pub struct StockService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> StockService<S> {
    /// Create a new stock service backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a new stock position.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::MissingWkn] if the WKN is blank,
    /// - [Error::InvalidAmount] if the quantity or price is not positive,
    /// - [Error::DepotNotFound] if the depot is not owned by `user_id`,
    /// - or a storage error.
    pub fn create_stock(&self, user_id: UserID, stock: NewStock) -> Result<Stock, Error> {
        let stock = self.store.write(|ledger| {
            validate_stock(ledger, user_id, &stock)?;
            ledger.insert_stock(
                user_id,
                NewStock {
                    wkn: stock.wkn.trim().to_owned(),
                    ..stock
                },
            )
        })?;

        tracing::info!(
            "user {user_id} added stock {} ({}) to depot {}",
            stock.id,
            stock.wkn,
            stock.depot_id
        );

        Ok(stock)
    }

    /// Get a stock position of `user_id`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the position does not exist or
    /// belongs to someone else.
    pub fn get_stock(&self, user_id: UserID, stock_id: StockId) -> Result<Stock, Error> {
        self.store
            .read(|ledger| target_stock(ledger, user_id, stock_id))
    }

    /// List the stock positions of `user_id` by ID.
    pub fn list_stocks(&self, user_id: UserID) -> Result<Vec<Stock>, Error> {
        self.store.read(|ledger| ledger.list_stocks(user_id))
    }

    /// Replace the position with the same ID as `stock`.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the position does not exist or
    /// belongs to someone else, or an error as for [StockService::create_stock].
    pub fn update_stock(&self, user_id: UserID, stock: Stock) -> Result<Stock, Error> {
        let updated = self.store.write(|ledger| {
            let existing = target_stock(ledger, user_id, stock.id)?;

            let new_stock = NewStock {
                depot_id: stock.depot_id,
                wkn: stock.wkn.trim().to_owned(),
                quantity: stock.quantity,
                price_in_cents: stock.price_in_cents,
                date_of_purchase: stock.date_of_purchase,
            };
            validate_stock(ledger, user_id, &new_stock)?;

            let updated = new_stock.finalize(existing.id, user_id);
            ledger.update_stock(&updated)?;

            Ok(updated)
        })?;

        tracing::info!("user {user_id} updated stock {}", updated.id);

        Ok(updated)
    }

    /// Remove a stock position.
    ///
    /// # Errors
    /// Returns [Error::Unauthorized] if the position does not exist or
    /// belongs to someone else, or a storage error.
    pub fn delete_stock(&self, user_id: UserID, stock_id: StockId) -> Result<(), Error> {
        self.store.write(|ledger| {
            let stock = target_stock(ledger, user_id, stock_id)?;
            ledger.delete_stock(stock.id)?;

            Ok(())
        })?;

        tracing::info!("user {user_id} deleted stock {stock_id}");

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Depot, DepotService, Error, NewStock, Stock, StockService, UserID, WalletService,
        test_utils::for_each_store,
    };

    const USER: UserID = UserID::new(1);
    const OTHER_USER: UserID = UserID::new(2);

    fn new_stock(depot_id: i64) -> NewStock {
        NewStock {
            depot_id,
            wkn: "A1JX52".to_owned(),
            quantity: 1.5,
            price_in_cents: 10_125,
            date_of_purchase: date!(2025 - 01 - 31),
        }
    }

    #[test]
    fn create_depot_requires_name_and_owned_wallet() {
        for_each_store(|store| {
            let wallets = WalletService::new(store.clone());
            let mine = wallets.create_wallet(USER, "Bank").unwrap();
            let theirs = wallets.create_wallet(OTHER_USER, "Theirs").unwrap();
            let service = DepotService::new(store);

            assert_eq!(
                service.create_depot(USER, "", mine.id),
                Err(Error::MissingDepotName)
            );
            assert_eq!(
                service.create_depot(USER, "Broker", theirs.id),
                Err(Error::WalletNotFound)
            );

            let depot = service.create_depot(USER, "Broker", mine.id).unwrap();
            assert_eq!(depot.wallet_id, mine.id);
            assert_eq!(service.get_depot(USER, depot.id), Ok(depot));
        });
    }

    #[test]
    fn depots_are_private() {
        for_each_store(|store| {
            let wallet = WalletService::new(store.clone())
                .create_wallet(USER, "Bank")
                .unwrap();
            let service = DepotService::new(store);
            let depot = service.create_depot(USER, "Broker", wallet.id).unwrap();

            assert_eq!(service.get_depot(OTHER_USER, depot.id), Err(Error::Unauthorized));
            assert_eq!(
                service.update_depot(
                    OTHER_USER,
                    Depot {
                        name: "Mine now".to_owned(),
                        ..depot.clone()
                    }
                ),
                Err(Error::Unauthorized)
            );
            assert_eq!(
                service.delete_depot(OTHER_USER, depot.id),
                Err(Error::Unauthorized)
            );
            assert!(service.list_depots(OTHER_USER).unwrap().is_empty());
        });
    }

    #[test]
    fn depot_with_stocks_cannot_be_deleted() {
        for_each_store(|store| {
            let wallet = WalletService::new(store.clone())
                .create_wallet(USER, "Bank")
                .unwrap();
            let depots = DepotService::new(store.clone());
            let stocks = StockService::new(store);
            let depot = depots.create_depot(USER, "Broker", wallet.id).unwrap();
            let stock = stocks.create_stock(USER, new_stock(depot.id)).unwrap();

            assert_eq!(depots.delete_depot(USER, depot.id), Err(Error::NotEmpty));
            assert!(!depots.list_depots(USER).unwrap()[0].can_delete);

            stocks.delete_stock(USER, stock.id).unwrap();

            assert!(depots.list_depots(USER).unwrap()[0].can_delete);
            assert_eq!(depots.delete_depot(USER, depot.id), Ok(()));
        });
    }

    #[test]
    fn create_stock_validates_input() {
        for_each_store(|store| {
            let wallets = WalletService::new(store.clone());
            let wallet = wallets.create_wallet(USER, "Bank").unwrap();
            let their_wallet = wallets.create_wallet(OTHER_USER, "Theirs").unwrap();
            let depots = DepotService::new(store.clone());
            let depot = depots.create_depot(USER, "Broker", wallet.id).unwrap();
            let their_depot = depots
                .create_depot(OTHER_USER, "Theirs", their_wallet.id)
                .unwrap();
            let service = StockService::new(store);

            let cases = [
                (
                    NewStock {
                        wkn: "  ".to_owned(),
                        ..new_stock(depot.id)
                    },
                    Error::MissingWkn,
                ),
                (
                    NewStock {
                        quantity: 0.0,
                        ..new_stock(depot.id)
                    },
                    Error::InvalidAmount,
                ),
                (
                    NewStock {
                        quantity: f64::NAN,
                        ..new_stock(depot.id)
                    },
                    Error::InvalidAmount,
                ),
                (
                    NewStock {
                        price_in_cents: -1,
                        ..new_stock(depot.id)
                    },
                    Error::InvalidAmount,
                ),
                (new_stock(their_depot.id), Error::DepotNotFound),
                (new_stock(404), Error::DepotNotFound),
            ];

            for (stock, want) in cases {
                assert_eq!(service.create_stock(USER, stock), Err(want));
            }
            assert!(service.list_stocks(USER).unwrap().is_empty());
        });
    }

    #[test]
    fn update_stock_keeps_owner_and_id() {
        for_each_store(|store| {
            let wallet = WalletService::new(store.clone())
                .create_wallet(USER, "Bank")
                .unwrap();
            let depot = DepotService::new(store.clone())
                .create_depot(USER, "Broker", wallet.id)
                .unwrap();
            let service = StockService::new(store);
            let stock = service.create_stock(USER, new_stock(depot.id)).unwrap();

            let updated = service
                .update_stock(
                    USER,
                    Stock {
                        quantity: 4.0,
                        user_id: OTHER_USER,
                        ..stock.clone()
                    },
                )
                .unwrap();

            assert_eq!(updated.id, stock.id);
            assert_eq!(updated.user_id, USER);
            assert_eq!(updated.quantity, 4.0);
            assert_eq!(service.list_stocks(USER), Ok(vec![updated]));
            assert_eq!(
                service.get_stock(OTHER_USER, stock.id),
                Err(Error::Unauthorized)
            );
            assert_eq!(
                service.delete_stock(OTHER_USER, stock.id),
                Err(Error::Unauthorized)
            );
        });
    }
}
