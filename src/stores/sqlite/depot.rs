//! SQL queries for the depot and stock tables.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Depot, Error, NewStock, Stock, UserID,
    database_id::{DepotId, StockId, WalletId},
    stores::RowsAffected,
};

pub(super) fn create_depot_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS depot (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                wallet_id INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

pub(super) fn create_stock_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS stock (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                depot_id INTEGER NOT NULL,
                wkn TEXT NOT NULL,
                quantity REAL NOT NULL CHECK (quantity > 0),
                price_in_cents INTEGER NOT NULL CHECK (price_in_cents > 0),
                date_of_purchase TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_stock_depot ON stock(depot_id);",
        (),
    )?;

    Ok(())
}

// ============================================================================
// DEPOTS
// ============================================================================

pub(super) fn create_depot(
    user_id: UserID,
    name: &str,
    wallet_id: WalletId,
    connection: &Connection,
) -> Result<Depot, Error> {
    connection
        .prepare(
            "INSERT INTO depot (user_id, name, wallet_id) VALUES (?1, ?2, ?3)
             RETURNING id, user_id, name, wallet_id",
        )?
        .query_row((user_id.as_i64(), name, wallet_id), map_depot_row)
        .map_err(Error::from)
}

pub(super) fn get_depot(id: DepotId, connection: &Connection) -> Result<Option<Depot>, Error> {
    connection
        .prepare("SELECT id, user_id, name, wallet_id FROM depot WHERE id = :id")?
        .query_row(&[(":id", &id)], map_depot_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn list_depots(user_id: UserID, connection: &Connection) -> Result<Vec<Depot>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, wallet_id FROM depot WHERE user_id = ?1 ORDER BY id ASC",
        )?
        .query_map((user_id.as_i64(),), map_depot_row)?
        .map(|depot_result| depot_result.map_err(Error::from))
        .collect()
}

pub(super) fn update_depot(depot: &Depot, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "UPDATE depot SET name = ?1, wallet_id = ?2 WHERE id = ?3",
            (&depot.name, depot.wallet_id, depot.id),
        )
        .map_err(Error::from)
}

pub(super) fn delete_depot(id: DepotId, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute("DELETE FROM depot WHERE id = ?1", (id,))
        .map_err(Error::from)
}

fn map_depot_row(row: &Row) -> Result<Depot, rusqlite::Error> {
    Ok(Depot {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        wallet_id: row.get(3)?,
    })
}

// ============================================================================
// STOCKS
// ============================================================================

pub(super) fn create_stock(
    user_id: UserID,
    stock: NewStock,
    connection: &Connection,
) -> Result<Stock, Error> {
    connection
        .prepare(
            "INSERT INTO stock (user_id, depot_id, wkn, quantity, price_in_cents, date_of_purchase)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, user_id, depot_id, wkn, quantity, price_in_cents, date_of_purchase",
        )?
        .query_row(
            (
                user_id.as_i64(),
                stock.depot_id,
                &stock.wkn,
                stock.quantity,
                stock.price_in_cents,
                stock.date_of_purchase,
            ),
            map_stock_row,
        )
        .map_err(Error::from)
}

pub(super) fn get_stock(id: StockId, connection: &Connection) -> Result<Option<Stock>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, depot_id, wkn, quantity, price_in_cents, date_of_purchase
             FROM stock WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_stock_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn list_stocks(user_id: UserID, connection: &Connection) -> Result<Vec<Stock>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, depot_id, wkn, quantity, price_in_cents, date_of_purchase
             FROM stock WHERE user_id = ?1 ORDER BY id ASC",
        )?
        .query_map((user_id.as_i64(),), map_stock_row)?
        .map(|stock_result| stock_result.map_err(Error::from))
        .collect()
}

pub(super) fn count_stocks_for_depot(
    depot_id: DepotId,
    connection: &Connection,
) -> Result<u64, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM stock WHERE depot_id = ?1",
            (depot_id,),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

pub(super) fn update_stock(stock: &Stock, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "UPDATE stock
             SET depot_id = ?1, wkn = ?2, quantity = ?3, price_in_cents = ?4,
                 date_of_purchase = ?5
             WHERE id = ?6",
            (
                stock.depot_id,
                &stock.wkn,
                stock.quantity,
                stock.price_in_cents,
                stock.date_of_purchase,
                stock.id,
            ),
        )
        .map_err(Error::from)
}

pub(super) fn delete_stock(id: StockId, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute("DELETE FROM stock WHERE id = ?1", (id,))
        .map_err(Error::from)
}

fn map_stock_row(row: &Row) -> Result<Stock, rusqlite::Error> {
    Ok(Stock {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        depot_id: row.get(2)?,
        wkn: row.get(3)?,
        quantity: row.get(4)?,
        price_in_cents: row.get(5)?,
        date_of_purchase: row.get(6)?,
    })
}
