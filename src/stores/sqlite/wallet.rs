//! SQL queries for the wallet table.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{Error, UserID, Wallet, database_id::WalletId, stores::RowsAffected};

pub(super) fn create_wallet_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS wallet (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                balance_in_cents INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_wallet_user ON wallet(user_id);",
        (),
    )?;

    Ok(())
}

pub(super) fn create_wallet(
    user_id: UserID,
    name: &str,
    connection: &Connection,
) -> Result<Wallet, Error> {
    connection
        .prepare(
            "INSERT INTO wallet (user_id, name, balance_in_cents) VALUES (?1, ?2, 0)
             RETURNING id, user_id, name, balance_in_cents",
        )?
        .query_row((user_id.as_i64(), name), map_wallet_row)
        .map_err(Error::from)
}

pub(super) fn get_wallet(id: WalletId, connection: &Connection) -> Result<Option<Wallet>, Error> {
    connection
        .prepare("SELECT id, user_id, name, balance_in_cents FROM wallet WHERE id = :id")?
        .query_row(&[(":id", &id)], map_wallet_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn list_wallets(user_id: UserID, connection: &Connection) -> Result<Vec<Wallet>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, balance_in_cents FROM wallet
             WHERE user_id = ?1 ORDER BY id ASC",
        )?
        .query_map((user_id.as_i64(),), map_wallet_row)?
        .map(|wallet_result| wallet_result.map_err(Error::from))
        .collect()
}

pub(super) fn update_wallet(wallet: &Wallet, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "UPDATE wallet SET name = ?1, balance_in_cents = ?2 WHERE id = ?3",
            (&wallet.name, wallet.balance_in_cents, wallet.id),
        )
        .map_err(Error::from)
}

pub(super) fn delete_wallet(id: WalletId, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute("DELETE FROM wallet WHERE id = ?1", (id,))
        .map_err(Error::from)
}

fn map_wallet_row(row: &Row) -> Result<Wallet, rusqlite::Error> {
    Ok(Wallet {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        balance_in_cents: row.get(3)?,
    })
}
