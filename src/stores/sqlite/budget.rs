//! SQL queries for the budget table.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Budget, Error, UserID,
    database_id::BudgetId,
    stores::RowsAffected,
};

pub(super) fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                limit_in_cents INTEGER NOT NULL,
                balance_in_cents INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_budget_user ON budget(user_id);",
        (),
    )?;

    Ok(())
}

pub(super) fn create_budget(
    user_id: UserID,
    name: &str,
    limit_in_cents: i64,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(
            "INSERT INTO budget (user_id, name, limit_in_cents, balance_in_cents)
             VALUES (?1, ?2, ?3, 0)
             RETURNING id, user_id, name, limit_in_cents, balance_in_cents",
        )?
        .query_row((user_id.as_i64(), name, limit_in_cents), map_budget_row)
        .map_err(Error::from)
}

pub(super) fn get_budget(id: BudgetId, connection: &Connection) -> Result<Option<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, limit_in_cents, balance_in_cents FROM budget WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_budget_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn list_budgets(user_id: UserID, connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, name, limit_in_cents, balance_in_cents FROM budget
             WHERE user_id = ?1 ORDER BY id ASC",
        )?
        .query_map((user_id.as_i64(),), map_budget_row)?
        .map(|budget_result| budget_result.map_err(Error::from))
        .collect()
}

pub(super) fn update_budget(budget: &Budget, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "UPDATE budget SET name = ?1, limit_in_cents = ?2, balance_in_cents = ?3 WHERE id = ?4",
            (
                &budget.name,
                budget.limit_in_cents,
                budget.balance_in_cents,
                budget.id,
            ),
        )
        .map_err(Error::from)
}

pub(super) fn delete_budget(id: BudgetId, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute("DELETE FROM budget WHERE id = ?1", (id,))
        .map_err(Error::from)
}

fn map_budget_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        name: row.get(2)?,
        limit_in_cents: row.get(3)?,
        balance_in_cents: row.get(4)?,
    })
}
