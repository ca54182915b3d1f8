//! SQL queries for the transaction template table.

use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension, Row, types::Type};

use crate::{
    Error, TransactionTemplate, UserID, database_id::TemplateId, stores::RowsAffected,
    template::TemplateBuilder,
};

const TEMPLATE_COLUMNS: &str =
    "id, user_id, day, budget_id, wallet_id, description, amount_in_cents, type, tags";

pub(super) fn create_template_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_template (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                day INTEGER NOT NULL CHECK (day BETWEEN 1 AND 31),
                budget_id INTEGER,
                wallet_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount_in_cents INTEGER NOT NULL CHECK (amount_in_cents > 0),
                type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
                tags TEXT NOT NULL DEFAULT '[]'
                )",
        (),
    )?;

    Ok(())
}

pub(super) fn create_template(
    user_id: UserID,
    builder: TemplateBuilder,
    connection: &Connection,
) -> Result<TransactionTemplate, Error> {
    let tags = serde_json::to_string(&builder.tags)?;

    connection
        .prepare(&format!(
            "INSERT INTO transaction_template
                (user_id, day, budget_id, wallet_id, description, amount_in_cents, type, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING {TEMPLATE_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                builder.day,
                builder.budget_id,
                builder.wallet_id,
                &builder.description,
                builder.amount_in_cents,
                builder.transaction_type,
                tags,
            ),
            map_template_row,
        )
        .map_err(Error::from)
}

pub(super) fn get_template(
    id: TemplateId,
    connection: &Connection,
) -> Result<Option<TransactionTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM transaction_template WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_template_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn list_templates(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<TransactionTemplate>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM transaction_template
             WHERE user_id = ?1 ORDER BY id ASC"
        ))?
        .query_map((user_id.as_i64(),), map_template_row)?
        .map(|template_result| template_result.map_err(Error::from))
        .collect()
}

pub(super) fn update_template(
    template: &TransactionTemplate,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    let tags = serde_json::to_string(&template.tags)?;

    connection
        .execute(
            "UPDATE transaction_template
             SET day = ?1, budget_id = ?2, wallet_id = ?3, description = ?4,
                 amount_in_cents = ?5, type = ?6, tags = ?7
             WHERE id = ?8",
            (
                template.day,
                template.budget_id,
                template.wallet_id,
                &template.description,
                template.amount_in_cents,
                template.transaction_type,
                tags,
                template.id,
            ),
        )
        .map_err(Error::from)
}

pub(super) fn delete_template(
    id: TemplateId,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    connection
        .execute("DELETE FROM transaction_template WHERE id = ?1", (id,))
        .map_err(Error::from)
}

fn map_template_row(row: &Row) -> Result<TransactionTemplate, rusqlite::Error> {
    let tags: String = row.get(8)?;
    let tags: BTreeSet<String> = serde_json::from_str(&tags).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(error))
    })?;

    Ok(TransactionTemplate {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        day: row.get(2)?,
        budget_id: row.get(3)?,
        wallet_id: row.get(4)?,
        description: row.get(5)?,
        amount_in_cents: row.get(6)?,
        transaction_type: row.get(7)?,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{TransactionTemplate, TransactionType, UserID, stores::sqlite::initialize};

    use super::{create_template, delete_template, get_template, list_templates, update_template};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_get_update_delete() {
        let conn = get_test_connection();
        let builder = TransactionTemplate::build(31, 1, "Rent", 120_000, TransactionType::Expense)
            .budget_id(Some(2))
            .tags(["home"]);

        let mut template = create_template(UserID::new(1), builder, &conn).unwrap();
        assert_eq!(get_template(template.id, &conn).unwrap(), Some(template.clone()));

        template.day = 1;
        update_template(&template, &conn).unwrap();
        assert_eq!(
            list_templates(UserID::new(1), &conn).unwrap(),
            vec![template.clone()]
        );

        delete_template(template.id, &conn).unwrap();
        assert_eq!(get_template(template.id, &conn).unwrap(), None);
    }

    #[test]
    fn day_outside_month_is_rejected_by_schema() {
        let conn = get_test_connection();
        let builder = TransactionTemplate::build(32, 1, "Rent", 1, TransactionType::Expense);

        assert!(create_template(UserID::new(1), builder, &conn).is_err());
    }
}
