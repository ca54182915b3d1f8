//! SQL queries for the transaction table.

use std::collections::BTreeSet;

use rusqlite::{
    Connection, OptionalExtension, Row, ToSql, functions::FunctionFlags, params_from_iter,
    types::Type,
};

use crate::{
    Error, Transaction, TransactionBuilder, UserID,
    database_id::{BudgetId, TransactionId, WalletId},
    stores::{RowsAffected, sqlite::StoredDateTime},
    transaction::{TransactionFilter, TransactionRow, Window},
};

const TRANSACTION_COLUMNS: &str = "id, user_id, date, budget_id, wallet_id, description, \
    amount_in_cents, type, is_pending, is_debt, tags";

/// [TRANSACTION_COLUMNS] of `t` followed by the wallet and budget names.
const TRANSACTION_ROW_COLUMNS: &str = "t.id, t.user_id, t.date, t.budget_id, t.wallet_id, \
    t.description, t.amount_in_cents, t.type, t.is_pending, t.is_debt, t.tags, \
    COALESCE(w.name, ''), b.name";

/// The name of the SQL function that lowercases text with Unicode rules.
///
/// The built-in `lower` and `LIKE` only fold ASCII letters.
const UNICODE_LOWER: &str = "unicode_lower";

/// Register the SQL functions the transaction queries rely on.
///
/// Functions live on the connection, not in the database file, so this must
/// run for every new connection.
pub(super) fn register_functions(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            let text: String = context.get(0)?;
            Ok(text.to_lowercase())
        },
    )
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(super) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                budget_id INTEGER,
                wallet_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount_in_cents INTEGER NOT NULL CHECK (amount_in_cents > 0),
                type TEXT NOT NULL CHECK (type IN ('INCOME', 'EXPENSE')),
                is_pending INTEGER NOT NULL DEFAULT 0,
                is_debt INTEGER,
                tags TEXT NOT NULL DEFAULT '[]'
                )",
        (),
    )?;

    // Listing order and the per-user scope of every query.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date
            ON \"transaction\"(user_id, date, id);",
        (),
    )?;

    // Used by the deletion guard and reconciliation.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_budget ON \"transaction\"(budget_id);",
        (),
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_wallet ON \"transaction\"(wallet_id);",
        (),
    )?;

    Ok(())
}

/// Insert a new transaction owned by `user_id`.
pub(super) fn create_transaction(
    user_id: UserID,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let tags = serde_json::to_string(&builder.tags)?;

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO \"transaction\"
                (user_id, date, budget_id, wallet_id, description, amount_in_cents, type,
                 is_pending, is_debt, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                StoredDateTime(builder.date),
                builder.budget_id,
                builder.wallet_id,
                &builder.description,
                builder.amount_in_cents,
                builder.transaction_type,
                builder.is_pending,
                builder.is_debt,
                tags,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Overwrite every column of the transaction with the same ID.
pub(super) fn update_transaction(
    transaction: &Transaction,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    let tags = serde_json::to_string(&transaction.tags)?;

    connection
        .execute(
            "UPDATE \"transaction\"
             SET user_id = ?1, date = ?2, budget_id = ?3, wallet_id = ?4, description = ?5,
                 amount_in_cents = ?6, type = ?7, is_pending = ?8, is_debt = ?9, tags = ?10
             WHERE id = ?11",
            (
                transaction.user_id.as_i64(),
                StoredDateTime(transaction.date),
                transaction.budget_id,
                transaction.wallet_id,
                &transaction.description,
                transaction.amount_in_cents,
                transaction.transaction_type,
                transaction.is_pending,
                transaction.is_debt,
                tags,
                transaction.id,
            ),
        )
        .map_err(Error::from)
}

pub(super) fn delete_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<RowsAffected, Error> {
    connection
        .execute("DELETE FROM \"transaction\" WHERE id = ?1", (id,))
        .map_err(Error::from)
}

/// Retrieve a transaction from the database by its `id`.
pub(super) fn get_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .optional()
        .map_err(Error::from)
}

/// Build the `WHERE` clause shared by searching and counting. Columns are
/// qualified with the alias `t` for the transaction table.
fn where_clause(user_id: UserID, filter: &TransactionFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses = vec!["t.user_id = ?".to_owned()];
    let mut parameters: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.as_i64())];

    if let Some(search_term) = filter.search_term() {
        clauses.push(format!("{UNICODE_LOWER}(t.description) LIKE ? ESCAPE '\\'"));
        parameters.push(Box::new(format!(
            "%{}%",
            escape_like(&search_term.to_lowercase())
        )));
    }

    if let Some(from_date) = filter.from_date {
        clauses.push("t.date >= ?".to_owned());
        parameters.push(Box::new(StoredDateTime(from_date)));
    }

    if let Some(until_date) = filter.until_date {
        clauses.push("t.date <= ?".to_owned());
        parameters.push(Box::new(StoredDateTime(until_date)));
    }

    if let Some(budget_id) = filter.budget_id {
        clauses.push("t.budget_id = ?".to_owned());
        parameters.push(Box::new(budget_id));
    }

    if let Some(wallet_id) = filter.wallet_id {
        clauses.push("t.wallet_id = ?".to_owned());
        parameters.push(Box::new(wallet_id));
    }

    if let Some(transaction_type) = filter.transaction_type {
        clauses.push("t.type = ?".to_owned());
        parameters.push(Box::new(transaction_type));
    }

    (format!("WHERE {}", clauses.join(" AND ")), parameters)
}

fn escape_like(search_term: &str) -> String {
    search_term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Query for the transactions of `user_id` matching `filter`, most recent
/// first, joined with the names of their wallet and budget.
pub(super) fn query_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    window: Window,
    connection: &Connection,
) -> Result<Vec<TransactionRow>, Error> {
    let (where_clause, parameters) = where_clause(user_id, filter);
    // SQLite needs a LIMIT before an OFFSET, -1 means no limit.
    let limit = window
        .limit
        .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
    let offset = i64::try_from(window.offset).unwrap_or(i64::MAX);

    let query = format!(
        "SELECT {TRANSACTION_ROW_COLUMNS} FROM \"transaction\" t \
         LEFT JOIN wallet w ON w.id = t.wallet_id \
         LEFT JOIN budget b ON b.id = t.budget_id \
         {where_clause} \
         ORDER BY t.date DESC, t.id DESC LIMIT {limit} OFFSET {offset}"
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(parameters.iter()), map_transaction_row_with_names)?
        .map(|transaction_result| transaction_result.map_err(Error::from))
        .collect()
}

pub(super) fn count_transactions(
    user_id: UserID,
    filter: &TransactionFilter,
    connection: &Connection,
) -> Result<u64, Error> {
    let (where_clause, parameters) = where_clause(user_id, filter);

    connection
        .query_row(
            &format!("SELECT COUNT(t.id) FROM \"transaction\" t {where_clause}"),
            params_from_iter(parameters.iter()),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// The budget or wallet transactions are linked to.
pub(super) enum Link {
    Budget(BudgetId),
    Wallet(WalletId),
}

impl Link {
    fn condition(&self) -> (&'static str, i64) {
        match self {
            Link::Budget(id) => ("budget_id = ?1", *id),
            Link::Wallet(id) => ("wallet_id = ?1", *id),
        }
    }
}

pub(super) fn count_linked(link: Link, connection: &Connection) -> Result<u64, Error> {
    let (condition, id) = link.condition();

    connection
        .query_row(
            &format!("SELECT COUNT(id) FROM \"transaction\" WHERE {condition}"),
            (id,),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

pub(super) fn signed_total(link: Link, connection: &Connection) -> Result<i64, Error> {
    let (condition, id) = link.condition();

    connection
        .query_row(
            &format!(
                "SELECT COALESCE(SUM(CASE type WHEN 'INCOME' THEN amount_in_cents \
                 ELSE -amount_in_cents END), 0) FROM \"transaction\" WHERE {condition}"
            ),
            (id,),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Map a database row to a Transaction.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let date: StoredDateTime = row.get(2)?;
    let tags: String = row.get(10)?;
    let tags: BTreeSet<String> = serde_json::from_str(&tags).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(error))
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        date: date.0,
        budget_id: row.get(3)?,
        wallet_id: row.get(4)?,
        description: row.get(5)?,
        amount_in_cents: row.get(6)?,
        transaction_type: row.get(7)?,
        is_pending: row.get(8)?,
        is_debt: row.get(9)?,
        tags,
    })
}

/// Map a row selected with [TRANSACTION_ROW_COLUMNS] to a TransactionRow.
fn map_transaction_row_with_names(row: &Row) -> Result<TransactionRow, rusqlite::Error> {
    Ok(TransactionRow {
        transaction: map_transaction_row(row)?,
        wallet_name: row.get(11)?,
        budget_name: row.get(12)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::{Duration, macros::datetime};

    use crate::{
        Transaction, TransactionType, UserID,
        stores::sqlite::{budget::create_budget, initialize, wallet::create_wallet},
        transaction::{TransactionFilter, Window},
    };

    use super::{
        Link, count_linked, count_transactions, create_transaction, delete_transaction,
        get_transaction, query_transactions, signed_total, update_transaction,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_then_get() {
        let conn = get_test_connection();
        let builder = Transaction::build(1234, TransactionType::Expense, 3, "Coffee")
            .date(datetime!(2025-10-05 08:15:30.25 UTC))
            .budget_id(Some(7))
            .debt(Some(true))
            .tags(["food", "treat"]);

        let created = create_transaction(UserID::new(1), builder, &conn).unwrap();
        let got = get_transaction(created.id, &conn).unwrap();

        assert_eq!(Some(created.clone()), got);
        assert_eq!(created.budget_id, Some(7));
        assert_eq!(created.tags.len(), 2);
        assert_eq!(created.is_debt, Some(true));
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = get_test_connection();

        assert_eq!(get_transaction(42, &conn).unwrap(), None);
    }

    #[test]
    fn create_rejects_non_positive_amount() {
        let conn = get_test_connection();

        let result = create_transaction(
            UserID::new(1),
            Transaction::build(0, TransactionType::Income, 1, "Nothing"),
            &conn,
        );

        assert!(result.is_err());
    }

    #[test]
    fn update_and_delete() {
        let conn = get_test_connection();
        let mut transaction = create_transaction(
            UserID::new(1),
            Transaction::build(100, TransactionType::Income, 1, "Pay"),
            &conn,
        )
        .unwrap();
        transaction.amount_in_cents = 200;
        transaction.transaction_type = TransactionType::Expense;

        assert_eq!(update_transaction(&transaction, &conn).unwrap(), 1);
        assert_eq!(
            get_transaction(transaction.id, &conn).unwrap(),
            Some(transaction.clone())
        );
        assert_eq!(delete_transaction(transaction.id, &conn).unwrap(), 1);
        assert_eq!(get_transaction(transaction.id, &conn).unwrap(), None);
    }

    #[test]
    fn query_orders_by_date_then_id_descending() {
        let conn = get_test_connection();
        let user_id = UserID::new(1);
        let noon = datetime!(2025-06-15 12:00 UTC);
        let dates = [
            noon + Duration::days(1),
            noon,
            noon,
            noon - Duration::days(1),
        ];
        let ids: Vec<_> = dates
            .iter()
            .map(|date| {
                create_transaction(
                    user_id,
                    Transaction::build(100, TransactionType::Income, 1, "t").date(*date),
                    &conn,
                )
                .unwrap()
                .id
            })
            .collect();

        let got: Vec<_> =
            query_transactions(user_id, &TransactionFilter::default(), Window::default(), &conn)
                .unwrap()
                .into_iter()
                .map(|row| row.transaction.id)
                .collect();

        assert_eq!(got, vec![ids[0], ids[2], ids[1], ids[3]]);
    }

    #[test]
    fn query_is_scoped_to_user_and_windowed() {
        let conn = get_test_connection();
        for i in 1..=5 {
            create_transaction(
                UserID::new(1),
                Transaction::build(i, TransactionType::Income, 1, "mine"),
                &conn,
            )
            .unwrap();
        }
        create_transaction(
            UserID::new(2),
            Transaction::build(1, TransactionType::Income, 2, "theirs"),
            &conn,
        )
        .unwrap();

        let window = Window {
            offset: 1,
            limit: Some(2),
        };
        let page =
            query_transactions(UserID::new(1), &TransactionFilter::default(), window, &conn)
                .unwrap();
        let total = count_transactions(UserID::new(1), &TransactionFilter::default(), &conn)
            .unwrap();

        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|row| row.transaction.user_id == UserID::new(1)));
        assert_eq!(total, 5);
    }

    #[test]
    fn search_term_is_case_insensitive_and_literal() {
        let conn = get_test_connection();
        let user_id = UserID::new(1);
        for description in [
            "Groceries",
            "GROCERY run",
            "100% cotton",
            "Rent",
            "Äpfel vom Markt",
        ] {
            create_transaction(
                user_id,
                Transaction::build(1, TransactionType::Expense, 1, description),
                &conn,
            )
            .unwrap();
        }

        let grocer = TransactionFilter {
            search_term: Some("grocer".to_owned()),
            ..Default::default()
        };
        let percent = TransactionFilter {
            search_term: Some("0%".to_owned()),
            ..Default::default()
        };

        let apples = TransactionFilter {
            search_term: Some("äPFEL".to_owned()),
            ..Default::default()
        };

        assert_eq!(count_transactions(user_id, &grocer, &conn).unwrap(), 2);
        assert_eq!(count_transactions(user_id, &percent, &conn).unwrap(), 1);
        assert_eq!(count_transactions(user_id, &apples, &conn).unwrap(), 1);
        let found = query_transactions(user_id, &apples, Window::default(), &conn).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].transaction.description, "Äpfel vom Markt");
    }

    #[test]
    fn query_joins_wallet_and_budget_names() {
        let conn = get_test_connection();
        let user_id = UserID::new(1);
        let wallet = create_wallet(user_id, "Cash", &conn).unwrap();
        let budget = create_budget(user_id, "Food", 500, &conn).unwrap();
        let with_budget = create_transaction(
            user_id,
            Transaction::build(100, TransactionType::Expense, wallet.id, "Lunch")
                .date(datetime!(2025-06-15 12:00 UTC))
                .budget_id(Some(budget.id)),
            &conn,
        )
        .unwrap();
        let without_budget = create_transaction(
            user_id,
            Transaction::build(200, TransactionType::Income, wallet.id, "Refund")
                .date(datetime!(2025-06-14 12:00 UTC)),
            &conn,
        )
        .unwrap();

        let rows =
            query_transactions(user_id, &TransactionFilter::default(), Window::default(), &conn)
                .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction, with_budget);
        assert_eq!(rows[0].wallet_name, "Cash");
        assert_eq!(rows[0].budget_name.as_deref(), Some("Food"));
        assert_eq!(rows[1].transaction, without_budget);
        assert_eq!(rows[1].wallet_name, "Cash");
        assert_eq!(rows[1].budget_name, None);
    }

    #[test]
    fn filter_by_date_range_budget_wallet_and_type() {
        let conn = get_test_connection();
        let user_id = UserID::new(1);
        let day = datetime!(2025-06-15 12:00 UTC);
        create_transaction(
            user_id,
            Transaction::build(1, TransactionType::Expense, 1, "a")
                .date(day)
                .budget_id(Some(9)),
            &conn,
        )
        .unwrap();
        create_transaction(
            user_id,
            Transaction::build(1, TransactionType::Income, 2, "b").date(day + Duration::days(2)),
            &conn,
        )
        .unwrap();

        let in_range = TransactionFilter {
            from_date: Some(day),
            until_date: Some(day),
            ..Default::default()
        };
        let by_budget = TransactionFilter {
            budget_id: Some(9),
            ..Default::default()
        };
        let by_wallet_and_type = TransactionFilter {
            wallet_id: Some(2),
            transaction_type: Some(TransactionType::Income),
            ..Default::default()
        };

        assert_eq!(count_transactions(user_id, &in_range, &conn).unwrap(), 1);
        assert_eq!(count_transactions(user_id, &by_budget, &conn).unwrap(), 1);
        assert_eq!(
            count_transactions(user_id, &by_wallet_and_type, &conn).unwrap(),
            1
        );
    }

    #[test]
    fn linked_counts_and_totals() {
        let conn = get_test_connection();
        let user_id = UserID::new(1);
        create_transaction(
            user_id,
            Transaction::build(500, TransactionType::Income, 1, "in").budget_id(Some(4)),
            &conn,
        )
        .unwrap();
        create_transaction(
            user_id,
            Transaction::build(200, TransactionType::Expense, 1, "out"),
            &conn,
        )
        .unwrap();

        assert_eq!(count_linked(Link::Wallet(1), &conn).unwrap(), 2);
        assert_eq!(count_linked(Link::Budget(4), &conn).unwrap(), 1);
        assert_eq!(signed_total(Link::Wallet(1), &conn).unwrap(), 300);
        assert_eq!(signed_total(Link::Budget(4), &conn).unwrap(), 500);
        assert_eq!(signed_total(Link::Wallet(2), &conn).unwrap(), 0);
    }
}
