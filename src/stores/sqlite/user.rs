//! SQL queries for the user table.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{Error, PasswordHash, User, UserID, stores::RowsAffected};

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(super) fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                salary_cents INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::DuplicateUsername] if the username is taken or
/// [Error::SqlError] if another SQL related error occurred.
pub(super) fn create_user(
    username: &str,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (username, password, salary_cents) VALUES (?1, ?2, 0)
             RETURNING id, username, password, salary_cents",
        )?
        .query_row((username, password_hash.as_ref()), map_user_row)
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Error::DuplicateUsername(username.to_owned())
            }
            error => error.into(),
        })
}

pub(super) fn get_user(id: UserID, connection: &Connection) -> Result<Option<User>, Error> {
    connection
        .prepare("SELECT id, username, password, salary_cents FROM user WHERE id = :id")?
        .query_row(&[(":id", &id.as_i64())], map_user_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn get_user_by_username(
    username: &str,
    connection: &Connection,
) -> Result<Option<User>, Error> {
    connection
        .prepare(
            "SELECT id, username, password, salary_cents FROM user WHERE username = :username",
        )?
        .query_row(&[(":username", &username)], map_user_row)
        .optional()
        .map_err(Error::from)
}

pub(super) fn update_user(user: &User, connection: &Connection) -> Result<RowsAffected, Error> {
    connection
        .execute(
            "UPDATE user SET username = ?1, password = ?2, salary_cents = ?3 WHERE id = ?4",
            (
                &user.username,
                user.password_hash.as_ref(),
                user.salary_cents,
                user.id.as_i64(),
            ),
        )
        .map_err(Error::from)
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(2)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        username: row.get(1)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        salary_cents: row.get(3)?,
    })
}
