//! Users of the ledger and the service for registering and authenticating them.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash, ValidatedPassword, stores::LedgerStore};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's monthly salary in cents.
    pub salary_cents: i64,
}

/// Registers users and checks their credentials.
#[derive(Debug, Clone)]
pub struct UserService<S: LedgerStore> {
    store: S,
    hash_cost: u32,
}

impl<S: LedgerStore> UserService<S> {
    /// Create a service that hashes passwords with [PasswordHash::DEFAULT_COST].
    pub fn new(store: S) -> Self {
        Self::with_cost(store, PasswordHash::DEFAULT_COST)
    }

    /// Create a service that hashes passwords with `hash_cost` rounds of bcrypt.
    pub fn with_cost(store: S, hash_cost: u32) -> Self {
        Self { store, hash_cost }
    }

    /// Register a new user with a salary of zero.
    ///
    /// # Errors
    ///
    /// Returns a:
    /// - [Error::MissingUsername] if `username` is blank,
    /// - [Error::TooWeak] if the password is too easy to guess,
    /// - [Error::DuplicateUsername] if the username is taken,
    /// - or a storage error.
    pub fn register(&self, username: &str, raw_password: &str) -> Result<User, Error> {
        let username = username.trim();

        if username.is_empty() {
            return Err(Error::MissingUsername);
        }

        let password_hash =
            PasswordHash::new(ValidatedPassword::new(raw_password)?, self.hash_cost)?;

        let user = self.store.write(|ledger| {
            if ledger.get_user_by_username(username)?.is_some() {
                return Err(Error::DuplicateUsername(username.to_owned()));
            }

            ledger.insert_user(username, &password_hash)
        })?;

        tracing::info!("registered user {} ({})", user.id, user.username);

        Ok(user)
    }

    /// Look up the user with `username` and check `raw_password` against
    /// their password hash.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidCredentials] if there is no such user or the
    /// password is wrong.
    pub fn authenticate(&self, username: &str, raw_password: &str) -> Result<User, Error> {
        let user = self
            .store
            .read(|ledger| ledger.get_user_by_username(username.trim()))?
            .ok_or(Error::InvalidCredentials)?;

        if user.password_hash.verify(raw_password)? {
            Ok(user)
        } else {
            tracing::debug!("rejected log in attempt for user {}", user.id);
            Err(Error::InvalidCredentials)
        }
    }

    /// Get the user with `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [Error::UserNotFound] if there is no such user.
    pub fn get_user(&self, user_id: UserID) -> Result<User, Error> {
        self.store
            .read(|ledger| ledger.get_user(user_id))?
            .ok_or(Error::UserNotFound)
    }

    /// Set the monthly salary of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a [Error::InvalidAmount] if `salary_cents` is negative or
    /// [Error::UserNotFound] if there is no such user.
    pub fn update_salary(&self, user_id: UserID, salary_cents: i64) -> Result<User, Error> {
        if salary_cents < 0 {
            return Err(Error::InvalidAmount);
        }

        self.store.write(|ledger| {
            let mut user = ledger.get_user(user_id)?.ok_or(Error::UserNotFound)?;
            user.salary_cents = salary_cents;
            ledger.update_user(&user)?;

            Ok(user)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, UserID, UserService, test_utils::for_each_store};

    const PASSWORD: &str = "averysafeandsecurepassword";

    #[test]
    fn register_then_authenticate() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);

            let registered = service.register("alice", PASSWORD).unwrap();
            let authenticated = service.authenticate("alice", PASSWORD).unwrap();

            assert_eq!(registered, authenticated);
            assert_eq!(registered.salary_cents, 0);
        });
    }

    #[test]
    fn register_fails_on_blank_username() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);

            assert_eq!(service.register("  ", PASSWORD), Err(Error::MissingUsername));
        });
    }

    #[test]
    fn register_fails_on_weak_password() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);

            assert!(matches!(
                service.register("alice", "hunter2"),
                Err(Error::TooWeak(_))
            ));
        });
    }

    #[test]
    fn register_fails_on_duplicate_username() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);
            service.register("alice", PASSWORD).unwrap();

            let result = service.register("alice", "anotherverysecurepassword");

            assert_eq!(result, Err(Error::DuplicateUsername("alice".to_owned())));
        });
    }

    #[test]
    fn authenticate_does_not_reveal_which_part_was_wrong() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);
            service.register("alice", PASSWORD).unwrap();

            assert_eq!(
                service.authenticate("alice", "wrongpassword"),
                Err(Error::InvalidCredentials)
            );
            assert_eq!(
                service.authenticate("bob", PASSWORD),
                Err(Error::InvalidCredentials)
            );
        });
    }

    #[test]
    fn update_salary() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);
            let user = service.register("alice", PASSWORD).unwrap();

            service.update_salary(user.id, 420_000).unwrap();

            assert_eq!(service.get_user(user.id).unwrap().salary_cents, 420_000);
        });
    }

    #[test]
    fn update_salary_rejects_negative_amount() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);
            let user = service.register("alice", PASSWORD).unwrap();

            assert_eq!(service.update_salary(user.id, -1), Err(Error::InvalidAmount));
        });
    }

    #[test]
    fn get_user_fails_on_unknown_id() {
        for_each_store(|store| {
            let service = UserService::with_cost(store, 4);

            assert_eq!(service.get_user(UserID::new(42)), Err(Error::UserNotFound));
        });
    }
}
