//! Maps a verified provider identity (email) to a persistent application
//! user, creating the record on first login.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

/// Look up a user by email, creating one on first login.
///
/// Insert-first so concurrent first-logins race on the `users.email` unique
/// index instead of on a read-then-write window; the loser re-reads the
/// winner's row.
pub(crate) async fn upsert_user(pool: &PgPool, email: &str) -> Result<User> {
    let query = "INSERT INTO users (id, email) VALUES ($1, $2) RETURNING id";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let inserted = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match inserted {
        Ok(row) => Ok(User {
            id: row.get("id"),
            email: email.to_string(),
        }),
        Err(err) if is_unique_violation(&err) => find_user_by_email(pool, email)
            .await?
            .context("user row missing after unique violation"),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(crate) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = "SELECT id, email FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        email: row.get("email"),
    }))
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_unique_violation, User};
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;
    use uuid::Uuid;

    #[test]
    fn user_holds_values() {
        let user = User {
            id: Uuid::nil(),
            email: "a@b.com".to_string(),
        };
        assert_eq!(user.id, Uuid::nil());
        assert_eq!(user.email, "a@b.com");
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }
}
