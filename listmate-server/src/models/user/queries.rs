use error_stack::{Report, ResultExt};
use sqlx::PgExecutor;
use tracing::instrument;

use super::{User, UserCredentials};
use crate::Error;

/// Return true if a user with this name already exists
#[instrument(skip(db))]
pub async fn username_exists(db: impl PgExecutor<'_>, username: &str) -> Result<bool, Report<Error>> {
    let found = sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(db)
        .await
        .change_context(Error::Db)?;

    Ok(found.is_some())
}

/// Look up the stored password hash for a user
#[instrument(skip(db))]
pub async fn get_credentials(
    db: impl PgExecutor<'_>,
    username: &str,
) -> Result<Option<UserCredentials>, Report<Error>> {
    sqlx::query_as::<_, UserCredentials>(
        "SELECT id, username, password_hash FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

/// Insert a new user. A concurrent registration of the same name is reported as
/// [Error::UsernameTaken].
#[instrument(skip(db, password_hash))]
pub async fn create(
    db: impl PgExecutor<'_>,
    username: &str,
    password_hash: &str,
) -> Result<User, Report<Error>> {
    let result = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id, username",
    )
    .bind(username)
    .bind(password_hash)
    .fetch_one(db)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(Report::new(Error::UsernameTaken))
        }
        Err(e) => Err(Report::new(e).change_context(Error::Db)),
    }
}
