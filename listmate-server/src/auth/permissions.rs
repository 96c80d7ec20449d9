//! Checks for what a user may do with a todo list. A user can see a list if they own it or
//! hold any grant on it, and can change it if they own it or hold an `EDIT` grant.

use error_stack::{Report, ResultExt};
use sqlx::PgExecutor;
use tracing::instrument;

use crate::{
    models::{
        todo::TodoId,
        todo_list::{AccessPermission, TodoListId},
        user::UserId,
    },
    Error,
};

async fn exists(
    db: impl PgExecutor<'_>,
    query: sqlx::query::QueryScalar<'_, sqlx::Postgres, i32, sqlx::postgres::PgArguments>,
) -> Result<bool, Report<Error>> {
    let found = query.fetch_optional(db).await.change_context(Error::Db)?;
    Ok(found.is_some())
}

/// Return true if the user owns the list or has been granted any access to it.
#[instrument(skip(db))]
pub async fn has_list_access(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    list_id: TodoListId,
) -> Result<bool, Report<Error>> {
    let query = sqlx::query_scalar(
        r##"SELECT 1
        FROM todo_lists tl
        LEFT JOIN todo_list_access tla ON tl.id = tla.list_id AND tla.user_id = $1
        WHERE tl.id = $2 AND (tl.owner_id = $1 OR tla.user_id = $1)"##,
    )
    .bind(user_id)
    .bind(list_id);

    exists(db, query).await
}

/// Return true if the user owns the list or has been granted `EDIT` access to it.
#[instrument(skip(db))]
pub async fn has_list_edit_permission(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    list_id: TodoListId,
) -> Result<bool, Report<Error>> {
    let query = sqlx::query_scalar(
        r##"SELECT 1
        FROM todo_lists tl
        LEFT JOIN todo_list_access tla ON tl.id = tla.list_id AND tla.user_id = $1
        WHERE tl.id = $2
          AND (tl.owner_id = $1 OR (tla.user_id = $1 AND tla.permission = $3))"##,
    )
    .bind(user_id)
    .bind(list_id)
    .bind(AccessPermission::Edit);

    exists(db, query).await
}

#[instrument(skip(db))]
pub async fn is_list_owner(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    list_id: TodoListId,
) -> Result<bool, Report<Error>> {
    let query = sqlx::query_scalar("SELECT 1 FROM todo_lists WHERE id = $1 AND owner_id = $2")
        .bind(list_id)
        .bind(user_id);

    exists(db, query).await
}

/// The grant the user holds on the list, if any. Owners hold an `EDIT` grant on lists they
/// created.
#[instrument(skip(db))]
pub async fn get_user_list_access(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    list_id: TodoListId,
) -> Result<Option<AccessPermission>, Report<Error>> {
    sqlx::query_scalar::<_, AccessPermission>(
        "SELECT permission FROM todo_list_access WHERE list_id = $1 AND user_id = $2",
    )
    .bind(list_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

#[instrument(skip(db))]
pub async fn list_exists(db: impl PgExecutor<'_>, list_id: TodoListId) -> Result<bool, Report<Error>> {
    let query = sqlx::query_scalar("SELECT 1 FROM todo_lists WHERE id = $1").bind(list_id);
    exists(db, query).await
}

#[instrument(skip(db))]
pub async fn todo_exists_in_list(
    db: impl PgExecutor<'_>,
    todo_id: TodoId,
    list_id: TodoListId,
) -> Result<bool, Report<Error>> {
    let query = sqlx::query_scalar("SELECT 1 FROM todos WHERE id = $1 AND list_id = $2")
        .bind(todo_id)
        .bind(list_id);

    exists(db, query).await
}
