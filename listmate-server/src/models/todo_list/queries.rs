use error_stack::{Report, ResultExt};
use sqlx::{PgExecutor, PgPool};
use tracing::{event, instrument, Level};

use super::{types::*, TodoListId};
use crate::{models::user::UserId, Error};

/// Lists owned by the user, newest first
#[instrument(skip(db))]
pub async fn list_owned(db: impl PgExecutor<'_>, user_id: UserId) -> Result<Vec<TodoList>, Report<Error>> {
    sqlx::query_as::<_, TodoList>(
        r##"SELECT id, owner_id, title, description, created_at
        FROM todo_lists
        WHERE owner_id = $1
        ORDER BY created_at DESC, id DESC"##,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .change_context(Error::Db)
}

/// Every list the user holds a grant on, newest first. This includes the user's own lists.
#[instrument(skip(db))]
pub async fn list_accessible(
    db: impl PgExecutor<'_>,
    user_id: UserId,
) -> Result<Vec<AccessibleTodoList>, Report<Error>> {
    sqlx::query_as::<_, AccessibleTodoList>(include_str!("list_accessible.sql"))
        .bind(user_id)
        .fetch_all(db)
        .await
        .change_context(Error::Db)
}

/// Create a list, and give the owner an `EDIT` grant on it.
#[instrument(skip(db))]
pub async fn create(
    db: &PgPool,
    owner_id: UserId,
    title: &str,
    description: &str,
) -> Result<TodoList, Report<Error>> {
    let mut tx = db.begin().await.change_context(Error::Db)?;

    let list = sqlx::query_as::<_, TodoList>(
        r##"INSERT INTO todo_lists (owner_id, title, description)
        VALUES ($1, $2, $3)
        RETURNING id, owner_id, title, description, created_at"##,
    )
    .bind(owner_id)
    .bind(title)
    .bind(description)
    .fetch_one(&mut *tx)
    .await
    .change_context(Error::Db)?;

    sqlx::query("INSERT INTO todo_list_access (list_id, user_id, permission) VALUES ($1, $2, $3)")
        .bind(list.id)
        .bind(owner_id)
        .bind(AccessPermission::Edit)
        .execute(&mut *tx)
        .await
        .change_context(Error::Db)?;

    tx.commit().await.change_context(Error::Db)?;

    event!(Level::INFO, list_id=%list.id, %owner_id, "created list");
    Ok(list)
}

#[instrument(skip(db))]
pub async fn list_owner(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
) -> Result<Option<ListOwner>, Report<Error>> {
    sqlx::query_as::<_, ListOwner>(
        r##"SELECT tl.owner_id, u.username
        FROM todo_lists tl
        JOIN users u ON tl.owner_id = u.id
        WHERE tl.id = $1"##,
    )
    .bind(list_id)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

/// The users holding a grant on the list
#[instrument(skip(db))]
pub async fn list_members(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
) -> Result<Vec<ListMember>, Report<Error>> {
    sqlx::query_as::<_, ListMember>(include_str!("list_members.sql"))
        .bind(list_id)
        .fetch_all(db)
        .await
        .change_context(Error::Db)
}

#[derive(sqlx::FromRow)]
struct ListWithOwnerName {
    #[sqlx(flatten)]
    list: TodoList,
    owner_username: String,
}

/// Fetch a list's public summary, or `None` if the list does not exist.
#[instrument(skip(db))]
pub async fn get_summary(
    db: &PgPool,
    list_id: TodoListId,
) -> Result<Option<TodoListSummary>, Report<Error>> {
    let list_query = sqlx::query_as::<_, ListWithOwnerName>(
        r##"SELECT tl.id, tl.owner_id, tl.title, tl.description, tl.created_at,
            u.username AS owner_username
        FROM todo_lists tl
        JOIN users u ON tl.owner_id = u.id
        WHERE tl.id = $1"##,
    )
    .bind(list_id)
    .fetch_optional(db);

    let (list, members) = tokio::try_join!(
        async { list_query.await.change_context(Error::Db) },
        list_members(db, list_id)
    )?;

    Ok(list.map(|row| TodoListSummary {
        list: row.list,
        owner_username: row.owner_username,
        accessible_users: members,
    }))
}
