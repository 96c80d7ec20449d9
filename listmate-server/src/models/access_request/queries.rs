use error_stack::{Report, ResultExt};
use listmate_web::sql::{BindingOperator, FilterBuilder};
use sqlx::{PgExecutor, PgPool};
use tracing::{event, instrument, Level};

use super::types::*;
use crate::{
    models::{
        todo_list::{AccessPermission, TodoListId},
        user::UserId,
    },
    Error,
};

#[instrument(skip(db))]
pub async fn get_existing(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
    user_id: UserId,
) -> Result<Option<ExistingRequest>, Report<Error>> {
    sqlx::query_as::<_, ExistingRequest>(
        r##"SELECT requested_permission, status
        FROM todo_list_access_requests
        WHERE list_id = $1 AND user_id = $2"##,
    )
    .bind(list_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .change_context(Error::Db)
}

#[instrument(skip(db))]
pub async fn create(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
    user_id: UserId,
    permission: AccessPermission,
) -> Result<(), Report<Error>> {
    sqlx::query(
        r##"INSERT INTO todo_list_access_requests (list_id, user_id, requested_permission, status)
        VALUES ($1, $2, $3, $4)"##,
    )
    .bind(list_id)
    .bind(user_id)
    .bind(permission)
    .bind(RequestStatus::Pending)
    .execute(db)
    .await
    .change_context(Error::Db)?;

    event!(Level::INFO, %list_id, %user_id, %permission, "access requested");
    Ok(())
}

/// Requests for a list, newest first, optionally restricted to one status.
#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
    status: Option<RequestStatus>,
) -> Result<Vec<AccessRequest>, Report<Error>> {
    let mut filters = FilterBuilder::new(2);
    filters.add_option("r.status", &status, BindingOperator::Eq);

    let q = format!(
        r##"SELECT r.list_id, r.user_id, r.requested_permission, r.status, r.created_at, u.username
        FROM todo_list_access_requests r
        JOIN users u ON r.user_id = u.id
        WHERE r.list_id = $1 AND {filters}
        ORDER BY r.created_at DESC, r.user_id DESC"##
    );

    let mut query = sqlx::query_as::<_, AccessRequest>(q.as_str()).bind(list_id);
    if let Some(status) = status {
        query = query.bind(status);
    }

    query.fetch_all(db).await.change_context(Error::Db)
}

/// Mark the request accepted and grant the permission it asked for, replacing any grant the
/// user already has.
#[instrument(skip(db))]
pub async fn accept(
    db: &PgPool,
    list_id: TodoListId,
    user_id: UserId,
    permission: AccessPermission,
) -> Result<(), Report<Error>> {
    let mut tx = db.begin().await.change_context(Error::Db)?;

    sqlx::query(
        "UPDATE todo_list_access_requests SET status = $3 WHERE list_id = $1 AND user_id = $2",
    )
    .bind(list_id)
    .bind(user_id)
    .bind(RequestStatus::Accepted)
    .execute(&mut *tx)
    .await
    .change_context(Error::Db)?;

    sqlx::query(
        r##"INSERT INTO todo_list_access (list_id, user_id, permission)
        VALUES ($1, $2, $3)
        ON CONFLICT (list_id, user_id) DO UPDATE SET permission = EXCLUDED.permission"##,
    )
    .bind(list_id)
    .bind(user_id)
    .bind(permission)
    .execute(&mut *tx)
    .await
    .change_context(Error::Db)?;

    tx.commit().await.change_context(Error::Db)?;

    event!(Level::INFO, %list_id, %user_id, %permission, "access granted");
    Ok(())
}
