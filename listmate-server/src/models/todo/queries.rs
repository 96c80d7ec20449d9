use error_stack::{Report, ResultExt};
use listmate_web::sql::{BindingOperator, FilterBuilder, SetBuilder};
use sqlx::PgExecutor;
use tracing::{event, instrument, Level};

use super::{types::*, TodoId};
use crate::{
    models::{todo_list::TodoListId, user::UserId},
    Error,
};

type QueryAs<'q, T> = sqlx::query::QueryAs<
    'q,
    sqlx::Postgres,
    T,
    <sqlx::Postgres as sqlx::database::HasArguments<'q>>::Arguments,
>;

const TODO_COLUMNS: &str = "id, list_id, title, description, due_date, status, priority, created_at";

impl ListTodosQuery {
    fn build_where_clause(&self) -> String {
        let mut bindings = FilterBuilder::new(2);
        bindings.add_option("t.status", &self.status, BindingOperator::Eq);
        bindings.add_option("t.priority", &self.priority, BindingOperator::Eq);
        bindings.add_option("t.due_date", &self.due_date, BindingOperator::Eq);

        let query = bindings.to_string();
        event!(Level::DEBUG, %query);
        query
    }

    fn build_order_by(&self) -> String {
        let direction = if self.descending() { "DESC" } else { "ASC" };
        format!("t.{} {direction}, t.id {direction}", self.sort_field().as_str())
    }

    fn bind_to_query<'a, T>(&'a self, mut query: QueryAs<'a, T>) -> QueryAs<'a, T> {
        if let Some(status) = self.status {
            event!(Level::DEBUG, %status);
            query = query.bind(status);
        }

        if let Some(priority) = self.priority {
            event!(Level::DEBUG, %priority);
            query = query.bind(priority);
        }

        if let Some(due_date) = self.due_date {
            event!(Level::DEBUG, %due_date);
            query = query.bind(due_date.0);
        }

        query
    }
}

/// The todos in a list, filtered and sorted according to `filters`.
#[instrument(skip(db))]
pub async fn list(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
    filters: &ListTodosQuery,
) -> Result<Vec<Todo>, Report<Error>> {
    let q = include_str!("list.sql")
        .replace("__insertion_point_filters", &filters.build_where_clause())
        .replace("__insertion_point_order_by", &filters.build_order_by());

    let query = sqlx::query_as::<_, Todo>(q.as_str()).bind(list_id);
    let query = filters.bind_to_query(query);

    query.fetch_all(db).await.change_context(Error::Db)
}

/// Fetch a todo along with the user's permission on its list. Returns `None` if the todo does
/// not exist, is not in the given list, or the user can't see the list.
#[instrument(skip(db))]
pub async fn get_with_permission(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    list_id: TodoListId,
    todo_id: TodoId,
) -> Result<Option<TodoWithPermission>, Report<Error>> {
    sqlx::query_as::<_, TodoWithPermission>(include_str!("select_with_permission.sql"))
        .bind(user_id)
        .bind(todo_id)
        .bind(list_id)
        .fetch_optional(db)
        .await
        .change_context(Error::Db)
}

/// Values for a new todo, after defaults have been applied
#[derive(Debug)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub due_date: Option<chrono::NaiveDate>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
}

#[instrument(skip(db))]
pub async fn create(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
    todo: &NewTodo,
) -> Result<Todo, Report<Error>> {
    let q = format!(
        r##"INSERT INTO todos (list_id, title, description, due_date, status, priority)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {TODO_COLUMNS}"##
    );

    let result = sqlx::query_as::<_, Todo>(q.as_str())
        .bind(list_id)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.due_date)
        .bind(todo.status)
        .bind(todo.priority)
        .fetch_one(db)
        .await
        .change_context(Error::Db)?;

    event!(Level::DEBUG, todo_id=%result.id, %list_id, "created todo");
    Ok(result)
}

/// Apply the fields present in `payload`. Returns `None` if the todo is not in the list.
#[instrument(skip(db))]
pub async fn update(
    db: impl PgExecutor<'_>,
    list_id: TodoListId,
    todo_id: TodoId,
    payload: &TodoUpdatePayload,
) -> Result<Option<Todo>, Report<Error>> {
    let mut set = SetBuilder::new(3);
    set.add_option("title", &payload.title);
    set.add_option("description", &payload.description);
    set.add_option("due_date", &payload.due_date);
    set.add_option("status", &payload.status);
    set.add_option("priority", &payload.priority);

    if set.is_empty() {
        return Err(Report::new(Error::NoFieldsToUpdate));
    }

    let q = format!(
        "UPDATE todos SET {set} WHERE id = $1 AND list_id = $2 RETURNING {TODO_COLUMNS}"
    );
    event!(Level::DEBUG, query=%q);

    let mut query = sqlx::query_as::<_, Todo>(q.as_str())
        .bind(todo_id)
        .bind(list_id);

    if let Some(title) = &payload.title {
        query = query.bind(title);
    }

    if let Some(description) = &payload.description {
        query = query.bind(description);
    }

    if let Some(due_date) = payload.due_date {
        query = query.bind(due_date);
    }

    if let Some(status) = payload.status {
        query = query.bind(status);
    }

    if let Some(priority) = payload.priority {
        query = query.bind(priority);
    }

    query.fetch_optional(db).await.change_context(Error::Db)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_clauses() {
        let filters = ListTodosQuery {
            status: Some(TodoStatus::Blocked),
            due_date: Some(QueryDate(chrono::NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())),
            sort_by: Some("title".into()),
            sort_dir: Some("desc".into()),
            ..Default::default()
        };

        assert_eq!(filters.build_where_clause(), "(t.status = $2 AND t.due_date = $3)");
        assert_eq!(filters.build_order_by(), "t.title DESC, t.id DESC");

        let filters = ListTodosQuery::default();
        assert_eq!(filters.build_where_clause(), "true");
        assert_eq!(filters.build_order_by(), "t.due_date ASC, t.id ASC");
    }
}
