use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use listmate_web::extract::{Json, Query};
use tracing::{event, Level};

use super::{
    queries::{self, NewTodo},
    types::*,
    TodoId,
};
use crate::{
    auth::{permissions, Authed},
    error::HandlerError,
    models::todo_list::{self, TodoListId},
    realtime::ServerEvent,
    server::ServerState,
    Error,
};

/// Send a todo to everyone viewing its list
fn publish(state: &ServerState, todo: &Todo, make_event: fn(serde_json::Value) -> ServerEvent) {
    match serde_json::to_value(todo) {
        Ok(data) => {
            state.realtime.publish(todo.list_id, make_event(data));
        }
        Err(e) => event!(Level::ERROR, error=%e, todo_id=%todo.id, "Failed to serialize todo"),
    }
}

async fn list(
    State(state): State<ServerState>,
    auth: Authed,
    Path(list_id): Path<TodoListId>,
    Query(qs): Query<ListTodosQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    if !permissions::has_list_access(&state.db, auth.user_id, list_id).await? {
        return Err(Error::NoListAccess.into());
    }

    let (todos, owner, accessible_users) = tokio::try_join!(
        queries::list(&state.db, list_id, &qs),
        todo_list::queries::list_owner(&state.db, list_id),
        todo_list::queries::list_members(&state.db, list_id),
    )?;

    Ok(Json(TodoListContents {
        todos,
        owner,
        accessible_users,
    }))
}

async fn get(
    State(state): State<ServerState>,
    auth: Authed,
    Path((list_id, todo_id)): Path<(TodoListId, TodoId)>,
) -> Result<impl IntoResponse, HandlerError> {
    let todo = queries::get_with_permission(&state.db, auth.user_id, list_id, todo_id)
        .await?
        .ok_or(Error::TodoNotVisible)?;
    Ok(Json(todo))
}

async fn create(
    State(state): State<ServerState>,
    auth: Authed,
    Path(list_id): Path<TodoListId>,
    Json(payload): Json<TodoCreatePayload>,
) -> Result<impl IntoResponse, HandlerError> {
    let title = payload
        .title
        .filter(|t| !t.is_empty())
        .ok_or(Error::TitleRequired)?;

    if !permissions::has_list_edit_permission(&state.db, auth.user_id, list_id).await? {
        return Err(Error::NoEditPermission.into());
    }

    let new_todo = NewTodo {
        title,
        description: payload.description.unwrap_or_default(),
        due_date: payload.due_date,
        status: payload.status.unwrap_or_default(),
        priority: payload.priority.unwrap_or_default(),
    };

    let todo = queries::create(&state.db, list_id, &new_todo).await?;
    publish(&state, &todo, |data| ServerEvent::TodoCreated { data });

    Ok((StatusCode::CREATED, Json(todo)))
}

async fn update(
    State(state): State<ServerState>,
    auth: Authed,
    Path((list_id, todo_id)): Path<(TodoListId, TodoId)>,
    Json(payload): Json<TodoUpdatePayload>,
) -> Result<impl IntoResponse, HandlerError> {
    let (can_edit, in_list) = tokio::try_join!(
        permissions::has_list_edit_permission(&state.db, auth.user_id, list_id),
        permissions::todo_exists_in_list(&state.db, todo_id, list_id),
    )?;

    if !can_edit {
        return Err(Error::NoEditPermission.into());
    }

    if !in_list {
        return Err(Error::TodoNotInList.into());
    }

    let todo = queries::update(&state.db, list_id, todo_id, &payload)
        .await?
        .ok_or(Error::TodoNotInList)?;
    publish(&state, &todo, |data| ServerEvent::TodoUpdated { data });

    Ok(Json(todo))
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route(
            "/api/todo-lists/:list_id/todos",
            routing::get(list).post(create),
        )
        .route(
            "/api/todo-lists/:list_id/todos/:todo_id",
            routing::get(get).put(update),
        )
}
