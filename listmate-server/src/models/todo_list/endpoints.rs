use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing,
};
use listmate_web::extract::{Json, Query};

use super::{queries, types::*, TodoListId};
use crate::{auth::Authed, error::HandlerError, server::ServerState, Error};

async fn list(
    State(state): State<ServerState>,
    auth: Authed,
    Query(qs): Query<ListTodoListsQuery>,
) -> Result<Response, HandlerError> {
    let response = if qs.owned_only() {
        Json(queries::list_owned(&state.db, auth.user_id).await?).into_response()
    } else {
        Json(queries::list_accessible(&state.db, auth.user_id).await?).into_response()
    };

    Ok(response)
}

async fn create(
    State(state): State<ServerState>,
    auth: Authed,
    Json(payload): Json<TodoListCreatePayload>,
) -> Result<impl IntoResponse, HandlerError> {
    let title = payload
        .title
        .filter(|t| !t.is_empty())
        .ok_or(Error::TitleRequired)?;
    let description = payload.description.unwrap_or_default();

    let list = queries::create(&state.db, auth.user_id, &title, &description).await?;

    Ok((StatusCode::CREATED, Json(list)))
}

async fn get(
    State(state): State<ServerState>,
    _auth: Authed,
    Path(list_id): Path<TodoListId>,
) -> Result<impl IntoResponse, HandlerError> {
    let summary = queries::get_summary(&state.db, list_id)
        .await?
        .ok_or(Error::ListNotFound)?;
    Ok(Json(summary))
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/api/todo-lists", routing::get(list).post(create))
        .route("/api/todo-lists/:list_id", routing::get(get))
}
