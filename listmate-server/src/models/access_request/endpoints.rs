use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing,
};
use listmate_web::{
    extract::{Json, Query},
    Message,
};

use super::{queries, types::*};
use crate::{
    auth::{permissions, Authed},
    error::HandlerError,
    models::{todo_list::TodoListId, user::UserId},
    server::ServerState,
    Error,
};

async fn create(
    State(state): State<ServerState>,
    auth: Authed,
    Path(list_id): Path<TodoListId>,
    Json(payload): Json<AccessRequestCreatePayload>,
) -> Result<impl IntoResponse, HandlerError> {
    let permission = payload.requested_permission()?;

    if !permissions::list_exists(&state.db, list_id).await? {
        return Err(Error::ListNotFound.into());
    }

    if permissions::is_list_owner(&state.db, auth.user_id, list_id).await? {
        return Err(Error::AlreadyOwner.into());
    }

    if let Some(current) =
        permissions::get_user_list_access(&state.db, auth.user_id, list_id).await?
    {
        return Err(Error::AlreadyHasAccess(current).into());
    }

    match queries::get_existing(&state.db, list_id, auth.user_id).await? {
        Some(ExistingRequest {
            status: RequestStatus::Pending,
            requested_permission,
        }) => return Err(Error::RequestPending(requested_permission).into()),
        Some(ExistingRequest { status, .. }) => {
            return Err(Error::RequestNotRepeatable(status).into())
        }
        None => {}
    }

    queries::create(&state.db, list_id, auth.user_id, permission).await?;

    Ok((
        StatusCode::CREATED,
        Json(Message::new(
            "Access request submitted. Waiting for approval.",
        )),
    ))
}

async fn list(
    State(state): State<ServerState>,
    auth: Authed,
    Path(list_id): Path<TodoListId>,
    Query(qs): Query<ListAccessRequestsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    if !permissions::is_list_owner(&state.db, auth.user_id, list_id).await? {
        return Err(Error::NotOwnerViewRequests.into());
    }

    let status = qs.status_filter()?;
    let requests = queries::list(&state.db, list_id, status).await?;
    Ok(Json(requests))
}

async fn update(
    State(state): State<ServerState>,
    auth: Authed,
    Path((list_id, user_id)): Path<(TodoListId, UserId)>,
    Json(payload): Json<AccessRequestUpdatePayload>,
) -> Result<impl IntoResponse, HandlerError> {
    let status = payload.new_status()?;

    if !permissions::is_list_owner(&state.db, auth.user_id, list_id).await? {
        return Err(Error::NotOwnerUpdateRequests.into());
    }

    let request = queries::get_existing(&state.db, list_id, user_id)
        .await?
        .ok_or(Error::AccessRequestNotFound)?;

    queries::accept(&state.db, list_id, user_id, request.requested_permission).await?;

    Ok(Json(AccessRequestUpdated {
        message: "Access request accepted and permission granted",
        status,
        user_id,
        list_id,
    }))
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route(
            "/api/todo-lists/:list_id/access/requests",
            routing::get(list).post(create),
        )
        .route(
            "/api/todo-lists/:list_id/access/requests/:user_id",
            routing::put(update),
        )
}

#[cfg(test)]
mod test {
    use listmate_web::testing::ResponseExt;
    use reqwest::StatusCode;
    use serde_json::json;

    use crate::tests::{start_app, BootstrappedData};

    #[sqlx::test]
    #[cfg_attr(not(feature = "test_db"), ignore = "requires a database")]
    async fn request_and_accept(db: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                owner,
                outsider,
                list_id,
                ..
            },
        ) = start_app(db).await;

        let requests_url = format!("api/todo-lists/{list_id}/access/requests");

        let (status, _) = outsider
            .client
            .get(format!("api/todo-lists/{list_id}/todos"))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let response: serde_json::Value = outsider
            .client
            .post(&requests_url)
            .json(&json!({ "permission": "VIEW" }))
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            response["message"],
            "Access request submitted. Waiting for approval."
        );

        let response = outsider
            .client
            .post(&requests_url)
            .json(&json!({ "permission": "EDIT" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Access request already pending");
        assert_eq!(body["requestedPermission"], "VIEW");

        let (status, message) = outsider
            .client
            .get(&requests_url)
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(message, "Only the list owner can view access requests");

        let requests: Vec<serde_json::Value> = owner
            .client
            .get(format!("{requests_url}?status=PENDING"))
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["user_id"], outsider.user_id.as_i32());
        assert_eq!(requests[0]["username"], outsider.username);
        assert_eq!(requests[0]["requested_permission"], "VIEW");
        assert_eq!(requests[0]["status"], "PENDING");

        let (status, message) = outsider
            .client
            .put(format!("{requests_url}/{}", outsider.user_id))
            .json(&json!({ "status": "ACCEPTED" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(message, "Only the list owner can update access requests");

        let updated: serde_json::Value = owner
            .client
            .put(format!("{requests_url}/{}", outsider.user_id))
            .json(&json!({ "status": "ACCEPTED" }))
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            updated,
            json!({
                "message": "Access request accepted and permission granted",
                "status": "ACCEPTED",
                "userId": outsider.user_id.as_i32(),
                "listId": list_id.as_i32(),
            })
        );

        outsider
            .client
            .get(format!("api/todo-lists/{list_id}/todos"))
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap();

        let pending: Vec<serde_json::Value> = owner
            .client
            .get(format!("{requests_url}?status=PENDING"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(pending.is_empty());

        let all: Vec<serde_json::Value> = owner
            .client
            .get(&requests_url)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["status"], "ACCEPTED");

        let response = outsider
            .client
            .post(&requests_url)
            .json(&json!({ "permission": "EDIT" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "You already have access to this list");
        assert_eq!(body["currentPermission"], "VIEW");
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "test_db"), ignore = "requires a database")]
    async fn request_validation(db: sqlx::PgPool) {
        let (
            _app,
            BootstrappedData {
                owner,
                outsider,
                list_id,
                ..
            },
        ) = start_app(db).await;

        let requests_url = format!("api/todo-lists/{list_id}/access/requests");

        let (status, message) = outsider
            .client
            .post(&requests_url)
            .json(&json!({ "permission": "ADMIN" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Valid permission (EDIT or VIEW) is required");

        let (status, message) = outsider
            .client
            .post("api/todo-lists/999999/access/requests")
            .json(&json!({ "permission": "VIEW" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Todo list not found");

        let (status, message) = owner
            .client
            .post(&requests_url)
            .json(&json!({ "permission": "EDIT" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "You already own this list");

        let (status, message) = owner
            .client
            .get(format!("{requests_url}?status=REJECTED"))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Invalid status. Must be one of: PENDING, ACCEPTED");

        let (status, message) = owner
            .client
            .put(format!("{requests_url}/{}", outsider.user_id))
            .json(&json!({ "status": "PENDING" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Valid status (ACCEPTED) is required");

        let (status, message) = owner
            .client
            .put(format!("{requests_url}/{}", outsider.user_id))
            .json(&json!({ "status": "ACCEPTED" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Access request not found");
    }
}
