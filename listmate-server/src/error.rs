use axum::{http::StatusCode, response::IntoResponse};
use listmate_web::errors::{ErrorDetail, HttpError, WrapReport};
use serde_json::json;
use thiserror::Error;

use crate::models::{access_request::RequestStatus, todo_list::AccessPermission};

/// The application's error type. Handlers return it wrapped in a [WrapReport] so that the
/// context chain is logged while the client only sees the message.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to start the HTTP server
    #[error("Failed to start server")]
    ServerStart,
    /// A database query failed
    #[error("Database error")]
    Db,
    /// Password hashing or session storage failed
    #[error("Authentication subsystem error")]
    AuthSubsystem,

    #[error("Missing username or password")]
    MissingCredentials,
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Title is required")]
    TitleRequired,
    #[error("Todo list not found")]
    ListNotFound,
    #[error("No permission to access this list")]
    NoListAccess,
    #[error("No edit permission for this list")]
    NoEditPermission,
    #[error("Todo not found, does not belong to the specified list, or no access permission")]
    TodoNotVisible,
    #[error("Todo not found or does not belong to the specified list")]
    TodoNotInList,
    #[error("No fields to update")]
    NoFieldsToUpdate,

    #[error("Valid permission (EDIT or VIEW) is required")]
    InvalidRequestedPermission,
    #[error("You already own this list")]
    AlreadyOwner,
    #[error("You already have access to this list")]
    AlreadyHasAccess(AccessPermission),
    #[error("Access request already pending")]
    RequestPending(AccessPermission),
    #[error("Cannot create a new request with the current status")]
    RequestNotRepeatable(RequestStatus),
    #[error("Only the list owner can view access requests")]
    NotOwnerViewRequests,
    #[error("Invalid status. Must be one of: PENDING, ACCEPTED")]
    InvalidStatusFilter,
    #[error("Valid status (ACCEPTED) is required")]
    InvalidRequestUpdate,
    #[error("Only the list owner can update access requests")]
    NotOwnerUpdateRequests,
    #[error("Access request not found")]
    AccessRequestNotFound,
}

/// The error type returned from HTTP handlers
pub type HandlerError = WrapReport<Error>;

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        self.to_response()
    }
}

impl HttpError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::ServerStart | Error::Db | Error::AuthSubsystem => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::MissingCredentials
            | Error::TitleRequired
            | Error::NoFieldsToUpdate
            | Error::InvalidRequestedPermission
            | Error::AlreadyOwner
            | Error::InvalidStatusFilter
            | Error::InvalidRequestUpdate => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::NoListAccess
            | Error::NoEditPermission
            | Error::NotOwnerViewRequests
            | Error::NotOwnerUpdateRequests => StatusCode::FORBIDDEN,
            Error::ListNotFound
            | Error::TodoNotVisible
            | Error::TodoNotInList
            | Error::AccessRequestNotFound => StatusCode::NOT_FOUND,
            Error::UsernameTaken
            | Error::AlreadyHasAccess(_)
            | Error::RequestPending(_)
            | Error::RequestNotRepeatable(_) => StatusCode::CONFLICT,
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Error::ServerStart => "server",
            Error::Db => "db",
            Error::AuthSubsystem => "auth",
            Error::MissingCredentials => "missing_credentials",
            Error::UsernameTaken => "username_taken",
            Error::InvalidCredentials => "invalid_credentials",
            Error::TitleRequired => "title_required",
            Error::ListNotFound => "list_not_found",
            Error::NoListAccess => "no_list_access",
            Error::NoEditPermission => "no_edit_permission",
            Error::TodoNotVisible | Error::TodoNotInList => "todo_not_found",
            Error::NoFieldsToUpdate => "no_fields_to_update",
            Error::InvalidRequestedPermission => "invalid_permission",
            Error::AlreadyOwner => "already_owner",
            Error::AlreadyHasAccess(_) => "already_has_access",
            Error::RequestPending(_) => "request_pending",
            Error::RequestNotRepeatable(_) => "request_exists",
            Error::NotOwnerViewRequests | Error::NotOwnerUpdateRequests => "not_list_owner",
            Error::InvalidStatusFilter | Error::InvalidRequestUpdate => "invalid_status",
            Error::AccessRequestNotFound => "access_request_not_found",
        }
    }

    fn error_detail(&self) -> Option<ErrorDetail> {
        let (key, value) = match self {
            Error::AlreadyHasAccess(permission) => ("currentPermission", json!(permission)),
            Error::RequestPending(permission) => ("requestedPermission", json!(permission)),
            Error::RequestNotRepeatable(status) => ("currentStatus", json!(status)),
            _ => return None,
        };

        let mut detail = ErrorDetail::new();
        detail.insert(key.to_string(), value);
        Some(detail)
    }
}
